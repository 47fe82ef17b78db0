//! Per-hand kinematic attachment: Idle until a grab is resolved, then the
//! rig or the grabbed object follows the hand every frame.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scene::{EntityId, Scene};
use crate::scheduler::FrameTask;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachMode {
    /// Climbing: the rig moves against the hand's motion.
    #[serde(alias = "climb")]
    Rig,
    /// Carrying: the target keeps its pose relative to the hand.
    #[default]
    #[serde(alias = "carry")]
    Object,
}

/// What a grab-start does to a hand that is already grabbing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegrabPolicy {
    /// Keep the current grab untouched.
    #[default]
    Ignore,
    /// Release the current grab, then resolve a new one.
    Replace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentState {
    Idle,
    Grabbing,
}

#[derive(Debug)]
pub struct Attachment {
    hand: EntityId,
    mode: AttachMode,
    state: AttachmentState,
    target: Option<EntityId>,
    /// Hand world position at capture.
    reference_position: Vec3,
    /// Rig world matrix at capture (rig mode) or hand-to-target transform
    /// (object mode).
    reference_matrix: Mat4,
    /// Hand position in the rig's frame at capture, for hands parented under
    /// the rig.
    hand_in_rig: Option<Vec3>,
    task: Option<FrameTask>,
}

impl Attachment {
    pub fn new(hand: EntityId, mode: AttachMode) -> Self {
        Self {
            hand,
            mode,
            state: AttachmentState::Idle,
            target: None,
            reference_position: Vec3::ZERO,
            reference_matrix: Mat4::IDENTITY,
            hand_in_rig: None,
            task: None,
        }
    }

    pub fn hand(&self) -> EntityId {
        self.hand
    }

    pub fn mode(&self) -> AttachMode {
        self.mode
    }

    pub fn state(&self) -> AttachmentState {
        self.state
    }

    pub fn is_grabbing(&self) -> bool {
        self.state == AttachmentState::Grabbing
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn reference_position(&self) -> Vec3 {
        self.reference_position
    }

    pub fn reference_matrix(&self) -> Mat4 {
        self.reference_matrix
    }

    /// Enters Grabbing, capturing the reference from the current world
    /// matrices. `task` keeps the per-frame update registered for as long as
    /// the grab lasts. Returns false (and stays Idle) when a participant is
    /// missing from the scene.
    pub fn begin(
        &mut self,
        scene: &Scene,
        target: EntityId,
        rig: Option<EntityId>,
        task: FrameTask,
    ) -> bool {
        let Some(hand_world) = scene.world_matrix(self.hand) else {
            return false;
        };
        if !scene.contains(target) {
            return false;
        }

        let hand_position = hand_world.w_axis.truncate();
        let mut hand_in_rig = None;
        let reference_matrix = match self.mode {
            AttachMode::Rig => {
                let Some((rig, rig_world)) = rig.and_then(|r| Some((r, scene.world_matrix(r)?))) else {
                    return false;
                };
                if rig_world.determinant().abs() <= f32::EPSILON {
                    return false;
                }
                if scene.is_descendant(self.hand, rig) {
                    hand_in_rig = Some(rig_world.inverse().transform_point3(hand_position));
                }
                rig_world
            }
            AttachMode::Object => match scene.world_matrix(target) {
                Some(target_world) => hand_world.inverse() * target_world,
                None => return false,
            },
        };

        self.reference_position = hand_position;
        self.reference_matrix = reference_matrix;
        self.hand_in_rig = hand_in_rig;
        self.target = Some(target);
        self.state = AttachmentState::Grabbing;
        self.task = Some(task);
        debug!(hand = ?self.hand, ?target, mode = ?self.mode, "grab started");
        true
    }

    /// One frame of tracking. Returns false when the grab can no longer be
    /// maintained (hand, target or rig gone); the caller should release.
    pub fn track(&self, scene: &mut Scene, rig: Option<EntityId>) -> bool {
        if !self.is_grabbing() {
            return true;
        }
        let Some(target) = self.target else {
            return false;
        };
        let Some(hand_world) = scene.world_matrix(self.hand) else {
            return false;
        };
        if !scene.contains(target) {
            return false;
        }

        match self.mode {
            AttachMode::Rig => {
                let Some(rig) = rig else {
                    return false;
                };
                let (Some(rig_world), Some(parent_world)) =
                    (scene.world_matrix(rig), scene.parent_world_matrix(rig))
                else {
                    return false;
                };
                // Placed from the captured rig pose. Hands riding on the rig
                // measure their delta in the rig's frame.
                let hand_position = hand_world.w_axis.truncate();
                let delta = match self.hand_in_rig {
                    Some(captured) if scene.is_descendant(self.hand, rig) => {
                        hand_position - rig_world.transform_point3(captured)
                    }
                    _ => hand_position - self.reference_position,
                };
                let desired = self.reference_matrix.w_axis.truncate() - delta;
                let local = parent_world.inverse().transform_point3(desired);
                scene.set_position(rig, local).is_ok()
            }
            AttachMode::Object => {
                let Some(parent_world) = scene.parent_world_matrix(target) else {
                    return false;
                };
                let desired_world = hand_world * self.reference_matrix;
                let local = parent_world.inverse() * desired_world;
                scene.set_local_matrix(target, local).is_ok()
            }
        }
    }

    /// Returns to Idle and stops the per-frame update. Yields the released
    /// target, if any.
    pub fn end(&mut self) -> Option<EntityId> {
        let released = self.target.take();
        if self.is_grabbing() {
            debug!(hand = ?self.hand, target = ?released, "grab ended");
        }
        self.state = AttachmentState::Idle;
        self.hand_in_rig = None;
        self.task = None;
        released
    }
}
