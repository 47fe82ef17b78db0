//! Combining per-hand gait into a rig displacement, and applying it.

use glam::Vec3;
use tracing::trace;

use crate::gait::GaitSample;
use crate::scene::{EntityId, Scene};
use crate::scheduler::{FrameTask, Scheduler};

/// Reduces the active hands' gait to one rig displacement.
///
/// Forwards are summed unweighted, so hands swinging the same way reinforce
/// and opposed hands cancel. The magnitude is driven by the largest swing,
/// not the sum, so two hands in sync do not double the speed. The rig moves
/// against the combined forward direction.
pub fn aggregate<I>(samples: I, elapsed: f32, scaling: f32) -> Vec3
where
    I: IntoIterator<Item = GaitSample>,
{
    let mut direction = Vec3::ZERO;
    let mut distance: f32 = 0.0;
    for sample in samples {
        direction += sample.forward;
        distance = distance.max(sample.swing_distance);
    }

    direction.y = 0.0;
    let direction = direction.normalize_or_zero();
    direction * (-scaling * distance * elapsed)
}

/// Holds the latest aggregated displacement until a frame applies it.
///
/// Each result is applied whole on the first frame after it is staged and
/// never again, so the rig advances in one step per sampling tick rather
/// than being spread across the frames in between.
#[derive(Debug, Default)]
pub struct RigDisplacementApplier {
    pending: Option<Vec3>,
    task: Option<FrameTask>,
}

impl RigDisplacementApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, scheduler: &Scheduler, label: &str) {
        if self.task.is_none() {
            self.task = Some(scheduler.start(label));
        }
    }

    /// Stops per-frame application and discards any unapplied displacement.
    pub fn stop(&mut self) {
        self.task = None;
        self.pending = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn stage(&mut self, displacement: Vec3) {
        self.pending = Some(displacement);
    }

    pub fn pending(&self) -> Option<Vec3> {
        self.pending
    }

    /// Adds the staged displacement to the rig once. Returns whether the rig
    /// moved.
    pub fn apply(&mut self, scene: &mut Scene, rig: EntityId) -> bool {
        if self.task.is_none() {
            return false;
        }
        let Some(displacement) = self.pending.take() else {
            return false;
        };
        if displacement == Vec3::ZERO {
            return false;
        }
        trace!(?rig, ?displacement, "moving rig");
        scene.translate(rig, displacement).is_ok()
    }
}
