//! Gait estimation from a hand's recent poses.
//!
//! The swing distance is the path length over the history window, which
//! damps per-sample jitter. The forward direction comes from the hand's
//! orientation rather than its path, so it stays put when the hand reverses
//! at the end of a swing.

use glam::{Mat4, Vec3};
use tracing::trace;

use crate::history::{MotionHistoryBuffer, TrackedSample};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaitSample {
    pub swing_distance: f32,
    pub forward: Vec3,
}

/// Horizontal direction encoded by the hand pose: its world X axis crossed
/// with `up`. The length shrinks as the X axis tilts toward `up`.
pub fn horizontal_forward(world: &Mat4, up: Vec3) -> Vec3 {
    world.x_axis.truncate().cross(up)
}

pub struct GaitEstimator {
    history: MotionHistoryBuffer,
}

impl GaitEstimator {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: MotionHistoryBuffer::new(capacity),
        }
    }

    pub fn history(&self) -> &MotionHistoryBuffer {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        self.history.is_active()
    }

    pub fn activate(&mut self) {
        self.history.activate();
    }

    pub fn deactivate(&mut self) {
        self.history.deactivate();
    }

    /// Samples the hand's current world transform. Inactive hands contribute
    /// nothing.
    pub fn sample(&mut self, world: &Mat4, up: Vec3) -> Option<GaitSample> {
        if !self.history.is_active() {
            return None;
        }
        let position = world.w_axis.truncate();
        let forward = horizontal_forward(world, up);
        Some(self.record(TrackedSample::new(position, forward)))
    }

    /// Pushes a pre-extracted sample and reads the gait back out.
    pub fn record(&mut self, sample: TrackedSample) -> GaitSample {
        self.history.push(sample);
        let swing_distance = self.history.path_length();
        trace!(swing_distance, forward = ?sample.forward, "gait sample");
        GaitSample {
            swing_distance,
            forward: sample.forward,
        }
    }
}

impl Default for GaitEstimator {
    fn default() -> Self {
        Self {
            history: MotionHistoryBuffer::default(),
        }
    }
}
