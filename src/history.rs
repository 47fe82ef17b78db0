use glam::Vec3;

/// Default window: two path segments.
pub const DEFAULT_CAPACITY: usize = 3;

/// Largest window a buffer will allocate.
pub const MAX_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedSample {
    pub position: Vec3,
    pub forward: Vec3, // Horizontal, world space
}

impl TrackedSample {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self { position, forward }
    }
}

/// Sliding window of the most recent samples of one tracked hand, oldest first.
///
/// Once full, pushing rotates the slots and overwrites the recycled one, so
/// the backing storage is allocated once.
#[derive(Clone, Debug)]
pub struct MotionHistoryBuffer {
    capacity: usize,
    samples: Vec<TrackedSample>,
    active: bool,
}

impl MotionHistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CAPACITY);
        Self {
            capacity,
            samples: Vec::with_capacity(capacity),
            active: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Starts a new session with an empty window.
    pub fn activate(&mut self) {
        self.samples.clear();
        self.active = true;
    }

    /// Ends the session. Samples stay readable until the next `activate`.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn push(&mut self, sample: TrackedSample) -> &[TrackedSample] {
        if self.samples.len() == self.capacity {
            self.samples.rotate_left(1);
            if let Some(slot) = self.samples.last_mut() {
                *slot = sample;
            }
        } else {
            self.samples.push(sample);
        }
        &self.samples
    }

    pub fn samples(&self) -> &[TrackedSample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&TrackedSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sum of distances between consecutive positions in the window.
    pub fn path_length(&self) -> f32 {
        self.samples
            .windows(2)
            .map(|pair| pair[0].position.distance(pair[1].position))
            .sum()
    }
}

impl Default for MotionHistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
