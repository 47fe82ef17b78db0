//! Per-frame task registration and the fixed-interval sampling throttle.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

#[derive(Default)]
struct Registry {
    next_id: u64,
    running: BTreeMap<u64, String>,
}

/// Registry of recurring per-frame work. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct Scheduler {
    registry: Rc<RefCell<Registry>>,
}

/// A running per-frame task. Dropping it stops the task.
#[must_use = "dropping a FrameTask stops it immediately"]
pub struct FrameTask {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, label: impl Into<String>) -> FrameTask {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.running.insert(id, label.into());
        FrameTask {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    pub fn running(&self) -> usize {
        self.registry.borrow().running.len()
    }

    pub fn is_running(&self, label: &str) -> bool {
        self.registry.borrow().running.values().any(|l| l == label)
    }

    pub fn labels(&self) -> Vec<String> {
        self.registry.borrow().running.values().cloned().collect()
    }
}

impl FrameTask {
    pub fn is_live(&self) -> bool {
        self.registry
            .upgrade()
            .map_or(false, |r| r.borrow().running.contains_key(&self.id))
    }
}

impl Drop for FrameTask {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().running.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for FrameTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FrameTask").field(&self.id).finish()
    }
}

/// Fires at most once per `interval` seconds of accumulated frame time.
#[derive(Clone, Copy, Debug)]
pub struct Throttle {
    interval: f32,
    since_last: f32,
}

impl Throttle {
    // Absorbs float accumulation error so 0.1 + 0.1 + ... lands on the tick.
    const EPSILON: f32 = 1e-5;

    pub fn new(interval: f32) -> Self {
        Self {
            interval: interval.max(0.0),
            since_last: 0.0,
        }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Adds `dt`; returns the time elapsed since the previous firing when due.
    pub fn advance(&mut self, dt: f32) -> Option<f32> {
        self.since_last += dt.max(0.0);
        if self.since_last + Self::EPSILON >= self.interval {
            let elapsed = self.since_last;
            self.since_last = 0.0;
            Some(elapsed)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.since_last = 0.0;
    }
}
