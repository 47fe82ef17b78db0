//! Named interaction events with target + bubbling delivery.
//!
//! Listeners are held through [`Subscription`] handles; dropping the handle
//! removes the listener, so nothing outlives the behavior state that owns it.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};

use crate::scene::{EntityId, Scene};

pub const GRABBED: &str = "grabbed";
pub const DROPPED: &str = "dropped";
pub const NEAR: &str = "near";
pub const FAR: &str = "far";

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: String,
    pub target: EntityId,
    /// The other party of an interaction outcome (hand or grabbed object).
    pub counterpart: Option<EntityId>,
}

impl Event {
    pub fn new(name: &str, target: EntityId) -> Self {
        Self {
            name: name.to_string(),
            target,
            counterpart: None,
        }
    }

    pub fn with_counterpart(mut self, counterpart: EntityId) -> Self {
        self.counterpart = Some(counterpart);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

struct Listener {
    target: EntityId,
    name: String,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<ListenerId, Listener>,
}

/// Listener registration; unsubscribes when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: ListenerId,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn hears(&self, deliveries: &[ListenerId]) -> bool {
        deliveries.contains(&self.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().listeners.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Subscription").field(&self.id).finish()
    }
}

#[derive(Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
    queue: VecDeque<Event>,
    log: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, target: EntityId, name: &str) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.insert(
            id,
            Listener {
                target,
                name: name.to_string(),
            },
        );
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Queues an event for the next dispatch pass.
    pub fn emit(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    /// Takes the next queued event and records it in the dispatch log.
    pub fn pop(&mut self) -> Option<Event> {
        let event = self.queue.pop_front()?;
        self.log.push(event.clone());
        Some(event)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Listeners that receive `event`: those registered on its target or on
    /// any ancestor of the target.
    pub fn deliveries(&self, scene: &Scene, event: &Event) -> Vec<ListenerId> {
        let registry = self.registry.borrow();
        registry
            .listeners
            .iter()
            .filter(|(_, l)| {
                l.name == event.name
                    && (l.target == event.target || scene.is_descendant(event.target, l.target))
            })
            .map(|(&id, _)| id)
            .collect()
    }

    /// Every event dispatched since the last call, in dispatch order.
    pub fn take_log(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_bubble_to_ancestors() {
        let mut scene = Scene::new();
        let hand = scene.spawn("hand");
        let finger = scene.spawn_child(hand, "finger").unwrap();
        let other = scene.spawn("other");

        let bus = EventBus::new();
        let on_hand = bus.subscribe(hand, "gripdown");
        let on_other = bus.subscribe(other, "gripdown");
        let wrong_name = bus.subscribe(hand, "gripup");

        let hits = bus.deliveries(&scene, &Event::new("gripdown", finger));
        assert!(on_hand.hears(&hits));
        assert!(!on_other.hears(&hits));
        assert!(!wrong_name.hears(&hits));
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let mut scene = Scene::new();
        let hand = scene.spawn("hand");
        let bus = EventBus::new();

        let sub = bus.subscribe(hand, "gripdown");
        assert_eq!(bus.listener_count(), 1);
        drop(sub);
        assert_eq!(bus.listener_count(), 0);
        assert!(bus.deliveries(&scene, &Event::new("gripdown", hand)).is_empty());
    }

    #[test]
    fn test_subscription_outliving_bus_is_harmless() {
        let mut scene = Scene::new();
        let hand = scene.spawn("hand");
        let bus = EventBus::new();
        let sub = bus.subscribe(hand, "gripdown");
        drop(bus);
        drop(sub);
    }

    #[test]
    fn test_queue_and_log() {
        let mut scene = Scene::new();
        let hand = scene.spawn("hand");
        let mut bus = EventBus::new();

        bus.emit(Event::new("a", hand));
        bus.emit(Event::new("b", hand));
        assert_eq!(bus.pending(), 2);
        assert_eq!(bus.pop().map(|e| e.name), Some("a".to_string()));
        assert_eq!(bus.take_log().len(), 1);
        assert!(bus.take_log().is_empty());
    }
}
