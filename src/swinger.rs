//! Arm-swing locomotion: while the start event is held, swinging hands move
//! the rig.

use tracing::{debug, warn};

use crate::behavior::{bind, Behavior};
use crate::config::SwingConfig;
use crate::events::{Event, ListenerId, Subscription};
use crate::gait::{GaitEstimator, GaitSample};
use crate::locomotion::{aggregate, RigDisplacementApplier};
use crate::scene::EntityId;
use crate::scheduler::Throttle;
use crate::simulation::Host;

const TASK_LABEL: &str = "arm-swing";

struct SwingHand {
    entity: EntityId,
    gait: GaitEstimator,
    listening: Option<(Subscription, Subscription)>,
}

pub struct ArmSwinger {
    config: SwingConfig,
    hands: Vec<SwingHand>,
    rig: Option<EntityId>,
    throttle: Throttle,
    applier: RigDisplacementApplier,
    inert: bool,
    enabled: bool,
}

impl ArmSwinger {
    /// Binds hands and rig per the configured scope. An invalid configuration
    /// leaves the swinger inert.
    pub fn new(config: SwingConfig, owner: Option<EntityId>, host: &mut Host) -> Self {
        let bindings = config
            .validate()
            .and_then(|_| bind(&host.scene, config.scope, owner, &config.hands, &config.rig));

        let mut swinger = Self {
            hands: Vec::new(),
            rig: None,
            throttle: Throttle::new(config.sample_interval()),
            applier: RigDisplacementApplier::new(),
            inert: false,
            enabled: false,
            config,
        };

        match bindings {
            Ok(b) => {
                if b.hands.is_empty() {
                    debug!(selector = %swinger.config.hands, "arm swinger matched no hands");
                }
                if b.rig.is_none() {
                    debug!("arm swinger has no rig; swinging will not move anything");
                }
                swinger.rig = b.rig;
                swinger.hands = b
                    .hands
                    .into_iter()
                    .map(|entity| SwingHand {
                        entity,
                        gait: GaitEstimator::new(swinger.config.history),
                        listening: None,
                    })
                    .collect();
            }
            Err(e) => {
                warn!(error = %e, "arm swinger left inert");
                swinger.inert = true;
            }
        }

        if swinger.config.enabled {
            swinger.set_enabled(true, host);
        }
        swinger
    }

    pub fn is_inert(&self) -> bool {
        self.inert
    }

    pub fn rig(&self) -> Option<EntityId> {
        self.rig
    }

    pub fn hands(&self) -> Vec<EntityId> {
        self.hands.iter().map(|h| h.entity).collect()
    }

    pub fn is_swinging(&self, hand: EntityId) -> bool {
        self.hands
            .iter()
            .any(|h| h.entity == hand && h.gait.is_active())
    }

    /// Whether the per-frame displacement step is registered.
    pub fn is_running(&self) -> bool {
        self.applier.is_running()
    }

    pub fn gait(&self, hand: EntityId) -> Option<&GaitEstimator> {
        self.hands.iter().find(|h| h.entity == hand).map(|h| &h.gait)
    }

    fn start_swing(&mut self, index: usize, host: &mut Host) {
        if !self.applier.is_running() {
            self.throttle.reset();
            self.applier.start(&host.scheduler, TASK_LABEL);
        }
        let hand = &mut self.hands[index];
        hand.gait.activate();
        debug!(hand = ?hand.entity, "swing started");
    }

    fn end_swing(&mut self, index: usize) {
        let hand = &mut self.hands[index];
        if !hand.gait.is_active() {
            return;
        }
        hand.gait.deactivate();
        debug!(hand = ?hand.entity, "swing ended");

        if !self.hands.iter().any(|h| h.gait.is_active()) {
            self.applier.stop();
        }
    }
}

impl Behavior for ArmSwinger {
    fn on_event(&mut self, _event: &Event, deliveries: &[ListenerId], host: &mut Host) {
        for index in 0..self.hands.len() {
            let (starts, ends) = match &self.hands[index].listening {
                Some((start, end)) => (start.hears(deliveries), end.hears(deliveries)),
                None => continue,
            };
            if starts {
                self.start_swing(index, host);
            } else if ends {
                self.end_swing(index);
            }
        }
    }

    fn tick(&mut self, dt: f32, host: &mut Host) {
        if !self.applier.is_running() {
            return;
        }

        if let Some(elapsed) = self.throttle.advance(dt) {
            let up = self.config.up.normalize();
            let scene = &host.scene;
            let samples: Vec<GaitSample> = self
                .hands
                .iter_mut()
                .filter_map(|h| {
                    let world = scene.world_matrix(h.entity)?;
                    h.gait.sample(&world, up)
                })
                .collect();
            self.applier
                .stage(aggregate(samples, elapsed, self.config.scaling));
        }

        if let Some(rig) = self.rig {
            self.applier.apply(&mut host.scene, rig);
        }
    }

    fn set_enabled(&mut self, enabled: bool, host: &mut Host) {
        if self.inert {
            return;
        }
        self.enabled = enabled;

        for hand in &mut self.hands {
            if enabled {
                if hand.listening.is_none() {
                    hand.listening = Some((
                        host.events.subscribe(hand.entity, &self.config.start_event),
                        host.events.subscribe(hand.entity, &self.config.end_event),
                    ));
                }
            } else {
                hand.listening = None;
                hand.gait.deactivate();
            }
        }
        if !enabled {
            self.applier.stop();
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Scope;
    use glam::Vec3;

    fn host() -> (Host, EntityId, EntityId, EntityId) {
        let mut host = Host::new();
        let rig = host.scene.spawn("rig");
        let left = host.scene.spawn("left");
        let right = host.scene.spawn("right");
        host.scene.add_class(left, "hand").unwrap();
        host.scene.add_class(right, "hand").unwrap();
        (host, rig, left, right)
    }

    fn global() -> SwingConfig {
        SwingConfig {
            scope: Scope::Global,
            rig: Some("#rig".into()),
            ..Default::default()
        }
    }

    fn deliver(swinger: &mut ArmSwinger, host: &mut Host, name: &str, target: EntityId) {
        let event = Event::new(name, target);
        let deliveries = host.events.deliveries(&host.scene, &event);
        swinger.on_event(&event, &deliveries, host);
    }

    #[test]
    fn test_task_lifecycle_follows_hands() {
        let (mut host, _, left, right) = host();
        let mut swinger = ArmSwinger::new(global(), None, &mut host);
        assert_eq!(host.events.listener_count(), 4);
        assert!(!swinger.is_running());

        deliver(&mut swinger, &mut host, "triggerdown", left);
        deliver(&mut swinger, &mut host, "triggerdown", right);
        assert!(host.scheduler.is_running(TASK_LABEL));
        assert_eq!(host.scheduler.running(), 1);

        deliver(&mut swinger, &mut host, "triggerup", left);
        assert!(swinger.is_running());
        deliver(&mut swinger, &mut host, "triggerup", right);
        assert!(!swinger.is_running());
        assert_eq!(host.scheduler.running(), 0);
    }

    #[test]
    fn test_swinging_moves_rig_against_forward() {
        let (mut host, rig, left, _) = host();
        let mut swinger = ArmSwinger::new(global(), None, &mut host);
        deliver(&mut swinger, &mut host, "triggerdown", left);

        // Identity orientation faces +Z, so the rig should drift toward -Z.
        for step in 0..10 {
            let z = if step % 2 == 0 { 0.0 } else { 0.3 };
            host.scene.set_position(left, Vec3::new(0.0, 1.0, z)).unwrap();
            swinger.tick(0.1, &mut host);
        }
        let p = host.scene.position(rig).unwrap();
        assert!(p.z < -0.1);
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
    }

    #[test]
    fn test_idle_swinger_leaves_rig_alone() {
        let (mut host, rig, left, _) = host();
        let mut swinger = ArmSwinger::new(global(), None, &mut host);
        for step in 0..10 {
            host.scene.set_position(left, Vec3::new(0.0, 0.0, step as f32)).unwrap();
            swinger.tick(0.1, &mut host);
        }
        assert_eq!(host.scene.position(rig), Some(Vec3::ZERO));
        assert!(swinger.gait(left).unwrap().history().is_empty());
    }

    #[test]
    fn test_invalid_selector_is_inert() {
        let (mut host, ..) = host();
        let config = SwingConfig {
            hands: "not a selector".into(),
            ..global()
        };
        let swinger = ArmSwinger::new(config, None, &mut host);
        assert!(swinger.is_inert());
        assert!(!swinger.is_enabled());
        assert_eq!(host.events.listener_count(), 0);
    }

    #[test]
    fn test_oversize_history_is_inert() {
        let (mut host, ..) = host();
        let config = crate::config::Config::from_json_str(
            r##"{ "swing": { "scope": "global", "rig": "#rig", "history": 1000000000000000000 } }"##,
        )
        .unwrap();
        let swinger = ArmSwinger::new(config.swing.unwrap(), None, &mut host);
        assert!(swinger.is_inert());
        assert_eq!(host.events.listener_count(), 0);
    }

    #[test]
    fn test_disable_drops_listeners_and_task() {
        let (mut host, _, left, _) = host();
        let mut swinger = ArmSwinger::new(global(), None, &mut host);
        deliver(&mut swinger, &mut host, "triggerdown", left);
        assert!(swinger.is_running());

        swinger.set_enabled(false, &mut host);
        assert_eq!(host.events.listener_count(), 0);
        assert_eq!(host.scheduler.running(), 0);
        assert!(!swinger.is_swinging(left));

        swinger.set_enabled(true, &mut host);
        assert_eq!(host.events.listener_count(), 4);
    }

    #[test]
    fn test_entity_scope_uses_owner_as_rig() {
        let mut host = Host::new();
        let rig = host.scene.spawn("rig");
        let hand = host.scene.spawn_child(rig, "hand").unwrap();
        host.scene.add_class(hand, "hand").unwrap();
        let elsewhere = host.scene.spawn("elsewhere");
        host.scene.add_class(elsewhere, "hand").unwrap();

        let swinger = ArmSwinger::new(SwingConfig::default(), Some(rig), &mut host);
        assert_eq!(swinger.rig(), Some(rig));
        assert_eq!(swinger.hands(), vec![hand]);
    }
}
