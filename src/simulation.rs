use tracing::{debug, warn};

use crate::behavior::Behavior;
use crate::bounds::BoundsCache;
use crate::config::{Config, GrabConfig, SwingConfig};
use crate::events::{Event, EventBus};
use crate::grabber::Grabber;
use crate::scene::{EntityId, Scene};
use crate::scheduler::Scheduler;
use crate::swinger::ArmSwinger;

/// Upper bound on events dispatched in one frame; guards against behaviors
/// whose outcome events retrigger themselves.
const MAX_EVENTS_PER_FRAME: usize = 1024;

/// Host-side collaborators shared by every behavior.
#[derive(Default)]
pub struct Host {
    pub scene: Scene,
    pub bounds: BoundsCache,
    pub events: EventBus,
    pub scheduler: Scheduler,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One scene plus its behaviors, stepped by the host render loop.
pub struct Simulation {
    pub host: Host,
    pub swingers: Vec<ArmSwinger>,
    pub grabbers: Vec<Grabber>,
    pub frame: u64,
    pub time: f32,
}

impl Simulation {
    pub fn new(scene: Scene) -> Self {
        Self {
            host: Host {
                scene,
                ..Host::default()
            },
            swingers: Vec::new(),
            grabbers: Vec::new(),
            frame: 0,
            time: 0.0,
        }
    }

    pub fn add_swinger(&mut self, config: SwingConfig, owner: Option<EntityId>) -> usize {
        let swinger = ArmSwinger::new(config, owner, &mut self.host);
        self.swingers.push(swinger);
        self.swingers.len() - 1
    }

    pub fn add_grabber(&mut self, config: GrabConfig, owner: Option<EntityId>) -> usize {
        let grabber = Grabber::new(config, owner, &mut self.host);
        self.grabbers.push(grabber);
        self.grabbers.len() - 1
    }

    /// Attaches every behavior described by `config` to `owner`.
    pub fn apply_config(&mut self, config: &Config, owner: Option<EntityId>) {
        if let Some(swing) = &config.swing {
            self.add_swinger(swing.clone(), owner);
        }
        for grab in &config.grab {
            self.add_grabber(grab.clone(), owner);
        }
    }

    /// Queues an interaction event (e.g. a controller button) for the next step.
    pub fn emit(&mut self, event: Event) {
        self.host.events.emit(event);
    }

    /// Advances one render frame: dispatches queued events, then runs
    /// locomotion (sample, aggregate, apply), then attachment tracking.
    pub fn step(&mut self, dt: f32) {
        self.dispatch();

        for swinger in &mut self.swingers {
            swinger.tick(dt, &mut self.host);
        }
        for grabber in &mut self.grabbers {
            grabber.tick(dt, &mut self.host);
        }

        self.frame += 1;
        self.time += dt;
    }

    fn dispatch(&mut self) {
        let mut dispatched = 0;
        while let Some(event) = self.host.events.pop() {
            dispatched += 1;
            if dispatched > MAX_EVENTS_PER_FRAME {
                warn!(
                    frame = self.frame,
                    pending = self.host.events.pending(),
                    "event storm; deferring the rest to the next frame"
                );
                self.host.events.emit(event);
                break;
            }

            let deliveries = self.host.events.deliveries(&self.host.scene, &event);
            if deliveries.is_empty() {
                continue;
            }
            debug!(name = %event.name, target = ?event.target, listeners = deliveries.len(), "dispatch");
            for swinger in &mut self.swingers {
                swinger.on_event(&event, &deliveries, &mut self.host);
            }
            for grabber in &mut self.grabbers {
                grabber.on_event(&event, &deliveries, &mut self.host);
            }
        }
    }

    /// Disables every behavior and drops cached bounds. The scene is kept.
    pub fn teardown(&mut self) {
        for swinger in &mut self.swingers {
            swinger.set_enabled(false, &mut self.host);
        }
        for grabber in &mut self.grabbers {
            grabber.set_enabled(false, &mut self.host);
        }
        self.swingers.clear();
        self.grabbers.clear();
        self.host.bounds.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attach::{AttachMode, AttachmentState};
    use crate::config::Scope;
    use crate::events::{DROPPED, GRABBED};
    use crate::mesh::Mesh;
    use glam::{Mat4, Vec3};

    struct Fixture {
        sim: Simulation,
        rig: EntityId,
        left: EntityId,
        right: EntityId,
        crate_box: EntityId,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let rig = scene.spawn("rig");
        let left = scene.spawn_child(rig, "left-hand").unwrap();
        let right = scene.spawn_child(rig, "right-hand").unwrap();
        scene.add_class(left, "hand").unwrap();
        scene.add_class(right, "hand").unwrap();
        scene.set_position(left, Vec3::new(-0.2, 1.0, -0.3)).unwrap();
        scene.set_position(right, Vec3::new(0.2, 1.0, -0.3)).unwrap();

        let crate_box = scene.spawn("crate");
        scene.add_class(crate_box, "grabbable").unwrap();
        scene.set_mesh(crate_box, Some(Mesh::cuboid(Vec3::splat(0.2)))).unwrap();
        scene.set_position(crate_box, Vec3::new(0.2, 1.0, -0.3)).unwrap();

        Fixture {
            sim: Simulation::new(scene),
            rig,
            left,
            right,
            crate_box,
        }
    }

    fn snapshot(sim: &Simulation) -> Vec<Mat4> {
        let scene = &sim.host.scene;
        let mut ids: Vec<EntityId> = scene.select(&"*".parse().unwrap());
        ids.sort();
        ids.into_iter().filter_map(|id| scene.world_matrix(id)).collect()
    }

    #[test]
    fn test_idle_frame_changes_nothing() {
        let mut f = fixture();
        f.sim.add_swinger(SwingConfig::default(), Some(f.rig));
        f.sim.add_grabber(GrabConfig::default(), Some(f.rig));

        let before = snapshot(&f.sim);
        for _ in 0..30 {
            f.sim.step(1.0 / 72.0);
        }
        assert_eq!(snapshot(&f.sim), before);
        assert_eq!(f.sim.host.scheduler.running(), 0);
    }

    #[test]
    fn test_carry_and_release_through_events() {
        let mut f = fixture();
        let g = f.sim.add_grabber(GrabConfig::default(), Some(f.rig));

        f.sim.emit(Event::new("gripdown", f.right));
        f.sim.step(0.016);
        assert_eq!(f.sim.grabbers[g].state(f.right), Some(AttachmentState::Grabbing));

        f.sim.host.scene.translate(f.right, Vec3::new(0.0, 0.0, -0.4)).unwrap();
        f.sim.step(0.016);
        let carried = f.sim.host.scene.world_position(f.crate_box).unwrap();
        assert!((carried - Vec3::new(0.2, 1.0, -0.7)).length() < 1e-4);

        f.sim.emit(Event::new("gripup", f.right));
        f.sim.step(0.016);
        assert_eq!(f.sim.grabbers[g].state(f.right), Some(AttachmentState::Idle));
        assert_eq!(f.sim.host.scheduler.running(), 0);

        f.sim.host.scene.translate(f.right, Vec3::new(0.0, 0.0, -0.4)).unwrap();
        f.sim.step(0.016);
        assert_eq!(f.sim.host.scene.world_position(f.crate_box), Some(carried));

        let log = f.sim.host.events.take_log();
        let names: Vec<&str> = log.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["gripdown", GRABBED, GRABBED, "gripup", DROPPED, DROPPED]);
    }

    #[test]
    fn test_gait_walk_scenario() {
        let mut scene = Scene::new();
        let rig = scene.spawn("rig");
        let hand = scene.spawn("hand");
        scene.add_class(hand, "hand").unwrap();
        // Hand X axis along -X so that its forward reads (0, 0, -1).
        scene.set_rotation(hand, glam::Quat::from_rotation_y(std::f32::consts::PI)).unwrap();

        let mut sim = Simulation::new(scene);
        sim.add_swinger(
            SwingConfig {
                scope: Scope::Global,
                rig: Some("#rig".into()),
                ..Default::default()
            },
            None,
        );
        sim.emit(Event::new("triggerdown", hand));

        let mut positions = Vec::new();
        for z in [0.0, -0.1, -0.2] {
            sim.host.scene.set_position(hand, Vec3::new(0.0, 0.0, z)).unwrap();
            let before = sim.host.scene.position(rig).unwrap();
            sim.step(0.1);
            positions.push(sim.host.scene.position(rig).unwrap() - before);
        }

        let gait = sim.swingers[0].gait(hand).unwrap();
        assert!((gait.history().path_length() - 0.2).abs() < 1e-5);
        let last = positions[2];
        assert!((last - Vec3::new(0.0, 0.0, 0.02)).length() < 1e-5);
    }

    #[test]
    fn test_climb_lifts_rig() {
        let mut f = fixture();
        let g = f.sim.add_grabber(
            GrabConfig {
                mode: AttachMode::Rig,
                ..Default::default()
            },
            Some(f.rig),
        );
        f.sim.emit(Event::new("gripdown", f.right));
        f.sim.step(0.016);
        assert_eq!(f.sim.grabbers[g].target(f.right), Some(f.crate_box));

        for _ in 0..10 {
            f.sim.host.scene.translate(f.right, Vec3::new(0.0, -0.05, 0.0)).unwrap();
            f.sim.step(0.016);
        }
        assert!((f.sim.host.scene.position(f.rig).unwrap() - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-4);
        // The crate stays put while climbing.
        assert!((f.sim.host.scene.world_position(f.crate_box).unwrap() - Vec3::new(0.2, 1.0, -0.3)).length() < 1e-6);
    }

    #[test]
    fn test_self_retriggering_config_is_bounded() {
        let mut f = fixture();
        f.sim.add_grabber(
            GrabConfig {
                start_event: GRABBED.into(),
                end_event: "gripup".into(),
                regrab: crate::attach::RegrabPolicy::Replace,
                ..Default::default()
            },
            Some(f.rig),
        );
        f.sim.emit(Event::new(GRABBED, f.right));
        f.sim.step(0.016);
        assert!(f.sim.host.events.pending() > 0);
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut f = fixture();
        f.sim.add_grabber(GrabConfig::default(), Some(f.rig));
        f.sim.add_swinger(SwingConfig::default(), Some(f.rig));
        f.sim.emit(Event::new("gripdown", f.right));
        f.sim.emit(Event::new("triggerdown", f.left));
        f.sim.step(0.016);
        assert_eq!(f.sim.host.scheduler.running(), 2);
        assert!(!f.sim.host.bounds.is_empty());

        f.sim.teardown();
        assert_eq!(f.sim.host.scheduler.running(), 0);
        assert_eq!(f.sim.host.events.listener_count(), 0);
        assert!(f.sim.host.bounds.is_empty());
    }

    #[test]
    fn test_apply_config() {
        let mut f = fixture();
        let config = Config::from_json_str(
            r#"{ "swing": {}, "grab": [ { "mode": "climb" }, { "mode": "carry" } ] }"#,
        )
        .unwrap();
        f.sim.apply_config(&config, Some(f.rig));
        assert_eq!(f.sim.swingers.len(), 1);
        assert_eq!(f.sim.grabbers.len(), 2);
        assert_eq!(f.sim.grabbers[0].mode(), AttachMode::Rig);
        assert_eq!(f.sim.grabbers[1].hands(), vec![f.left, f.right]);
    }
}
