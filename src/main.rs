use std::f32::consts::TAU;

use clap::{Parser, ValueEnum};
use glam::Vec3;
use hand_locomotion::{
    AttachMode, Config, EntityId, Event, GrabConfig, Mesh, Scene, Simulation, SwingConfig,
};
use indicatif::ProgressBar;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// Both hands swing while holding the trigger.
    Walk,
    /// Right hand grips the ledge and pulls down.
    Climb,
    /// Right hand grips the crate and sweeps it sideways.
    Carry,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_enum, default_value_t = Scenario::Walk)]
    scenario: Scenario,

    /// Number of frames to run
    #[arg(short, long, default_value_t = 360)]
    frames: usize,

    /// Frame time in seconds
    #[arg(long, default_value_t = 1.0 / 72.0)]
    dt: f32,

    /// JSON behavior configuration replacing the scenario defaults
    #[arg(short, long)]
    config: Option<String>,

    /// STL file giving the crate its geometry
    #[arg(long)]
    stl: Option<String>,

    /// Seed for tracking jitter
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

struct Demo {
    rig: EntityId,
    left: EntityId,
    right: EntityId,
    ledge: EntityId,
    crate_box: EntityId,
}

fn build_scene(scene: &mut Scene) -> hand_locomotion::Result<Demo> {
    let rig = scene.spawn("rig");
    let left = scene.spawn_child(rig, "left-hand")?;
    let right = scene.spawn_child(rig, "right-hand")?;
    scene.add_class(left, "hand")?;
    scene.add_class(right, "hand")?;
    scene.set_position(left, Vec3::new(-0.2, 1.0, -0.3))?;
    scene.set_position(right, Vec3::new(0.2, 1.0, -0.3))?;

    let ledge = scene.spawn("ledge");
    scene.add_class(ledge, "climbable")?;
    scene.set_mesh(ledge, Some(Mesh::cuboid(Vec3::new(1.0, 0.05, 0.1))))?;
    scene.set_position(ledge, Vec3::new(0.0, 1.0, -0.3))?;

    let crate_box = scene.spawn("crate");
    scene.add_class(crate_box, "grabbable")?;
    scene.set_mesh(crate_box, Some(Mesh::cuboid(Vec3::splat(0.15))))?;
    scene.set_position(crate_box, Vec3::new(0.25, 1.0, -0.35))?;

    Ok(Demo { rig, left, right, ledge, crate_box })
}

fn default_config(scenario: Scenario) -> Config {
    match scenario {
        Scenario::Walk => Config {
            swing: Some(SwingConfig::default()),
            grab: Vec::new(),
        },
        Scenario::Climb => Config {
            swing: None,
            grab: vec![GrabConfig {
                mode: AttachMode::Rig,
                candidates: ".climbable".to_string(),
                ..Default::default()
            }],
        },
        Scenario::Carry => Config {
            swing: None,
            grab: vec![GrabConfig {
                proximity: true,
                ..Default::default()
            }],
        },
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut scene = Scene::new();
    let demo = match build_scene(&mut scene) {
        Ok(demo) => demo,
        Err(e) => {
            error!("failed to build demo scene: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(stl_path) = &args.stl {
        info!("loading crate geometry from {}", stl_path);
        match Mesh::load_stl(stl_path) {
            Ok(mesh) => {
                info!("loaded mesh with {} triangles", mesh.triangles.len());
                if let Err(e) = scene.set_mesh(demo.crate_box, Some(mesh)) {
                    error!("failed to attach mesh: {}", e);
                }
            }
            Err(e) => error!("error loading STL: {}", e),
        }
    }

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => default_config(args.scenario),
    };

    let mut sim = Simulation::new(scene);
    sim.apply_config(&config, Some(demo.rig));

    let (start, end) = match args.scenario {
        Scenario::Walk => ("triggerdown", "triggerup"),
        Scenario::Climb | Scenario::Carry => ("gripdown", "gripup"),
    };
    match args.scenario {
        Scenario::Walk => {
            sim.emit(Event::new(start, demo.left));
            sim.emit(Event::new(start, demo.right));
        }
        Scenario::Climb | Scenario::Carry => sim.emit(Event::new(start, demo.right)),
    }

    info!("running {:?} for {} frames", args.scenario, args.frames);
    let mut rng = fastrand::Rng::with_seed(args.seed);
    let bar = ProgressBar::new(args.frames as u64);

    for frame in 0..args.frames {
        let t = frame as f32 * args.dt;
        let jitter = Vec3::new(rng.f32() - 0.5, rng.f32() - 0.5, rng.f32() - 0.5) * 0.002;

        let moves = match args.scenario {
            Scenario::Walk => {
                let swing = 0.25 * (t * TAU).sin();
                vec![
                    (demo.left, Vec3::new(-0.2, 1.0, -0.3 + swing) + jitter),
                    (demo.right, Vec3::new(0.2, 1.0, -0.3 - swing) + jitter),
                ]
            }
            Scenario::Climb => {
                let pull = (t * 0.5).min(0.6);
                vec![(demo.right, Vec3::new(0.2, 1.0 - pull, -0.3) + jitter)]
            }
            Scenario::Carry => {
                let sweep = 0.5 * (t * 0.5 * TAU).sin();
                vec![(demo.right, Vec3::new(0.2 + sweep, 1.0, -0.3) + jitter)]
            }
        };
        for (hand, position) in moves {
            if let Err(e) = sim.host.scene.set_position(hand, position) {
                error!("failed to move hand: {}", e);
            }
        }

        if frame + 1 == args.frames {
            match args.scenario {
                Scenario::Walk => {
                    sim.emit(Event::new(end, demo.left));
                    sim.emit(Event::new(end, demo.right));
                }
                Scenario::Climb | Scenario::Carry => sim.emit(Event::new(end, demo.right)),
            }
        }

        sim.step(args.dt);
        bar.inc(1);
    }
    // Flush the end events.
    sim.step(args.dt);
    bar.finish();

    let rig = sim.host.scene.position(demo.rig).unwrap_or(Vec3::ZERO);
    let ledge = sim.host.scene.world_position(demo.ledge).unwrap_or(Vec3::ZERO);
    let crate_box = sim.host.scene.world_position(demo.crate_box).unwrap_or(Vec3::ZERO);
    let events = sim.host.events.take_log();

    println!("Simulated {} frames ({:.2}s)", sim.frame, sim.time);
    println!("Rig position:   {:.3} {:.3} {:.3}", rig.x, rig.y, rig.z);
    println!("Ledge position: {:.3} {:.3} {:.3}", ledge.x, ledge.y, ledge.z);
    println!("Crate position: {:.3} {:.3} {:.3}", crate_box.x, crate_box.y, crate_box.z);
    println!("Events dispatched: {}", events.len());
    for event in events.iter().filter(|e| e.counterpart.is_some()) {
        println!("  {} on {:?} ({:?})", event.name, event.target, event.counterpart);
    }
    println!("Active frame tasks after run: {}", sim.host.scheduler.running());
}
