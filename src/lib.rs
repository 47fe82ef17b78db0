//! Hand-driven locomotion and grabbing for tracked controllers.
//!
//! Two families of behavior run on top of a small scene-graph host:
//!
//! * [`ArmSwinger`] turns swinging hands into rig motion. Each hand's recent
//!   poses go through a [`MotionHistoryBuffer`] and [`GaitEstimator`]; the
//!   hands are combined by [`locomotion::aggregate`] on a throttled cadence and
//!   applied every frame.
//! * [`Grabber`] picks an object on a grip event ([`grab::resolve`]: sphere
//!   broad phase, box narrow phase, smallest box wins) and keeps it attached,
//!   either moving the rig against the hand (climbing) or carrying the object.
//!
//! [`Simulation`] owns the [`Host`] and steps everything in frame order.

pub mod attach;
pub mod behavior;
pub mod bounds;
pub mod config;
pub mod error;
pub mod events;
pub mod gait;
pub mod grab;
pub mod grabber;
pub mod history;
pub mod locomotion;
pub mod mesh;
pub mod scene;
pub mod scheduler;
pub mod simulation;
pub mod swinger;

pub use attach::{AttachMode, Attachment, AttachmentState, RegrabPolicy};
pub use behavior::Behavior;
pub use bounds::{Aabb, BoundingSphere, BoundingVolume, BoundsCache};
pub use config::{Config, GrabConfig, Scope, SwingConfig};
pub use error::{Error, Result};
pub use events::{Event, EventBus, Subscription};
pub use gait::{GaitEstimator, GaitSample};
pub use grab::{GrabCandidate, Pick};
pub use grabber::Grabber;
pub use history::{MotionHistoryBuffer, TrackedSample};
pub use locomotion::RigDisplacementApplier;
pub use mesh::{Mesh, Triangle};
pub use scene::{EntityId, Scene, Selector, SelectorList};
pub use scheduler::{FrameTask, Scheduler, Throttle};
pub use simulation::{Host, Simulation};
pub use swinger::ArmSwinger;
