//! The seam between behaviors and the host frame loop.

use crate::config::{parse_optional, Scope};
use crate::error::{Error, Result};
use crate::events::{Event, ListenerId};
use crate::scene::{EntityId, Scene, SelectorList};
use crate::simulation::Host;

pub trait Behavior {
    /// Called for every dispatched event that reached at least one listener.
    fn on_event(&mut self, event: &Event, deliveries: &[ListenerId], host: &mut Host);

    /// Called once per render frame.
    fn tick(&mut self, dt: f32, host: &mut Host);

    fn set_enabled(&mut self, enabled: bool, host: &mut Host);

    fn is_enabled(&self) -> bool;
}

/// Hands and rig a behavior operates on, resolved once at attach time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    pub hands: Vec<EntityId>,
    pub rig: Option<EntityId>,
}

pub fn bind(
    scene: &Scene,
    scope: Scope,
    owner: Option<EntityId>,
    hands: &str,
    rig: &Option<String>,
) -> Result<Bindings> {
    let hand_selector: SelectorList = hands.parse()?;
    let rig_selector = parse_optional(rig)?;

    match scope {
        Scope::Entity => {
            let owner = owner
                .filter(|&o| scene.contains(o))
                .ok_or_else(|| Error::InvalidConfig("entity scope needs an owner entity".into()))?;
            let rig = match rig_selector {
                Some(selector) => scene.select_within(owner, &selector).first().copied(),
                None => Some(owner),
            };
            Ok(Bindings {
                hands: scene.select_within(owner, &hand_selector),
                rig,
            })
        }
        Scope::Global => Ok(Bindings {
            hands: scene.select(&hand_selector),
            rig: rig_selector.and_then(|s| scene.select(&s).first().copied()),
        }),
    }
}
