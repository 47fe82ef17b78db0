//! Behavior configuration, loadable from JSON.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::attach::{AttachMode, RegrabPolicy};
use crate::error::{Error, Result};
use crate::history::{DEFAULT_CAPACITY, MAX_CAPACITY};
use crate::scene::SelectorList;

/// Where a behavior looks for its hands and rig.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Attached to an owner entity: the owner is the rig and selectors only
    /// match inside its subtree.
    #[default]
    Entity,
    /// Selectors match scene-wide and the rig comes from its own selector.
    Global,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingConfig {
    pub enabled: bool,
    pub scope: Scope,
    pub hands: String,
    pub rig: Option<String>,
    pub start_event: String,
    pub end_event: String,
    pub scaling: f32,
    pub history: usize,
    pub sample_interval_ms: u64,
    pub up: Vec3,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: Scope::Entity,
            hands: ".hand".to_string(),
            rig: None,
            start_event: "triggerdown".to_string(),
            end_event: "triggerup".to_string(),
            scaling: 1.0,
            history: DEFAULT_CAPACITY,
            sample_interval_ms: 100,
            up: Vec3::Y,
        }
    }
}

impl SwingConfig {
    pub fn validate(&self) -> Result<()> {
        self.hands.parse::<SelectorList>()?;
        parse_optional(&self.rig)?;
        check_event_names(&self.start_event, &self.end_event)?;
        if !self.scaling.is_finite() {
            return Err(Error::InvalidConfig(format!("scaling must be finite, got {}", self.scaling)));
        }
        if self.history == 0 || self.history > MAX_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "history must hold between 1 and {MAX_CAPACITY} samples, got {}",
                self.history
            )));
        }
        if !self.up.is_finite() || self.up.length_squared() < 1e-12 {
            return Err(Error::InvalidConfig("up axis must be a non-zero vector".into()));
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> f32 {
        self.sample_interval_ms as f32 / 1000.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabConfig {
    pub enabled: bool,
    pub scope: Scope,
    pub mode: AttachMode,
    pub regrab: RegrabPolicy,
    pub hands: String,
    pub rig: Option<String>,
    pub candidates: String,
    pub start_event: String,
    pub end_event: String,
    /// Used for hands that carry no geometry of their own.
    pub hand_radius: f32,
    /// Emit `near`/`far` as the best reachable candidate of an idle hand changes.
    pub proximity: bool,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: Scope::Entity,
            mode: AttachMode::Object,
            regrab: RegrabPolicy::Ignore,
            hands: ".hand".to_string(),
            rig: None,
            candidates: ".grabbable".to_string(),
            start_event: "gripdown".to_string(),
            end_event: "gripup".to_string(),
            hand_radius: 0.05,
            proximity: false,
        }
    }
}

impl GrabConfig {
    pub fn validate(&self) -> Result<()> {
        self.hands.parse::<SelectorList>()?;
        self.candidates.parse::<SelectorList>()?;
        parse_optional(&self.rig)?;
        check_event_names(&self.start_event, &self.end_event)?;
        if !(self.hand_radius.is_finite() && self.hand_radius > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "hand_radius must be positive, got {}",
                self.hand_radius
            )));
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub swing: Option<SwingConfig>,
    pub grab: Vec<GrabConfig>,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

pub(crate) fn parse_optional(selector: &Option<String>) -> Result<Option<SelectorList>> {
    selector.as_deref().map(str::parse::<SelectorList>).transpose()
}

fn check_event_names(start: &str, end: &str) -> Result<()> {
    if start.trim().is_empty() || end.trim().is_empty() {
        return Err(Error::InvalidConfig("event names must not be empty".into()));
    }
    if start == end {
        return Err(Error::InvalidConfig(format!("start and end events are both `{start}`")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SwingConfig::default().validate().is_ok());
        assert!(GrabConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = Config::from_json_str(
            r##"{
                "swing": { "scope": "global", "rig": "#rig", "scaling": 2.5 },
                "grab": [
                    { "mode": "rig", "candidates": ".climbable" },
                    { "regrab": "replace", "proximity": true }
                ]
            }"##,
        )
        .unwrap();

        let swing = config.swing.unwrap();
        assert_eq!(swing.scope, Scope::Global);
        assert_eq!(swing.rig.as_deref(), Some("#rig"));
        assert_eq!(swing.scaling, 2.5);
        assert_eq!(swing.start_event, "triggerdown");
        assert_eq!(swing.history, 3);

        assert_eq!(config.grab.len(), 2);
        assert_eq!(config.grab[0].mode, AttachMode::Rig);
        assert_eq!(config.grab[0].start_event, "gripdown");
        assert_eq!(config.grab[1].regrab, RegrabPolicy::Replace);
        assert!(config.grab[1].proximity);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let bad_selector = SwingConfig {
            hands: "left hand".into(),
            ..Default::default()
        };
        assert!(matches!(bad_selector.validate(), Err(Error::InvalidSelector(_))));

        let bad_scaling = SwingConfig {
            scaling: f32::NAN,
            ..Default::default()
        };
        assert!(matches!(bad_scaling.validate(), Err(Error::InvalidConfig(_))));

        let same_events = GrabConfig {
            end_event: "gripdown".into(),
            ..Default::default()
        };
        assert!(same_events.validate().is_err());

        let huge_history = SwingConfig {
            history: MAX_CAPACITY + 1,
            ..Default::default()
        };
        assert!(matches!(huge_history.validate(), Err(Error::InvalidConfig(_))));

        let bad_radius = GrabConfig {
            hand_radius: 0.0,
            ..Default::default()
        };
        assert!(bad_radius.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(Config::from_json_str("{ swing: "), Err(Error::Json(_))));
        assert!(matches!(Config::load("no/such/config.json"), Err(Error::Io(_))));
    }
}
