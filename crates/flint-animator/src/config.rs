//! Animator tuning loaded from TOML

use crate::names::TEMPLATE_DEFAULT;
use flint_core::{FlintError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime tuning shared by animator instances.
///
/// ```toml
/// max_dispatch_depth = 8
/// particle_cooldown = 0.2
/// disappear_frames = 100
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    /// Nested dispatches allowed before re-entry is refused
    pub max_dispatch_depth: u32,
    /// Minimum seconds between two particle spawns of one instance
    pub particle_cooldown: f32,
    /// Frames a disappear fade lasts
    pub disappear_frames: u32,
    /// Alpha removed per fade frame
    pub disappear_alpha_step: f32,
    /// Template used when the requested one is unknown
    pub default_template: String,
    /// State index `reset_state` returns to
    pub first_specific_state: usize,
    pub auto_switch_animation: bool,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            max_dispatch_depth: 8,
            particle_cooldown: 0.2,
            disappear_frames: 100,
            disappear_alpha_step: 0.025,
            default_template: TEMPLATE_DEFAULT.to_string(),
            first_specific_state: 4,
            auto_switch_animation: false,
        }
    }
}

impl AnimatorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnimatorConfig = toml::from_str(content)?;
        if config.max_dispatch_depth == 0 {
            return Err(FlintError::AnimatorError(
                "max_dispatch_depth must be at least 1".into(),
            ));
        }
        if config.disappear_frames == 0 {
            return Err(FlintError::AnimatorError(
                "disappear_frames must be at least 1".into(),
            ));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = AnimatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnimatorConfig::default());
        assert_eq!(config.max_dispatch_depth, 8);
        assert!((config.particle_cooldown - 0.2).abs() < 1e-5);
    }

    #[test]
    fn partial_override() {
        let config = AnimatorConfig::from_toml_str(
            "particle_cooldown = 0.5\nauto_switch_animation = true\n",
        )
        .unwrap();
        assert!((config.particle_cooldown - 0.5).abs() < 1e-5);
        assert!(config.auto_switch_animation);
        assert_eq!(config.disappear_frames, 100);
    }

    #[test]
    fn reject_zero_disappear_frames() {
        assert!(matches!(
            AnimatorConfig::from_toml_str("disappear_frames = 0"),
            Err(FlintError::AnimatorError(_))
        ));
        assert_eq!(AnimatorConfig::from_toml_str("disappear_frames = 1").unwrap().disappear_frames, 1);
    }

    #[test]
    fn reject_zero_depth() {
        assert!(AnimatorConfig::from_toml_str("max_dispatch_depth = 0").is_err());
        assert!(AnimatorConfig::from_toml_str("max_dispatch_depth = \"deep\"").is_err());
    }
}
