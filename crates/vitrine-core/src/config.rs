#![forbid(unsafe_code)]

//! Engine configuration as data.
//!
//! [`EngineConfig`] groups every tunable in the engine so a host can ship one
//! file instead of recompiling constants. Each widget's physics constants are
//! a separate, explicitly named preset.
//!
//! # Loading
//!
//! ```toml
//! # vitrine.toml
//! [scheduler]
//! max_consecutive_failures = 3
//!
//! [theme]
//! smoothing = 0.4
//! dark = { color = "#1A1A1A", glass = 0.0 }
//!
//! [motion.scroller]
//! friction = 0.96
//! ```
//!
//! ```rust,ignore
//! let config = EngineConfig::from_toml_file("vitrine.toml")?;
//! ```
//!
//! # Defaults
//!
//! `EngineConfig::default()` reproduces the shipped site: 0.4 theme smoothing,
//! a 5-unit axis-lock threshold, 0.95 friction for the menu strip, and 1s
//! scrub lag.

#[cfg(feature = "config")]
use std::path::Path;

use crate::error::ConfigError;
use crate::gesture::GestureConfig;
use crate::motion::MotionConfig;
use crate::progress::ScrubConfig;
use crate::scheduler::SchedulerConfig;
use crate::theme::ThemeConfig;

/// Motion presets, one per widget kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct MotionPresets {
    pub carousel: MotionConfig,
    pub switcher: MotionConfig,
    pub scroller: MotionConfig,
}

impl Default for MotionPresets {
    fn default() -> Self {
        Self {
            carousel: MotionConfig::carousel(),
            switcher: MotionConfig::switcher(),
            scroller: MotionConfig::scroller(),
        }
    }
}

/// Slide switcher behavior.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SwitcherConfig {
    /// Release displacement needed to change slides (default: 50).
    pub swipe_threshold: f64,
    /// Wrap past the last slide to the first and back (default: true).
    pub wrap: bool,
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        Self {
            swipe_threshold: 50.0,
            wrap: true,
        }
    }
}

/// All engine tunables.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub gesture: GestureConfig,
    pub theme: ThemeConfig,
    pub motion: MotionPresets,
    pub switcher: SwitcherConfig,
    pub scrub: ScrubConfig,
}

impl EngineConfig {
    /// Load from a TOML string and validate.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string and validate.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Serialize to pretty TOML.
    #[cfg(feature = "config")]
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.scheduler.max_consecutive_failures == 0 {
            errors.push("scheduler.max_consecutive_failures must be > 0".into());
        }
        if self.scheduler.max_frame_dt.is_zero() {
            errors.push("scheduler.max_frame_dt must be > 0".into());
        }

        if !(self.gesture.lock_threshold >= 0.0) || !self.gesture.lock_threshold.is_finite() {
            errors.push(format!(
                "gesture.lock_threshold must be >= 0, got {}",
                self.gesture.lock_threshold
            ));
        }

        errors.extend(self.theme.validate());
        errors.extend(self.motion.carousel.validate("motion.carousel"));
        errors.extend(self.motion.switcher.validate("motion.switcher"));
        errors.extend(self.motion.scroller.validate("motion.scroller"));

        if !(self.switcher.swipe_threshold > 0.0) {
            errors.push(format!(
                "switcher.swipe_threshold must be > 0, got {}",
                self.switcher.swipe_threshold
            ));
        }
        if !(self.scrub.epsilon > 0.0) {
            errors.push(format!("scrub.epsilon must be > 0, got {}", self.scrub.epsilon));
        }

        errors
    }

    /// `self` if valid, otherwise [`ConfigError::Validation`].
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            tracing::warn!(count = errors.len(), "rejected invalid engine config");
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Serde adapter storing a `Duration` as integer milliseconds.
#[cfg(feature = "config")]
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
