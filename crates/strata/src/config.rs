//! # Engine Configuration
//!
//! Loaded once at startup, usually from TOML:
//!
//! ```toml
//! updates_per_second = 60
//! max_frame_skip = 5
//! event_buffer_capacity = 1024
//! ```
//!
//! Missing keys take their defaults; unknown keys are rejected.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::game_loop::LoopSettings;

/// Default fixed updates per second.
pub const DEFAULT_UPDATES_PER_SECOND: u32 = 25;

/// Default cap on catch-up updates per frame.
pub const DEFAULT_MAX_FRAME_SKIP: u32 = 5;

/// Default capacity of the async event write buffer.
pub const DEFAULT_EVENT_BUFFER_CAPACITY: usize = 250;

/// Engine-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Fixed WORK updates per second, in `1..=1000`.
    pub updates_per_second: u32,
    /// Maximum WORK updates per loop iteration, at least 1.
    pub max_frame_skip: u32,
    /// Capacity of the async event write buffer, at least 1.
    pub event_buffer_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            updates_per_second: DEFAULT_UPDATES_PER_SECOND,
            max_frame_skip: DEFAULT_MAX_FRAME_SKIP,
            event_buffer_capacity: DEFAULT_EVENT_BUFFER_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigParse`] for malformed TOML or unknown keys,
    /// otherwise any error of [`EngineConfig::validate`].
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value against its valid range.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidLoopSettings`] or [`EngineError::InvalidConfig`].
    pub fn validate(&self) -> EngineResult<()> {
        self.loop_settings()?;
        if self.event_buffer_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "event_buffer_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Loop settings described by this configuration.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidLoopSettings`] for out-of-range values.
    pub fn loop_settings(&self) -> EngineResult<LoopSettings> {
        LoopSettings::new(self.updates_per_second, self.max_frame_skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.updates_per_second, 25);
        assert_eq!(config.max_frame_skip, 5);
        assert_eq!(config.event_buffer_capacity, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("updates_per_second = 60").unwrap();
        assert_eq!(config.updates_per_second, 60);
        assert_eq!(config.max_frame_skip, DEFAULT_MAX_FRAME_SKIP);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = EngineConfig::from_toml_str("tick_rate = 60").unwrap_err();
        assert!(matches!(err, EngineError::ConfigParse(_)));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("updates_per_second = 1001"),
            Err(EngineError::InvalidLoopSettings(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("max_frame_skip = 0"),
            Err(EngineError::InvalidLoopSettings(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("event_buffer_capacity = 0"),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_round_trip() {
        let config = EngineConfig {
            updates_per_second: 50,
            max_frame_skip: 3,
            event_buffer_capacity: 64,
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }
}
