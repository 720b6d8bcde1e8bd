//! # Engine Error Types
//!
//! Structural misuse of the scheduler, event bus or loop settings is
//! reported immediately through [`EngineError`]. Reads never fail.

use strata_core::CoreError;
use thiserror::Error;

/// Error type returned by systems.
pub type SystemError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by systems.
pub type SystemResult = Result<(), SystemError>;

/// Errors that can occur in the engine layer.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Structural edit against a group that does not exist.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// A group binding names a system that was never registered.
    #[error("system is not registered: {0}")]
    UnregisteredSystem(String),

    /// Insert position outside `0..=len`.
    #[error("index {index} out of range for group {group} of size {len}")]
    InvalidGroupIndex {
        /// Target group.
        group: String,
        /// Requested position.
        index: usize,
        /// Current group size.
        len: usize,
    },

    /// Lookup of an event consumer that was never registered.
    #[error("unknown event consumer: {0}")]
    UnknownEventConsumer(String),

    /// Loop settings outside their valid ranges.
    #[error("invalid loop settings: {0}")]
    InvalidLoopSettings(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A system returned an error during group dispatch.
    #[error("system {system} failed in group {group}: {source}")]
    SystemFailed {
        /// Failing system.
        system: String,
        /// Group being dispatched.
        group: String,
        /// Error returned by the system.
        #[source]
        source: SystemError,
    },

    /// The loop worker thread could not be spawned.
    #[error("failed to spawn game loop thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    /// Storage error surfaced through the engine.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
