//! # Core Error Types
//!
//! Errors raised by the storage kernel. Reads on dead or unknown entities
//! never produce these; they return neutral values instead.

use thiserror::Error;

/// Errors that can occur in entity and component storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A pool was structurally modified while a cursor walked it.
    #[error(
        "component pool modified during iteration: \
         cursor saw modification {expected}, pool is at {actual}"
    )]
    ConcurrentModification {
        /// Modification counter captured by the cursor.
        expected: u64,
        /// Modification counter of the pool when the cursor advanced.
        actual: u64,
    },

    /// Dense slot lookup outside `0..len`.
    #[error("dense index {index} out of bounds for pool of length {len}")]
    IndexOutOfBounds {
        /// Requested slot.
        index: usize,
        /// Current pool length.
        len: usize,
    },

    /// Binary snapshot could not be decoded.
    #[error("malformed entity snapshot: {0}")]
    MalformedSnapshot(String),
}

/// Result type for storage operations.
pub type CoreResult<T> = Result<T, CoreError>;
