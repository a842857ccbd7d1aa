//! Store error types
//!
//! Error codes:
//! - CFG_NOT_FOUND (ERROR severity)
//! - CFG_BUFFER_TOO_SMALL (ERROR severity)
//! - CFG_VALUE_TOO_LARGE (ERROR severity)
//! - CFG_INVALID_KEY (ERROR severity)
//! - CFG_OUT_OF_SPACE (ERROR severity)
//! - CFG_NOT_INITIALIZED (FATAL severity)
//! - CFG_BUSY (ERROR severity)
//! - CFG_TIMEOUT (ERROR severity)
//! - CFG_CORRUPTED (FATAL severity)
//! - CFG_INTERNAL (FATAL severity)

pub mod mapper;

use std::fmt;

use thiserror::Error;

use crate::key::Key;

pub use mapper::ErrorMapper;

/// Severity levels for store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The call fails, the store remains usable
    Error,
    /// The store or the flash contents can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Errors returned by the configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record exists for the key
    #[error("key not found")]
    NotFound,

    /// Caller buffer cannot hold the stored value
    #[error("buffer too small: {required} bytes required")]
    BufferTooSmall {
        /// Exact length of the stored value
        required: usize,
    },

    /// Value exceeds the configured maximum length
    #[error("value too large: {len} bytes, maximum {max}")]
    ValueTooLarge { len: usize, max: usize },

    /// Key outside the vendor file id / record key ranges
    #[error("invalid key {0}")]
    InvalidKey(Key),

    /// Flash is full even after compaction
    #[error("flash out of space")]
    OutOfSpace,

    /// Store or flash library not initialized
    #[error("flash not initialized")]
    NotInitialized,

    /// Another flash operation is in flight
    #[error("flash operation already in progress")]
    Busy,

    /// Flash operation did not complete within the configured timeout
    #[error("flash operation timed out")]
    Timeout,

    /// Stored data failed an integrity or framing check
    #[error("stored data corrupted")]
    Corrupted,

    /// Any other flash library failure, with its raw code
    #[error("flash library error {0}")]
    Internal(u32),
}

impl StoreError {
    /// Returns the stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound => "CFG_NOT_FOUND",
            StoreError::BufferTooSmall { .. } => "CFG_BUFFER_TOO_SMALL",
            StoreError::ValueTooLarge { .. } => "CFG_VALUE_TOO_LARGE",
            StoreError::InvalidKey(_) => "CFG_INVALID_KEY",
            StoreError::OutOfSpace => "CFG_OUT_OF_SPACE",
            StoreError::NotInitialized => "CFG_NOT_INITIALIZED",
            StoreError::Busy => "CFG_BUSY",
            StoreError::Timeout => "CFG_TIMEOUT",
            StoreError::Corrupted => "CFG_CORRUPTED",
            StoreError::Internal(_) => "CFG_INTERNAL",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StoreError::NotInitialized | StoreError::Corrupted | StoreError::Internal(_) => {
                Severity::Fatal
            }
            _ => Severity::Error,
        }
    }

    /// Returns true if this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns true for the expected "absent key" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(StoreError::NotFound.code(), "CFG_NOT_FOUND");
        assert_eq!(
            StoreError::BufferTooSmall { required: 9 }.code(),
            "CFG_BUFFER_TOO_SMALL"
        );
        assert_eq!(StoreError::Internal(15).code(), "CFG_INTERNAL");
    }

    #[test]
    fn test_severity() {
        assert!(!StoreError::NotFound.is_fatal());
        assert!(!StoreError::OutOfSpace.is_fatal());
        assert!(StoreError::Corrupted.is_fatal());
        assert!(StoreError::Internal(99).is_fatal());
    }

    #[test]
    fn test_display_carries_required_length() {
        let err = StoreError::BufferTooSmall { required: 42 };
        assert!(err.to_string().contains("42"));
    }
}
