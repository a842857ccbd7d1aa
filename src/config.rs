//! Store configuration
//!
//! Loaded from a JSON file. Every field has a default, so an empty object
//! (`{}`) is a valid configuration.
//!
//! ```json
//! {
//!   "out_of_space_retries": 1,
//!   "op_timeout_ms": null,
//!   "max_value_len": 1024,
//!   "report_stale_on_read": false,
//!   "flash": { "capacity_words": 8192, "queue_depth": 4 }
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Behaviour of the configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// How many compaction-and-retry cycles a write may spend on an
    /// out-of-space condition before giving up.
    #[serde(default = "default_out_of_space_retries")]
    pub out_of_space_retries: u32,

    /// Upper bound on the wait for one flash operation. `None` waits until
    /// the library completes the operation.
    #[serde(default)]
    pub op_timeout_ms: Option<u64>,

    /// Largest string or binary value accepted by a write, in bytes.
    #[serde(default = "default_max_value_len")]
    pub max_value_len: usize,

    /// Fail reads that find more than one record for a key with
    /// `Corrupted` instead of using the first record.
    #[serde(default)]
    pub report_stale_on_read: bool,

    /// Geometry and timing of the in-memory flash library.
    #[serde(default)]
    pub flash: FlashConfig,
}

fn default_out_of_space_retries() -> u32 {
    1
}
fn default_max_value_len() -> usize {
    1024
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            out_of_space_retries: default_out_of_space_retries(),
            op_timeout_ms: None,
            max_value_len: default_max_value_len(),
            report_stale_on_read: false,
            flash: FlashConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigFileError> {
        let config: StoreConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        if self.op_timeout_ms == Some(0) {
            return Err(ConfigFileError::Invalid(
                "op_timeout_ms must be > 0 when set".into(),
            ));
        }

        // One length word precedes string and binary payloads.
        let max_payload_bytes = self.flash.max_record_words.saturating_sub(1) * crate::key::WORD_SIZE;
        if self.max_value_len > max_payload_bytes {
            return Err(ConfigFileError::Invalid(format!(
                "max_value_len {} exceeds the largest record payload ({} bytes)",
                self.max_value_len, max_payload_bytes
            )));
        }

        self.flash.validate()
    }

    /// Operation timeout as a `Duration`
    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_ms.map(Duration::from_millis)
    }
}

/// Geometry and timing of [`InMemoryFlash`](crate::flash::InMemoryFlash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlashConfig {
    /// Total storage, in words, including record headers.
    #[serde(default = "default_capacity_words")]
    pub capacity_words: usize,

    /// Largest record data, in words.
    #[serde(default = "default_max_record_words")]
    pub max_record_words: usize,

    /// Maximum number of queued requests.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Fixed delay before each completion, in microseconds.
    #[serde(default)]
    pub completion_delay_us: u64,

    /// Random extra delay before each completion, in microseconds.
    #[serde(default)]
    pub completion_jitter_us: u64,
}

fn default_capacity_words() -> usize {
    8 * 1024
}
fn default_max_record_words() -> usize {
    1019
}
fn default_queue_depth() -> usize {
    4
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            capacity_words: default_capacity_words(),
            max_record_words: default_max_record_words(),
            queue_depth: default_queue_depth(),
            completion_delay_us: 0,
            completion_jitter_us: 0,
        }
    }
}

impl FlashConfig {
    /// Validate field ranges
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        if self.queue_depth == 0 {
            return Err(ConfigFileError::Invalid("flash.queue_depth must be > 0".into()));
        }
        if self.max_record_words == 0 {
            return Err(ConfigFileError::Invalid(
                "flash.max_record_words must be > 0".into(),
            ));
        }
        if self.capacity_words < self.max_record_words {
            return Err(ConfigFileError::Invalid(
                "flash.capacity_words must hold at least one maximum-size record".into(),
            ));
        }
        Ok(())
    }
}
