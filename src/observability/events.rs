//! Observable store events
//!
//! Events are explicit and typed. Multi-step procedures (factory reset,
//! self-test) are bracketed by an [`ObservationScope`](super::ObservationScope)
//! named after one of the `*_SCOPE` constants instead.

use std::fmt;

/// Scope name for factory reset (`FACTORY_RESET_BEGIN` / `_COMPLETE` / `_FAILED`)
pub const FACTORY_RESET_SCOPE: &str = "FACTORY_RESET";

/// Scope name for the self-test (`SELF_TEST_BEGIN` / `_COMPLETE` / `_FAILED`)
pub const SELF_TEST_SCOPE: &str = "SELF_TEST";

/// Scope name for stale record repair
pub const STALE_REPAIR_SCOPE: &str = "STALE_REPAIR";

/// Observable events of the configuration store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Flash library initialized, store ready
    StoreInitComplete,
    /// Flash library initialization failed
    StoreInitFailed,

    // Records
    /// New record added for a key
    RecordAdded,
    /// Existing record replaced
    RecordUpdated,
    /// Single record deleted
    RecordDeleted,
    /// Every record of a key deleted
    KeyCleared,

    // Space management
    /// Garbage collection issued
    CompactionBegin,
    /// Garbage collection finished
    CompactionComplete,
    /// Write retried after compaction
    OutOfSpaceRetry,
    /// Write still out of space after every retry
    OutOfSpaceExhausted,

    // Integrity
    /// More than one record found for a key
    StaleRecordsDetected,
    /// Record failed its integrity check
    CorruptRecord,

    // Flash bridge
    /// Library request queue full, waiting for room
    FlashQueueFull,
    /// Flash operation rejected or failed
    FlashOpFailed,
    /// Flash operation did not complete in time
    FlashOpTimeout,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StoreInitComplete => "STORE_INIT_COMPLETE",
            Event::StoreInitFailed => "STORE_INIT_FAILED",

            Event::RecordAdded => "RECORD_ADDED",
            Event::RecordUpdated => "RECORD_UPDATED",
            Event::RecordDeleted => "RECORD_DELETED",
            Event::KeyCleared => "KEY_CLEARED",

            Event::CompactionBegin => "COMPACTION_BEGIN",
            Event::CompactionComplete => "COMPACTION_COMPLETE",
            Event::OutOfSpaceRetry => "OUT_OF_SPACE_RETRY",
            Event::OutOfSpaceExhausted => "OUT_OF_SPACE_EXHAUSTED",

            Event::StaleRecordsDetected => "STALE_RECORDS_DETECTED",
            Event::CorruptRecord => "CORRUPT_RECORD",

            Event::FlashQueueFull => "FLASH_QUEUE_FULL",
            Event::FlashOpFailed => "FLASH_OP_FAILED",
            Event::FlashOpTimeout => "FLASH_OP_TIMEOUT",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::StoreInitFailed | Event::CorruptRecord)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
