//! Types exchanged with the flash record library

use std::fmt;
use std::sync::Arc;

/// Result codes reported by the flash record library.
///
/// Returned synchronously when a request is rejected at issue time, and
/// carried by [`FlashEvent`] when an accepted request completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashCode {
    /// Operation succeeded
    Success,
    /// Operation timed out inside the library
    OperationTimeout,
    /// Library not initialized
    NotInitialized,
    /// Data length is not a whole number of words
    Unaligned,
    /// Invalid file id or record key
    InvalidArg,
    /// Missing argument
    NullArg,
    /// Record is not open
    NoOpenRecords,
    /// Not enough free flash for the record
    NoSpaceInFlash,
    /// Request queue is full
    NoSpaceInQueues,
    /// Record exceeds the maximum record size
    RecordTooLarge,
    /// No matching record
    NotFound,
    /// No flash pages available
    NoPages,
    /// Too many registered users
    UserLimitReached,
    /// Record CRC mismatch
    CrcCheckFailed,
    /// Library is busy
    Busy,
    /// Internal library failure
    Internal,
    /// Code not known to this crate
    Other(u32),
}

impl FlashCode {
    /// Numeric code as reported by the library.
    pub fn raw(&self) -> u32 {
        match self {
            FlashCode::Success => 0,
            FlashCode::OperationTimeout => 1,
            FlashCode::NotInitialized => 2,
            FlashCode::Unaligned => 3,
            FlashCode::InvalidArg => 4,
            FlashCode::NullArg => 5,
            FlashCode::NoOpenRecords => 6,
            FlashCode::NoSpaceInFlash => 7,
            FlashCode::NoSpaceInQueues => 8,
            FlashCode::RecordTooLarge => 9,
            FlashCode::NotFound => 10,
            FlashCode::NoPages => 11,
            FlashCode::UserLimitReached => 12,
            FlashCode::CrcCheckFailed => 13,
            FlashCode::Busy => 14,
            FlashCode::Internal => 15,
            FlashCode::Other(code) => *code,
        }
    }

    /// Decode a numeric library code.
    pub fn from_raw(code: u32) -> Self {
        match code {
            0 => FlashCode::Success,
            1 => FlashCode::OperationTimeout,
            2 => FlashCode::NotInitialized,
            3 => FlashCode::Unaligned,
            4 => FlashCode::InvalidArg,
            5 => FlashCode::NullArg,
            6 => FlashCode::NoOpenRecords,
            7 => FlashCode::NoSpaceInFlash,
            8 => FlashCode::NoSpaceInQueues,
            9 => FlashCode::RecordTooLarge,
            10 => FlashCode::NotFound,
            11 => FlashCode::NoPages,
            12 => FlashCode::UserLimitReached,
            13 => FlashCode::CrcCheckFailed,
            14 => FlashCode::Busy,
            15 => FlashCode::Internal,
            other => FlashCode::Other(other),
        }
    }

    /// Whether this code reports success.
    pub fn is_success(&self) -> bool {
        *self == FlashCode::Success
    }
}

impl fmt::Display for FlashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashCode::Other(code) => write!(f, "flash code {}", code),
            other => write!(f, "{:?} ({})", other, other.raw()),
        }
    }
}

/// Opaque handle to one physical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordDesc {
    /// Library-assigned record id, unique for the lifetime of the record.
    pub record_id: u32,
}

/// Identity of one accepted request, unique for the lifetime of the library.
///
/// Returned when a request is accepted and carried by its completion event,
/// so a user can tell its own completions from other users' traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cursor state for [`FlashRecordLibrary::find`](super::FlashRecordLibrary::find).
///
/// Start from `FindToken::default()` to search from the beginning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindToken {
    pub(crate) last_record_id: u32,
}

/// Contents of an opened record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashRecord {
    /// Descriptor of the record
    pub desc: RecordDesc,
    /// File id the record belongs to
    pub file_id: u16,
    /// Record key within the file
    pub record_key: u16,
    /// Record data, a whole number of words
    pub data: Vec<u8>,
}

impl FlashRecord {
    /// Length of the record data in words.
    pub fn length_words(&self) -> usize {
        crate::key::words_needed(self.data.len())
    }
}

/// Kind of operation a completion event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Library initialization
    Init,
    /// New record written
    Write,
    /// Record replaced by a new one
    Update,
    /// Single record deleted
    DelRecord,
    /// Every record with a file id / record key pair deleted
    DelKey,
    /// Every record of a file deleted
    DelFile,
    /// Garbage collection
    Gc,
}

impl EventKind {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::Write => "write",
            EventKind::Update => "update",
            EventKind::DelRecord => "del_record",
            EventKind::DelKey => "del_key",
            EventKind::DelFile => "del_file",
            EventKind::Gc => "gc",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Completion event delivered once per accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashEvent {
    /// Request this event completes
    pub request: RequestId,
    /// Which operation completed
    pub kind: EventKind,
    /// Outcome
    pub result: FlashCode,
    /// File id of the target (0 for init and gc)
    pub file_id: u16,
    /// Record key of the target (0 when not applicable)
    pub record_key: u16,
    /// Record written or deleted, when the operation targets one record
    pub desc: Option<RecordDesc>,
}

/// Callback invoked by the library, from its own execution context, for
/// every completion event.
pub type CompletionHandler = Arc<dyn Fn(&FlashEvent) + Send + Sync>;
