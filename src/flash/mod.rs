//! Flash record library interface
//!
//! The store never touches flash directly. It consumes the asynchronous
//! record library through [`FlashRecordLibrary`]; [`InMemoryFlash`] is a
//! complete in-memory implementation used by tests and the CLI self-test.

mod library;
mod memory;
mod types;

pub use library::FlashRecordLibrary;
pub use memory::{FlashStats, Fault, InMemoryFlash, MAX_USERS, RECORD_HEADER_WORDS};
pub use types::{
    CompletionHandler, EventKind, FindToken, FlashCode, FlashEvent, FlashRecord, RecordDesc,
    RequestId,
};
