//! Capability interface of the flash record library
//!
//! Mutating calls only *queue* a request. `Ok(id)` means the request was
//! accepted; its outcome is reported later, carrying the same [`RequestId`],
//! through every registered [`CompletionHandler`] from the library's own
//! execution context. `Err(code)` means the request was rejected and no
//! event will follow.
//!
//! Enumeration (`find` / `open`) is synchronous.

use super::types::{CompletionHandler, FindToken, FlashCode, FlashRecord, RecordDesc, RequestId};

/// Operations consumed from an asynchronous flash record library.
pub trait FlashRecordLibrary: Send + Sync {
    /// Register a completion handler. Handlers stay registered for the
    /// lifetime of the library.
    fn register(&self, handler: CompletionHandler) -> FlashCode;

    /// Queue library initialization. Completes with [`EventKind::Init`](super::EventKind::Init).
    fn init(&self) -> Result<RequestId, FlashCode>;

    /// Queue a new record. `data` must be a whole number of words.
    fn write(
        &self,
        file_id: u16,
        record_key: u16,
        data: &[u8],
    ) -> Result<RequestId, FlashCode>;

    /// Queue replacement of the record `desc` by a new record with `data`.
    fn update(
        &self,
        desc: RecordDesc,
        file_id: u16,
        record_key: u16,
        data: &[u8],
    ) -> Result<RequestId, FlashCode>;

    /// Queue deletion of one record.
    fn delete(&self, desc: RecordDesc) -> Result<RequestId, FlashCode>;

    /// Queue deletion of every record matching `file_id` / `record_key`.
    fn delete_by_key(&self, file_id: u16, record_key: u16) -> Result<RequestId, FlashCode>;

    /// Queue deletion of every record in `file_id`.
    fn delete_file(&self, file_id: u16) -> Result<RequestId, FlashCode>;

    /// Queue garbage collection of deleted records.
    fn gc(&self) -> Result<RequestId, FlashCode>;

    /// Find the next record matching `file_id` / `record_key` after the
    /// position held in `token`. Returns [`FlashCode::NotFound`] once the
    /// matches are exhausted.
    fn find(
        &self,
        file_id: u16,
        record_key: u16,
        token: &mut FindToken,
    ) -> Result<RecordDesc, FlashCode>;

    /// Read the contents of a record, verifying its integrity.
    fn open(&self, desc: RecordDesc) -> Result<FlashRecord, FlashCode>;
}
