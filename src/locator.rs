//! Enumeration of the physical records stored for a key

use crate::bridge::{AsyncOp, AsyncOpBridge};
use crate::error::{ErrorMapper, StoreError, StoreResult};
use crate::flash::{FindToken, FlashCode, FlashRecord, FlashRecordLibrary, RecordDesc};
use crate::key::Key;
use crate::observability::{log_event_with_fields, Event, Logger};

/// Finds, and optionally deletes, the records matching a key.
pub struct RecordLocator<'a, L: FlashRecordLibrary> {
    bridge: &'a AsyncOpBridge<L>,
}

impl<'a, L: FlashRecordLibrary> RecordLocator<'a, L> {
    pub fn new(bridge: &'a AsyncOpBridge<L>) -> Self {
        Self { bridge }
    }

    /// Visit every record stored for `key`, in storage order.
    ///
    /// The visitor gets each record's descriptor and, unless the record
    /// failed its integrity check, its contents. When the visitor returns
    /// `true` the record is deleted through the bridge before iteration
    /// continues, so corrupted records can still be removed. Returns the
    /// number of records visited.
    pub fn find_all<F>(&self, key: Key, mut visitor: F) -> StoreResult<usize>
    where
        F: FnMut(RecordDesc, Option<&FlashRecord>) -> bool,
    {
        let library = self.bridge.library();
        let mut token = FindToken::default();
        let mut visited = 0;

        while let Some(desc) = self.next_desc(key, &mut token)? {
            visited += 1;
            let delete = match library.open(desc) {
                Ok(record) => visitor(desc, Some(&record)),
                Err(FlashCode::CrcCheckFailed) => {
                    Self::log_corrupt(key, desc);
                    visitor(desc, None)
                }
                Err(code) => {
                    ErrorMapper::map(code)?;
                    false
                }
            };
            if delete {
                self.bridge.execute(AsyncOp::Delete { desc })?;
                Logger::trace(
                    Event::RecordDeleted.as_str(),
                    &[
                        ("key", &key.to_string()),
                        ("record_id", &desc.record_id.to_string()),
                    ],
                );
            }
        }

        Ok(visited)
    }

    /// First record stored for `key`, with the total number of matches.
    ///
    /// A first record that fails its integrity check is `Corrupted`.
    pub fn find_one(&self, key: Key) -> StoreResult<(FlashRecord, usize)> {
        let library = self.bridge.library();
        let mut token = FindToken::default();
        let desc = self
            .next_desc(key, &mut token)?
            .ok_or(StoreError::NotFound)?;
        let record = match library.open(desc) {
            Ok(record) => record,
            Err(code) => {
                if code == FlashCode::CrcCheckFailed {
                    Self::log_corrupt(key, desc);
                }
                ErrorMapper::map(code)?;
                return Err(StoreError::Internal(code.raw()));
            }
        };

        let mut matches = 1;
        while self.next_desc(key, &mut token)?.is_some() {
            matches += 1;
        }

        Ok((record, matches))
    }

    /// Count the records stored for `key` without opening them.
    pub fn count(&self, key: Key) -> StoreResult<usize> {
        let mut token = FindToken::default();
        let mut matches = 0;
        while self.next_desc(key, &mut token)?.is_some() {
            matches += 1;
        }
        Ok(matches)
    }

    fn next_desc(&self, key: Key, token: &mut FindToken) -> StoreResult<Option<RecordDesc>> {
        match self
            .bridge
            .library()
            .find(key.file_id(), key.record_key(), token)
        {
            Ok(desc) => Ok(Some(desc)),
            Err(FlashCode::NotFound) => Ok(None),
            Err(code) => ErrorMapper::map(code).map(|_| None),
        }
    }

    fn log_corrupt(key: Key, desc: RecordDesc) {
        log_event_with_fields(
            Event::CorruptRecord,
            &[
                ("key", &key.to_string()),
                ("record_id", &desc.record_id.to_string()),
            ],
        );
    }
}
