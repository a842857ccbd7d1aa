//! Typed configuration store over the flash record library
//!
//! Every call blocks until the flash operations it needs have completed.
//! After a successful write exactly one record exists for the key; stale
//! duplicates left by an interrupted update are removed by the next write,
//! clear, or [`ConfigStore::repair_stale`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::bridge::{AsyncOp, AsyncOpBridge};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::flash::{FlashRecordLibrary, InMemoryFlash, RecordDesc};
use crate::key::well_known::PERSISTED_COUNTER_RECORD_KEY_BASE;
use crate::key::{counter_key, Key, Namespace};
use crate::locator::RecordLocator;
use crate::observability::{
    log_event_with_fields, Event, Logger, MetricsRegistry, MetricsSnapshot, ObservationScope,
    FACTORY_RESET_SCOPE, STALE_REPAIR_SCOPE,
};
use crate::sync::lock;

use super::value::{self, Value};

/// Persistent key/value configuration store.
pub struct ConfigStore<L: FlashRecordLibrary> {
    bridge: AsyncOpBridge<L>,
    config: StoreConfig,
    metrics: Arc<MetricsRegistry>,
    initialized: AtomicBool,
    /// Keys seen with more than one record, awaiting repair
    stale_keys: Mutex<BTreeSet<Key>>,
}

impl ConfigStore<InMemoryFlash> {
    /// Store backed by an [`InMemoryFlash`] built from `config.flash`.
    pub fn in_memory(config: StoreConfig) -> StoreResult<Self> {
        let flash = Arc::new(InMemoryFlash::new(config.flash.clone()));
        Self::new(flash, config)
    }
}

impl<L: FlashRecordLibrary> ConfigStore<L> {
    /// Create the store and register with the library. Call
    /// [`init`](Self::init) before any other operation.
    pub fn new(library: Arc<L>, config: StoreConfig) -> StoreResult<Self> {
        let metrics = Arc::new(MetricsRegistry::new());
        let bridge = AsyncOpBridge::new(library, config.op_timeout(), Arc::clone(&metrics))?;
        Ok(Self {
            bridge,
            config,
            metrics,
            initialized: AtomicBool::new(false),
            stale_keys: Mutex::new(BTreeSet::new()),
        })
    }

    /// Initialize the flash library. Failures are returned as-is, never
    /// retried. Calling again after success is a no-op.
    pub fn init(&self) -> StoreResult<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Err(err) = self.bridge.initialize() {
            log_event_with_fields(
                Event::StoreInitFailed,
                &[("code", err.code()), ("error", &err.to_string())],
            );
            return Err(err);
        }
        self.initialized.store(true, Ordering::Release);
        Logger::info(Event::StoreInitComplete.as_str(), &[]);
        Ok(())
    }

    /// Whether `init` has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// The underlying flash library.
    pub fn library(&self) -> &L {
        self.bridge.library()
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Current metrics as a JSON object.
    pub fn metrics_json(&self) -> String {
        self.metrics.to_json()
    }

    // ==================== Reads ====================

    pub fn read_bool(&self, key: Key) -> StoreResult<bool> {
        let v = value::decode_bool(&self.read_payload(key)?)?;
        self.metrics.increment_reads();
        Ok(v)
    }

    pub fn read_u32(&self, key: Key) -> StoreResult<u32> {
        let v = value::decode_u32(&self.read_payload(key)?)?;
        self.metrics.increment_reads();
        Ok(v)
    }

    pub fn read_u64(&self, key: Key) -> StoreResult<u64> {
        let v = value::decode_u64(&self.read_payload(key)?)?;
        self.metrics.increment_reads();
        Ok(v)
    }

    /// Copy a string value into `buf`, returning its length in bytes.
    ///
    /// If `buf` is too short, fails with `BufferTooSmall` carrying the exact
    /// length required and leaves `buf` untouched.
    pub fn read_str(&self, key: Key, buf: &mut [u8]) -> StoreResult<usize> {
        self.read_bytes_into(key, buf)
    }

    /// Copy a binary value into `buf`, returning its length in bytes.
    /// Same buffer contract as [`read_str`](Self::read_str).
    pub fn read_bin(&self, key: Key, buf: &mut [u8]) -> StoreResult<usize> {
        self.read_bytes_into(key, buf)
    }

    /// Read a string value into a new `String`. Invalid UTF-8 is `Corrupted`.
    pub fn read_string(&self, key: Key) -> StoreResult<String> {
        let payload = self.read_payload(key)?;
        let bytes = value::decode_bytes(&payload)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| StoreError::Corrupted)?
            .to_owned();
        self.metrics.increment_reads();
        Ok(s)
    }

    fn read_bytes_into(&self, key: Key, buf: &mut [u8]) -> StoreResult<usize> {
        let payload = self.read_payload(key)?;
        let bytes = value::decode_bytes(&payload)?;
        if bytes.len() > buf.len() {
            return Err(StoreError::BufferTooSmall {
                required: bytes.len(),
            });
        }
        buf[..bytes.len()].copy_from_slice(bytes);
        self.metrics.increment_reads();
        Ok(bytes.len())
    }

    fn read_payload(&self, key: Key) -> StoreResult<Vec<u8>> {
        self.ensure_initialized()?;
        let (record, matches) = RecordLocator::new(&self.bridge).find_one(key)?;
        if matches > 1 {
            self.note_stale(key, matches)?;
        }
        Ok(record.data)
    }

    /// Duplicates found by a read: use the first record and queue the key
    /// for repair, or fail when configured to report them.
    fn note_stale(&self, key: Key, matches: usize) -> StoreResult<()> {
        Logger::warn(
            Event::StaleRecordsDetected.as_str(),
            &[("key", &key.to_string()), ("matches", &matches.to_string())],
        );
        if self.config.report_stale_on_read {
            return Err(StoreError::Corrupted);
        }
        lock(&self.stale_keys).insert(key);
        Ok(())
    }

    // ==================== Writes ====================

    pub fn write_bool(&self, key: Key, v: bool) -> StoreResult<()> {
        self.write_value(key, Value::Bool(v))
    }

    pub fn write_u32(&self, key: Key, v: u32) -> StoreResult<()> {
        self.write_value(key, Value::U32(v))
    }

    pub fn write_u64(&self, key: Key, v: u64) -> StoreResult<()> {
        self.write_value(key, Value::U64(v))
    }

    pub fn write_str(&self, key: Key, v: &str) -> StoreResult<()> {
        self.write_value(key, Value::Bytes(v.as_bytes()))
    }

    pub fn write_bin(&self, key: Key, v: &[u8]) -> StoreResult<()> {
        self.write_value(key, Value::Bytes(v))
    }

    /// Write a string, or clear the key when `v` is `None`.
    pub fn write_optional_str(&self, key: Key, v: Option<&str>) -> StoreResult<()> {
        match v {
            Some(s) => self.write_str(key, s),
            None => self.clear(key),
        }
    }

    fn write_value(&self, key: Key, v: Value<'_>) -> StoreResult<()> {
        self.ensure_initialized()?;
        if !key.is_valid() {
            return Err(StoreError::InvalidKey(key));
        }
        if let Value::Bytes(data) = v {
            if data.len() > self.config.max_value_len {
                return Err(StoreError::ValueTooLarge {
                    len: data.len(),
                    max: self.config.max_value_len,
                });
            }
        }

        let payload = v.encode();
        let mut retries = 0;
        loop {
            match self.write_payload(key, &payload) {
                Ok(()) => {
                    self.metrics.increment_writes();
                    return Ok(());
                }
                Err(StoreError::OutOfSpace) if retries < self.config.out_of_space_retries => {
                    retries += 1;
                    self.metrics.increment_out_of_space_retries();
                    Logger::warn(
                        Event::OutOfSpaceRetry.as_str(),
                        &[("key", &key.to_string()), ("attempt", &retries.to_string())],
                    );
                    self.compact()?;
                }
                Err(StoreError::OutOfSpace) => {
                    Logger::error(
                        Event::OutOfSpaceExhausted.as_str(),
                        &[("key", &key.to_string()), ("retries", &retries.to_string())],
                    );
                    return Err(StoreError::OutOfSpace);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One write attempt: keep the first record, delete the rest, then
    /// update the first or add a new one.
    fn write_payload(&self, key: Key, payload: &[u8]) -> StoreResult<()> {
        let mut first: Option<RecordDesc> = None;
        let mut removed = 0u64;
        RecordLocator::new(&self.bridge).find_all(key, |desc, _| {
            if first.is_none() {
                first = Some(desc);
                false
            } else {
                removed += 1;
                true
            }
        })?;

        if removed > 0 {
            self.record_stale_removed(key, removed);
        }

        let key_field = key.to_string();
        match first {
            None => {
                self.bridge.execute(AsyncOp::Add {
                    file_id: key.file_id(),
                    record_key: key.record_key(),
                    data: payload,
                })?;
                self.metrics.increment_records_added();
                Logger::trace(Event::RecordAdded.as_str(), &[("key", &key_field)]);
            }
            Some(desc) => {
                self.bridge.execute(AsyncOp::Update {
                    desc,
                    file_id: key.file_id(),
                    record_key: key.record_key(),
                    data: payload,
                })?;
                self.metrics.increment_records_updated();
                Logger::trace(Event::RecordUpdated.as_str(), &[("key", &key_field)]);
            }
        }
        Ok(())
    }

    fn record_stale_removed(&self, key: Key, removed: u64) {
        self.metrics.add_stale_records_removed(removed);
        self.metrics.add_records_deleted(removed);
        lock(&self.stale_keys).remove(&key);
        Logger::warn(
            Event::StaleRecordsDetected.as_str(),
            &[("key", &key.to_string()), ("removed", &removed.to_string())],
        );
    }

    /// Garbage-collect deleted records.
    fn compact(&self) -> StoreResult<()> {
        Logger::info(Event::CompactionBegin.as_str(), &[]);
        self.bridge.execute(AsyncOp::Compact)?;
        self.metrics.increment_compactions();
        Logger::info(Event::CompactionComplete.as_str(), &[]);
        Ok(())
    }

    // ==================== Clear / exists ====================

    /// Delete every record of `key`. Clearing an absent key succeeds.
    pub fn clear(&self, key: Key) -> StoreResult<()> {
        self.ensure_initialized()?;
        let deleted = RecordLocator::new(&self.bridge).find_all(key, |_, _| true)?;
        self.metrics.add_records_deleted(deleted as u64);
        lock(&self.stale_keys).remove(&key);
        if deleted > 0 {
            Logger::trace(
                Event::KeyCleared.as_str(),
                &[("key", &key.to_string()), ("deleted", &deleted.to_string())],
            );
        }
        Ok(())
    }

    /// Whether at least one record exists for `key`. An uninitialized
    /// store holds nothing, and a failed lookup reports `false`.
    pub fn exists(&self, key: Key) -> bool {
        if !self.is_initialized() {
            return false;
        }
        match RecordLocator::new(&self.bridge).count(key) {
            Ok(matches) => matches >= 1,
            Err(err) => {
                Logger::warn(
                    Event::FlashOpFailed.as_str(),
                    &[("key", &key.to_string()), ("error", err.code())],
                );
                false
            }
        }
    }

    // ==================== Factory reset / repair ====================

    /// Delete every key in the namespaces cleared by a factory reset, then
    /// compact. Provisioning data is untouched. The first failing delete
    /// fails the call; namespaces already deleted stay deleted.
    pub fn factory_reset(&self) -> StoreResult<()> {
        self.ensure_initialized()?;
        let scope = ObservationScope::new(FACTORY_RESET_SCOPE);

        let mut cleared = 0usize;
        for namespace in Namespace::ALL {
            if !namespace.cleared_by_factory_reset() {
                continue;
            }
            let op = AsyncOp::DeleteNamespace {
                file_id: namespace.file_id(),
            };
            if let Err(err) = self.bridge.execute(op) {
                scope.fail(&format!("delete {} failed: {}", namespace, err));
                return Err(err);
            }
            cleared += 1;
        }

        if let Err(err) = self.compact() {
            scope.fail(&format!("compaction failed: {}", err));
            return Err(err);
        }

        lock(&self.stale_keys).retain(|key| {
            !key
                .namespace()
                .map_or(false, |namespace| namespace.cleared_by_factory_reset())
        });

        scope.complete_with_fields(&[("namespaces", &cleared.to_string())]);
        Ok(())
    }

    /// Keys currently queued for stale-record repair.
    pub fn stale_keys(&self) -> Vec<Key> {
        lock(&self.stale_keys).iter().copied().collect()
    }

    /// Delete the extra records of every key queued by reads, keeping the
    /// first intact record of each. Returns the number of records removed.
    pub fn repair_stale(&self) -> StoreResult<usize> {
        self.ensure_initialized()?;
        let keys = self.stale_keys();
        if keys.is_empty() {
            return Ok(0);
        }

        let scope = ObservationScope::new(STALE_REPAIR_SCOPE);
        let mut total = 0usize;
        for key in keys {
            let mut kept = false;
            let repaired = RecordLocator::new(&self.bridge).find_all(key, |_, record| {
                if kept || record.is_none() {
                    return true;
                }
                kept = true;
                false
            });
            let visited = match repaired {
                Ok(visited) => visited,
                Err(err) => {
                    scope.fail(&format!("repair of {} failed: {}", key, err));
                    return Err(err);
                }
            };
            let removed = visited - usize::from(kept);
            self.metrics.add_stale_records_removed(removed as u64);
            self.metrics.add_records_deleted(removed as u64);
            lock(&self.stale_keys).remove(&key);
            total += removed;
        }

        scope.complete_with_fields(&[("removed", &total.to_string())]);
        Ok(total)
    }

    // ==================== Persisted counters ====================

    /// Current value of a persisted counter.
    pub fn read_counter(&self, counter_id: u16) -> StoreResult<u32> {
        self.read_u32(Self::counter(counter_id)?)
    }

    /// Store a persisted counter value.
    pub fn write_counter(&self, counter_id: u16, v: u32) -> StoreResult<()> {
        self.write_u32(Self::counter(counter_id)?, v)
    }

    /// Delete a persisted counter. Deleting an absent counter succeeds.
    pub fn clear_counter(&self, counter_id: u16) -> StoreResult<()> {
        self.ensure_initialized()?;
        let key = Self::counter(counter_id)?;
        let op = AsyncOp::DeleteByKey {
            file_id: key.file_id(),
            record_key: key.record_key(),
        };
        match self.bridge.execute(op) {
            Ok(_) | Err(StoreError::NotFound) => {
                lock(&self.stale_keys).remove(&key);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn counter(counter_id: u16) -> StoreResult<Key> {
        counter_key(counter_id).ok_or_else(|| {
            StoreError::InvalidKey(Key::new(
                Namespace::Counters.file_id(),
                PERSISTED_COUNTER_RECORD_KEY_BASE.wrapping_add(counter_id),
            ))
        })
    }

    fn ensure_initialized(&self) -> StoreResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }
}
