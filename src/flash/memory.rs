//! In-memory flash record library
//!
//! Behaves like a real asynchronous record library:
//! - Requests are queued (bounded by `queue_depth`) and executed by a
//!   dedicated worker thread
//! - Completion events are delivered from the worker, never from the
//!   caller's thread
//! - Space is accounted in words; deleted records stay dirty until `gc`
//! - Every record carries a CRC32 verified on `open`
//!
//! Test hooks allow scripting faults, seeding stale records, filling the
//! store and observing how many requests were in flight at once.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crc32fast::Hasher;
use rand::Rng;

use super::library::FlashRecordLibrary;
use super::types::{
    CompletionHandler, EventKind, FindToken, FlashCode, FlashEvent, FlashRecord, RecordDesc,
    RequestId,
};
use crate::config::FlashConfig;
use crate::key::{words_needed, FILE_ID_MAX, RECORD_KEY_MAX, RECORD_KEY_MIN, WORD_SIZE};
use crate::sync::{lock, read, write};

/// Words of bookkeeping stored in front of each record.
pub const RECORD_HEADER_WORDS: usize = 3;

/// Maximum number of registered completion handlers.
pub const MAX_USERS: usize = 8;

/// Scripted misbehaviour for the next request of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Reject the request at issue time with this code.
    Reject(FlashCode),
    /// Accept the request, then complete it with this code without applying it.
    Fail(FlashCode),
    /// Apply the request but never deliver its completion.
    Swallow,
    /// Power loss in the middle of an update: the new record is written,
    /// the old one is left in place and no completion is delivered.
    Interrupt,
    /// Complete normally after an extra delay, in microseconds.
    Delay(u64),
}

/// Counters describing what the library has been asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashStats {
    /// Requests accepted from the store
    pub accepted: u64,
    /// Requests rejected at issue time
    pub rejected: u64,
    /// Completion events delivered
    pub completed: u64,
    /// Garbage collections executed
    pub gc_runs: u64,
    /// Largest number of store requests queued or executing at once
    pub max_in_flight: usize,
    /// Kinds of accepted store requests, in issue order
    pub issued: Vec<EventKind>,
}

#[derive(Debug, Clone)]
enum Request {
    Init,
    Write {
        file_id: u16,
        record_key: u16,
        data: Vec<u8>,
    },
    Update {
        desc: RecordDesc,
        file_id: u16,
        record_key: u16,
        data: Vec<u8>,
    },
    Delete {
        desc: RecordDesc,
    },
    DeleteByKey {
        file_id: u16,
        record_key: u16,
    },
    DeleteFile {
        file_id: u16,
    },
    Gc,
}

impl Request {
    fn kind(&self) -> EventKind {
        match self {
            Request::Init => EventKind::Init,
            Request::Write { .. } => EventKind::Write,
            Request::Update { .. } => EventKind::Update,
            Request::Delete { .. } => EventKind::DelRecord,
            Request::DeleteByKey { .. } => EventKind::DelKey,
            Request::DeleteFile { .. } => EventKind::DelFile,
            Request::Gc => EventKind::Gc,
        }
    }

    /// Words reserved at issue time for the record this request writes.
    fn reservation(&self) -> usize {
        match self {
            Request::Write { data, .. } | Request::Update { data, .. } => {
                RECORD_HEADER_WORDS + words_needed(data.len())
            }
            _ => 0,
        }
    }

    fn target(&self) -> (u16, u16) {
        match self {
            Request::Write {
                file_id,
                record_key,
                ..
            }
            | Request::Update {
                file_id,
                record_key,
                ..
            }
            | Request::DeleteByKey {
                file_id,
                record_key,
            } => (*file_id, *record_key),
            Request::DeleteFile { file_id } => (*file_id, 0),
            _ => (0, 0),
        }
    }
}

#[derive(Debug)]
struct Queued {
    id: RequestId,
    request: Request,
    reserved_words: usize,
    foreign: bool,
    fault: Option<Fault>,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    file_id: u16,
    record_key: u16,
    data: Vec<u8>,
    crc: u32,
}

impl StoredRecord {
    fn new(file_id: u16, record_key: u16, data: Vec<u8>) -> Self {
        let crc = record_crc(file_id, record_key, &data);
        Self {
            file_id,
            record_key,
            data,
            crc,
        }
    }

    fn size_words(&self) -> usize {
        RECORD_HEADER_WORDS + words_needed(self.data.len())
    }
}

fn record_crc(file_id: u16, record_key: u16, data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&file_id.to_le_bytes());
    hasher.update(&record_key.to_le_bytes());
    hasher.update(data);
    hasher.finalize()
}

fn pad_to_words(data: &[u8]) -> Vec<u8> {
    let mut padded = data.to_vec();
    padded.resize(words_needed(data.len()) * WORD_SIZE, 0);
    padded
}

#[derive(Debug, Default)]
struct FlashState {
    initialized: bool,
    records: BTreeMap<u32, StoredRecord>,
    next_record_id: u32,
    next_request_id: u64,
    used_words: usize,
    dirty_words: usize,
    reserved_words: usize,
    queue: VecDeque<Queued>,
    executing_own: usize,
    faults: HashMap<EventKind, VecDeque<Fault>>,
    stats: FlashStats,
    shutdown: bool,
}

impl FlashState {
    fn free_words(&self, capacity: usize) -> usize {
        capacity.saturating_sub(self.used_words + self.reserved_words)
    }

    fn own_in_flight(&self) -> usize {
        self.queue.iter().filter(|q| !q.foreign).count() + self.executing_own
    }

    fn insert_record(&mut self, file_id: u16, record_key: u16, data: Vec<u8>) -> RecordDesc {
        self.next_record_id += 1;
        let record_id = self.next_record_id;
        let record = StoredRecord::new(file_id, record_key, data);
        self.used_words += record.size_words();
        self.records.insert(record_id, record);
        RecordDesc { record_id }
    }

    fn remove_record(&mut self, record_id: u32) -> Option<StoredRecord> {
        let record = self.records.remove(&record_id)?;
        self.dirty_words += record.size_words();
        Some(record)
    }

    fn remove_matching<F>(&mut self, matches: F) -> usize
    where
        F: Fn(&StoredRecord) -> bool,
    {
        let ids: Vec<u32> = self
            .records
            .iter()
            .filter(|(_, rec)| matches(rec))
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.remove_record(*id);
        }
        ids.len()
    }

    /// Execute one request, returning its completion event and whether the
    /// event should be delivered.
    fn apply(&mut self, queued: Queued) -> (FlashEvent, bool) {
        self.reserved_words -= queued.reserved_words;

        let (file_id, record_key) = queued.request.target();
        let mut event = FlashEvent {
            request: queued.id,
            kind: queued.request.kind(),
            result: FlashCode::Success,
            file_id,
            record_key,
            desc: None,
        };

        if let Some(Fault::Fail(code)) = queued.fault {
            if let Request::Delete { desc } | Request::Update { desc, .. } = queued.request {
                event.desc = Some(desc);
            }
            event.result = code;
            return (event, true);
        }

        match queued.request {
            Request::Init => {
                self.initialized = true;
            }
            Request::Write {
                file_id,
                record_key,
                data,
            } => {
                event.desc = Some(self.insert_record(file_id, record_key, data));
            }
            Request::Update {
                desc,
                file_id,
                record_key,
                data,
            } => {
                if self.records.contains_key(&desc.record_id) {
                    event.desc = Some(self.insert_record(file_id, record_key, data));
                    if queued.fault != Some(Fault::Interrupt) {
                        self.remove_record(desc.record_id);
                    }
                } else {
                    event.desc = Some(desc);
                    event.result = FlashCode::NotFound;
                }
            }
            Request::Delete { desc } => {
                event.desc = Some(desc);
                match self.remove_record(desc.record_id) {
                    Some(record) => {
                        event.file_id = record.file_id;
                        event.record_key = record.record_key;
                    }
                    None => event.result = FlashCode::NotFound,
                }
            }
            Request::DeleteByKey {
                file_id,
                record_key,
            } => {
                let removed = self
                    .remove_matching(|rec| rec.file_id == file_id && rec.record_key == record_key);
                if removed == 0 {
                    event.result = FlashCode::NotFound;
                }
            }
            Request::DeleteFile { file_id } => {
                self.remove_matching(|rec| rec.file_id == file_id);
            }
            Request::Gc => {
                self.used_words -= self.dirty_words;
                self.dirty_words = 0;
                self.stats.gc_runs += 1;
            }
        }

        let deliver = !matches!(queued.fault, Some(Fault::Swallow) | Some(Fault::Interrupt));
        (event, deliver)
    }
}

struct Shared {
    config: FlashConfig,
    state: Mutex<FlashState>,
    work_ready: Condvar,
    handlers: RwLock<Vec<CompletionHandler>>,
}

impl Shared {
    fn completion_delay(&self) {
        let jitter = if self.config.completion_jitter_us > 0 {
            rand::thread_rng().gen_range(0..=self.config.completion_jitter_us)
        } else {
            0
        };
        let total = self.config.completion_delay_us + jitter;
        if total > 0 {
            thread::sleep(Duration::from_micros(total));
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    loop {
        let queued = {
            let mut state = lock(&shared.state);
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(queued) = state.queue.pop_front() {
                    if !queued.foreign {
                        state.executing_own += 1;
                    }
                    break queued;
                }
                state = shared
                    .work_ready
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
        };

        shared.completion_delay();
        if let Some(Fault::Delay(micros)) = queued.fault {
            thread::sleep(Duration::from_micros(micros));
        }

        let (event, deliver) = {
            let mut state = lock(&shared.state);
            let foreign = queued.foreign;
            let outcome = state.apply(queued);
            if !foreign {
                state.executing_own -= 1;
            }
            if outcome.1 {
                state.stats.completed += 1;
            }
            outcome
        };

        if deliver {
            let handlers: Vec<CompletionHandler> = read(&shared.handlers).clone();
            for handler in &handlers {
                handler(&event);
            }
        }
    }
}

/// Asynchronous flash record library held entirely in memory.
pub struct InMemoryFlash {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InMemoryFlash {
    /// Create a library with the given geometry and start its worker.
    pub fn new(config: FlashConfig) -> Self {
        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(FlashState::default()),
            work_ready: Condvar::new(),
            handlers: RwLock::new(Vec::new()),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("flash-worker".into())
            .spawn(move || run_worker(worker_shared))
            .ok();

        Self {
            shared,
            worker: Mutex::new(worker),
        }
    }

    /// Library geometry.
    pub fn config(&self) -> &FlashConfig {
        &self.shared.config
    }

    fn validate(&self, request: &Request) -> Option<FlashCode> {
        let check_target = |file_id: u16, record_key: u16| {
            if file_id > FILE_ID_MAX || !(RECORD_KEY_MIN..=RECORD_KEY_MAX).contains(&record_key) {
                Some(FlashCode::InvalidArg)
            } else {
                None
            }
        };

        match request {
            Request::Write {
                file_id,
                record_key,
                data,
            }
            | Request::Update {
                file_id,
                record_key,
                data,
                ..
            } => {
                if data.len() % WORD_SIZE != 0 {
                    return Some(FlashCode::Unaligned);
                }
                if words_needed(data.len()) > self.shared.config.max_record_words {
                    return Some(FlashCode::RecordTooLarge);
                }
                check_target(*file_id, *record_key)
            }
            Request::DeleteByKey {
                file_id,
                record_key,
            } => check_target(*file_id, *record_key),
            Request::DeleteFile { file_id } if *file_id > FILE_ID_MAX => Some(FlashCode::InvalidArg),
            _ => None,
        }
    }

    fn submit(&self, request: Request, foreign: bool) -> Result<RequestId, FlashCode> {
        let config = &self.shared.config;
        let mut state = lock(&self.shared.state);
        let kind = request.kind();

        let rejected = |state: &mut FlashState, code: FlashCode| {
            state.stats.rejected += 1;
            Err(code)
        };

        if kind != EventKind::Init && !state.initialized {
            return rejected(&mut state, FlashCode::NotInitialized);
        }
        if let Some(code) = self.validate(&request) {
            return rejected(&mut state, code);
        }

        let fault = if foreign {
            None
        } else {
            state.faults.get_mut(&kind).and_then(|queue| queue.pop_front())
        };
        if let Some(Fault::Reject(code)) = fault {
            return rejected(&mut state, code);
        }

        if state.queue.len() >= config.queue_depth {
            return rejected(&mut state, FlashCode::NoSpaceInQueues);
        }

        let reserved_words = request.reservation();
        if reserved_words > state.free_words(config.capacity_words) {
            return rejected(&mut state, FlashCode::NoSpaceInFlash);
        }
        state.reserved_words += reserved_words;

        state.next_request_id += 1;
        let id = RequestId(state.next_request_id);
        state.queue.push_back(Queued {
            id,
            request,
            reserved_words,
            foreign,
            fault,
        });

        if !foreign {
            state.stats.accepted += 1;
            state.stats.issued.push(kind);
            let in_flight = state.own_in_flight();
            if in_flight > state.stats.max_in_flight {
                state.stats.max_in_flight = in_flight;
            }
        }

        self.shared.work_ready.notify_all();
        Ok(id)
    }

    // ==================== Test hooks ====================

    /// Apply `fault` to the next store request of `kind`. Faults queue up
    /// per kind and are consumed in order.
    pub fn inject(&self, kind: EventKind, fault: Fault) {
        let mut state = lock(&self.shared.state);
        state.faults.entry(kind).or_default().push_back(fault);
    }

    /// Place a record directly in storage, as if left by a previous boot.
    pub fn seed_record(&self, file_id: u16, record_key: u16, data: &[u8]) -> RecordDesc {
        let mut state = lock(&self.shared.state);
        state.insert_record(file_id, record_key, pad_to_words(data))
    }

    /// Account `words` of deleted-but-not-collected data.
    pub fn seed_dirty(&self, words: usize) {
        let mut state = lock(&self.shared.state);
        state.used_words += words;
        state.dirty_words += words;
    }

    /// Seed one-word records in `file_id` until no more than `leave_words`
    /// remain free. Returns the number of records written.
    pub fn fill_to_capacity(&self, file_id: u16, leave_words: usize) -> usize {
        let record_words = RECORD_HEADER_WORDS + 1;
        let mut state = lock(&self.shared.state);
        let mut written = 0;
        let mut record_key = RECORD_KEY_MIN;
        while state.free_words(self.shared.config.capacity_words) >= leave_words + record_words {
            state.insert_record(file_id, record_key, vec![0u8; WORD_SIZE]);
            record_key = if record_key >= RECORD_KEY_MAX {
                RECORD_KEY_MIN
            } else {
                record_key + 1
            };
            written += 1;
        }
        written
    }

    /// Flip the stored CRC of a record so the next `open` fails.
    pub fn corrupt_record(&self, desc: RecordDesc) -> bool {
        let mut state = lock(&self.shared.state);
        match state.records.get_mut(&desc.record_id) {
            Some(record) => {
                record.crc ^= 0xFFFF_FFFF;
                true
            }
            None => false,
        }
    }

    /// Queue a write on behalf of another user of the library.
    pub fn submit_foreign_write(
        &self,
        file_id: u16,
        record_key: u16,
        data: &[u8],
    ) -> Result<RequestId, FlashCode> {
        self.submit(
            Request::Write {
                file_id,
                record_key,
                data: pad_to_words(data),
            },
            true,
        )
    }

    /// Number of live records matching `file_id` / `record_key`.
    pub fn record_count(&self, file_id: u16, record_key: u16) -> usize {
        let state = lock(&self.shared.state);
        state
            .records
            .values()
            .filter(|rec| rec.file_id == file_id && rec.record_key == record_key)
            .count()
    }

    /// Number of live records in `file_id`.
    pub fn file_record_count(&self, file_id: u16) -> usize {
        let state = lock(&self.shared.state);
        state
            .records
            .values()
            .filter(|rec| rec.file_id == file_id)
            .count()
    }

    /// Words available for new records without garbage collection.
    pub fn free_words(&self) -> usize {
        let state = lock(&self.shared.state);
        state.free_words(self.shared.config.capacity_words)
    }

    /// Words held by deleted records.
    pub fn dirty_words(&self) -> usize {
        lock(&self.shared.state).dirty_words
    }

    /// Whether initialization has completed.
    pub fn is_initialized(&self) -> bool {
        lock(&self.shared.state).initialized
    }

    /// Snapshot of the request counters.
    pub fn stats(&self) -> FlashStats {
        lock(&self.shared.state).stats.clone()
    }
}

impl Default for InMemoryFlash {
    fn default() -> Self {
        Self::new(FlashConfig::default())
    }
}

impl Drop for InMemoryFlash {
    fn drop(&mut self) {
        lock(&self.shared.state).shutdown = true;
        self.shared.work_ready.notify_all();
        if let Some(worker) = lock(&self.worker).take() {
            let _ = worker.join();
        }
    }
}

impl FlashRecordLibrary for InMemoryFlash {
    fn register(&self, handler: CompletionHandler) -> FlashCode {
        let mut handlers = write(&self.shared.handlers);
        if handlers.len() >= MAX_USERS {
            return FlashCode::UserLimitReached;
        }
        handlers.push(handler);
        FlashCode::Success
    }

    fn init(&self) -> Result<RequestId, FlashCode> {
        self.submit(Request::Init, false)
    }

    fn write(
        &self,
        file_id: u16,
        record_key: u16,
        data: &[u8],
    ) -> Result<RequestId, FlashCode> {
        self.submit(
            Request::Write {
                file_id,
                record_key,
                data: data.to_vec(),
            },
            false,
        )
    }

    fn update(
        &self,
        desc: RecordDesc,
        file_id: u16,
        record_key: u16,
        data: &[u8],
    ) -> Result<RequestId, FlashCode> {
        self.submit(
            Request::Update {
                desc,
                file_id,
                record_key,
                data: data.to_vec(),
            },
            false,
        )
    }

    fn delete(&self, desc: RecordDesc) -> Result<RequestId, FlashCode> {
        self.submit(Request::Delete { desc }, false)
    }

    fn delete_by_key(&self, file_id: u16, record_key: u16) -> Result<RequestId, FlashCode> {
        self.submit(
            Request::DeleteByKey {
                file_id,
                record_key,
            },
            false,
        )
    }

    fn delete_file(&self, file_id: u16) -> Result<RequestId, FlashCode> {
        self.submit(Request::DeleteFile { file_id }, false)
    }

    fn gc(&self) -> Result<RequestId, FlashCode> {
        self.submit(Request::Gc, false)
    }

    fn find(
        &self,
        file_id: u16,
        record_key: u16,
        token: &mut FindToken,
    ) -> Result<RecordDesc, FlashCode> {
        let state = lock(&self.shared.state);
        if !state.initialized {
            return Err(FlashCode::NotInitialized);
        }
        let start = token.last_record_id.saturating_add(1);
        let found = state
            .records
            .range(start..)
            .find(|(_, rec)| rec.file_id == file_id && rec.record_key == record_key)
            .map(|(id, _)| *id);
        match found {
            Some(record_id) => {
                token.last_record_id = record_id;
                Ok(RecordDesc { record_id })
            }
            None => Err(FlashCode::NotFound),
        }
    }

    fn open(&self, desc: RecordDesc) -> Result<FlashRecord, FlashCode> {
        let state = lock(&self.shared.state);
        let record = state
            .records
            .get(&desc.record_id)
            .ok_or(FlashCode::NotFound)?;
        if record_crc(record.file_id, record.record_key, &record.data) != record.crc {
            return Err(FlashCode::CrcCheckFailed);
        }
        Ok(FlashRecord {
            desc,
            file_id: record.file_id,
            record_key: record.record_key,
            data: record.data.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn initialized(config: FlashConfig) -> (InMemoryFlash, mpsc::Receiver<FlashEvent>) {
        let flash = InMemoryFlash::new(config);
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        flash.register(Arc::new(move |event: &FlashEvent| {
            let _ = lock(&tx).send(*event);
        }));
        flash.init().unwrap();
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.kind, EventKind::Init);
        (flash, rx)
    }

    fn next(rx: &mpsc::Receiver<FlashEvent>) -> FlashEvent {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_requests_rejected_before_init() {
        let flash = InMemoryFlash::default();
        assert_eq!(flash.write(0x235B, 1, &[0; 4]), Err(FlashCode::NotInitialized));
        let mut token = FindToken::default();
        assert_eq!(flash.find(0x235B, 1, &mut token), Err(FlashCode::NotInitialized));
    }

    #[test]
    fn test_write_completes_from_worker_thread() {
        let flash = InMemoryFlash::default();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        flash.register(Arc::new(move |event: &FlashEvent| {
            let _ = lock(&tx).send((*event, thread::current().name().map(String::from)));
        }));
        flash.init().unwrap();
        let (_, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("flash-worker"));

        let id = flash.write(0x235B, 1, &[1, 2, 3, 4]).unwrap();
        let (event, _) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.request, id);
        assert_eq!(event.kind, EventKind::Write);
        assert!(event.result.is_success());
        assert_eq!(flash.record_count(0x235B, 1), 1);
    }

    #[test]
    fn test_unaligned_and_oversized_rejected() {
        let (flash, _rx) = initialized(FlashConfig {
            max_record_words: 2,
            capacity_words: 64,
            ..FlashConfig::default()
        });
        assert_eq!(flash.write(0x235B, 1, &[0; 3]), Err(FlashCode::Unaligned));
        assert_eq!(flash.write(0x235B, 1, &[0; 12]), Err(FlashCode::RecordTooLarge));
        assert_eq!(flash.write(0x235B, 0, &[0; 4]), Err(FlashCode::InvalidArg));
    }

    #[test]
    fn test_update_replaces_record() {
        let (flash, rx) = initialized(FlashConfig::default());
        let desc = flash.seed_record(0x235B, 2, b"old!");
        flash.update(desc, 0x235B, 2, b"new!").unwrap();
        let event = next(&rx);
        assert_eq!(event.kind, EventKind::Update);
        assert!(event.result.is_success());
        assert_eq!(flash.record_count(0x235B, 2), 1);

        let new_desc = event.desc.unwrap();
        assert_ne!(new_desc, desc);
        assert_eq!(flash.open(new_desc).unwrap().data, b"new!".to_vec());
        assert_eq!(flash.open(desc), Err(FlashCode::NotFound));
    }

    #[test]
    fn test_deleted_space_reclaimed_by_gc() {
        let (flash, rx) = initialized(FlashConfig::default());
        let before = flash.free_words();
        let desc = flash.seed_record(0x235B, 3, &[0; 8]);
        flash.delete(desc).unwrap();
        assert!(next(&rx).result.is_success());
        assert_eq!(flash.dirty_words(), RECORD_HEADER_WORDS + 2);
        assert_eq!(flash.free_words(), before - RECORD_HEADER_WORDS - 2);

        flash.gc().unwrap();
        assert_eq!(next(&rx).kind, EventKind::Gc);
        assert_eq!(flash.dirty_words(), 0);
        assert_eq!(flash.free_words(), before);
        assert_eq!(flash.stats().gc_runs, 1);
    }

    #[test]
    fn test_reservation_fails_when_full() {
        let (flash, _rx) = initialized(FlashConfig {
            capacity_words: 64,
            max_record_words: 16,
            ..FlashConfig::default()
        });
        flash.fill_to_capacity(0x1000, 0);
        assert!(flash.free_words() < RECORD_HEADER_WORDS + 1);
        assert_eq!(flash.write(0x235B, 1, &[0; 4]), Err(FlashCode::NoSpaceInFlash));
    }

    #[test]
    fn test_find_iterates_matches_in_order() {
        let (flash, _rx) = initialized(FlashConfig::default());
        let a = flash.seed_record(0x235B, 5, b"a");
        flash.seed_record(0x235B, 6, b"x");
        let b = flash.seed_record(0x235B, 5, b"b");

        let mut token = FindToken::default();
        assert_eq!(flash.find(0x235B, 5, &mut token), Ok(a));
        assert_eq!(flash.find(0x235B, 5, &mut token), Ok(b));
        assert_eq!(flash.find(0x235B, 5, &mut token), Err(FlashCode::NotFound));
    }

    #[test]
    fn test_corrupted_record_fails_crc() {
        let (flash, _rx) = initialized(FlashConfig::default());
        let desc = flash.seed_record(0x235A, 1, b"serial");
        assert!(flash.corrupt_record(desc));
        assert_eq!(flash.open(desc), Err(FlashCode::CrcCheckFailed));
    }

    #[test]
    fn test_queue_depth_enforced() {
        let (flash, rx) = initialized(FlashConfig {
            queue_depth: 1,
            completion_delay_us: 20_000,
            ..FlashConfig::default()
        });
        // At most one request executes per delay, so three submissions
        // overflow a queue of one.
        let results: Vec<Result<RequestId, FlashCode>> = (1..=3)
            .map(|key| flash.submit_foreign_write(0x1000, key, b"abcd"))
            .collect();
        assert!(results[0].is_ok());
        assert!(results.contains(&Err(FlashCode::NoSpaceInQueues)));
        assert_eq!(next(&rx).kind, EventKind::Write);
    }

    #[test]
    fn test_scripted_failure_is_reported_async() {
        let (flash, rx) = initialized(FlashConfig::default());
        flash.inject(EventKind::Write, Fault::Fail(FlashCode::Internal));
        flash.write(0x235B, 1, &[0; 4]).unwrap();
        let event = next(&rx);
        assert_eq!(event.result, FlashCode::Internal);
        assert_eq!(flash.record_count(0x235B, 1), 0);
    }

    #[test]
    fn test_interrupted_update_leaves_both_records() {
        let (flash, rx) = initialized(FlashConfig::default());
        let desc = flash.seed_record(0x235B, 9, b"v1");
        flash.inject(EventKind::Update, Fault::Interrupt);
        flash.update(desc, 0x235B, 9, &pad_to_words(b"v2")).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(flash.record_count(0x235B, 9), 2);
    }

    #[test]
    fn test_user_limit() {
        let flash = InMemoryFlash::default();
        for _ in 0..MAX_USERS {
            assert!(flash.register(Arc::new(|_: &FlashEvent| {})).is_success());
        }
        assert_eq!(
            flash.register(Arc::new(|_: &FlashEvent| {})),
            FlashCode::UserLimitReached
        );
    }
}
