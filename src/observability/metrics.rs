//! Store metrics registry
//!
//! - Counters only, monotonic
//! - Reset only when the store is created
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters of one store instance
///
/// All counters use Relaxed atomics; a snapshot taken while operations are
/// running may mix values from before and after a given operation.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Successful typed reads
    reads: AtomicU64,
    /// Successful typed writes
    writes: AtomicU64,
    /// Records added
    records_added: AtomicU64,
    /// Records updated in place
    records_updated: AtomicU64,
    /// Records deleted, one per physical record
    records_deleted: AtomicU64,
    /// Garbage collections run
    compactions: AtomicU64,
    /// Writes retried after compaction
    out_of_space_retries: AtomicU64,
    /// Duplicate records removed
    stale_records_removed: AtomicU64,
    /// Flash operations completed through the bridge
    flash_ops: AtomicU64,
    /// Waits for room in the library request queue
    queue_waits: AtomicU64,
    /// Calls rejected because an operation was in flight
    busy_rejections: AtomicU64,
    /// Flash operations that timed out
    timeouts: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment successful reads
    pub fn increment_reads(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment successful writes
    pub fn increment_writes(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment records added
    pub fn increment_records_added(&self) {
        self.records_added.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment records updated
    pub fn increment_records_updated(&self) {
        self.records_updated.fetch_add(1, Ordering::Relaxed);
    }

    /// Add deleted records
    pub fn add_records_deleted(&self, count: u64) {
        self.records_deleted.fetch_add(count, Ordering::Relaxed);
    }

    /// Increment compactions
    pub fn increment_compactions(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment out-of-space retries
    pub fn increment_out_of_space_retries(&self) {
        self.out_of_space_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Add removed stale records
    pub fn add_stale_records_removed(&self, count: u64) {
        self.stale_records_removed.fetch_add(count, Ordering::Relaxed);
    }

    /// Increment completed flash operations
    pub fn increment_flash_ops(&self) {
        self.flash_ops.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment queue waits
    pub fn increment_queue_waits(&self) {
        self.queue_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment busy rejections
    pub fn increment_busy_rejections(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment timeouts
    pub fn increment_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"reads":{},"writes":{},"records_added":{},"records_updated":{},"records_deleted":{},"compactions":{},"out_of_space_retries":{},"stale_records_removed":{},"flash_ops":{},"queue_waits":{},"busy_rejections":{},"timeouts":{}}}"#,
            s.reads,
            s.writes,
            s.records_added,
            s.records_updated,
            s.records_deleted,
            s.compactions,
            s.out_of_space_retries,
            s.stale_records_removed,
            s.flash_ops,
            s.queue_waits,
            s.busy_rejections,
            s.timeouts,
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            records_added: self.records_added.load(Ordering::Relaxed),
            records_updated: self.records_updated.load(Ordering::Relaxed),
            records_deleted: self.records_deleted.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            out_of_space_retries: self.out_of_space_retries.load(Ordering::Relaxed),
            stale_records_removed: self.stale_records_removed.load(Ordering::Relaxed),
            flash_ops: self.flash_ops.load(Ordering::Relaxed),
            queue_waits: self.queue_waits.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub records_added: u64,
    pub records_updated: u64,
    pub records_deleted: u64,
    pub compactions: u64,
    pub out_of_space_retries: u64,
    pub stale_records_removed: u64,
    pub flash_ops: u64,
    pub queue_waits: u64,
    pub busy_rejections: u64,
    pub timeouts: u64,
}
