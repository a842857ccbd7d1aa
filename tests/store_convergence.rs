//! Overwrite convergence tests
//!
//! After any completed write exactly one record exists for the key, even
//! when earlier interrupted updates left duplicates behind.

use std::sync::Arc;

use flashcfg::flash::{EventKind, Fault, InMemoryFlash};
use flashcfg::key::well_known::{FABRIC_ID, SERVICE_CONFIG};
use flashcfg::store::Value;
use flashcfg::{ConfigStore, StoreConfig, StoreError};

fn store_on(flash: &Arc<InMemoryFlash>, config: StoreConfig) -> ConfigStore<InMemoryFlash> {
    let store = ConfigStore::new(Arc::clone(flash), config).unwrap();
    store.init().unwrap();
    store
}

fn records(flash: &InMemoryFlash, key: flashcfg::Key) -> usize {
    flash.record_count(key.file_id(), key.record_key())
}

// =============================================================================
// OVERWRITE
// =============================================================================

/// Test: Repeated writes leave a single record holding the last value.
#[test]
fn test_repeated_writes_converge() {
    let flash = Arc::new(InMemoryFlash::default());
    let store = store_on(&flash, StoreConfig::default());

    for v in 0..20u32 {
        store.write_u32(FABRIC_ID, v).unwrap();
        assert_eq!(records(&flash, FABRIC_ID), 1);
    }
    assert_eq!(store.read_u32(FABRIC_ID).unwrap(), 19);
}

/// Test: Overwriting with a value of a different size converges too.
#[test]
fn test_overwrite_with_different_length() {
    let flash = Arc::new(InMemoryFlash::default());
    let store = store_on(&flash, StoreConfig::default());

    store.write_str(SERVICE_CONFIG, "short").unwrap();
    store
        .write_str(SERVICE_CONFIG, "a considerably longer service configuration")
        .unwrap();
    store.write_str(SERVICE_CONFIG, "mid-size").unwrap();

    assert_eq!(records(&flash, SERVICE_CONFIG), 1);
    assert_eq!(store.read_string(SERVICE_CONFIG).unwrap(), "mid-size");
}

// =============================================================================
// DUPLICATES
// =============================================================================

/// Test: A write over duplicates updates the first and deletes the rest.
#[test]
fn test_write_removes_duplicates() {
    let flash = Arc::new(InMemoryFlash::default());
    let store = store_on(&flash, StoreConfig::default());
    for v in [1u32, 2, 3] {
        flash.seed_record(FABRIC_ID.file_id(), FABRIC_ID.record_key(), &Value::U32(v).encode());
    }

    store.write_u32(FABRIC_ID, 9).unwrap();

    assert_eq!(records(&flash, FABRIC_ID), 1);
    assert_eq!(store.read_u32(FABRIC_ID).unwrap(), 9);
    let metrics = store.metrics();
    assert_eq!(metrics.stale_records_removed, 2);
    assert_eq!(metrics.records_updated, 1);
    assert_eq!(metrics.records_added, 0);
}

/// Test: Clear removes every duplicate.
#[test]
fn test_clear_removes_duplicates() {
    let flash = Arc::new(InMemoryFlash::default());
    let store = store_on(&flash, StoreConfig::default());
    for v in [1u32, 2] {
        flash.seed_record(FABRIC_ID.file_id(), FABRIC_ID.record_key(), &Value::U32(v).encode());
    }

    store.clear(FABRIC_ID).unwrap();
    assert_eq!(records(&flash, FABRIC_ID), 0);
    assert_eq!(store.metrics().records_deleted, 2);
}

/// Test: Power loss during an update leaves old and new records; after a
/// reboot the store reads the first and the next write converges.
#[test]
fn test_interrupted_update_converges_after_reboot() {
    let flash = Arc::new(InMemoryFlash::default());
    let before_reboot = store_on(
        &flash,
        StoreConfig {
            op_timeout_ms: Some(100),
            ..StoreConfig::default()
        },
    );
    before_reboot.write_u32(FABRIC_ID, 1).unwrap();

    flash.inject(EventKind::Update, Fault::Interrupt);
    assert_eq!(before_reboot.write_u32(FABRIC_ID, 2), Err(StoreError::Timeout));
    assert_eq!(records(&flash, FABRIC_ID), 2);
    drop(before_reboot);

    let store = store_on(&flash, StoreConfig::default());
    assert_eq!(store.read_u32(FABRIC_ID).unwrap(), 1);
    assert_eq!(store.stale_keys(), vec![FABRIC_ID]);

    store.write_u32(FABRIC_ID, 3).unwrap();
    assert_eq!(records(&flash, FABRIC_ID), 1);
    assert_eq!(store.read_u32(FABRIC_ID).unwrap(), 3);
    assert!(store.stale_keys().is_empty());
}

/// Test: A tolerant read keeps the first record and repair removes the rest.
#[test]
fn test_tolerant_read_then_repair() {
    let flash = Arc::new(InMemoryFlash::default());
    let store = store_on(&flash, StoreConfig::default());
    for v in [5u32, 6, 7] {
        flash.seed_record(FABRIC_ID.file_id(), FABRIC_ID.record_key(), &Value::U32(v).encode());
    }

    assert_eq!(store.read_u32(FABRIC_ID).unwrap(), 5);
    assert_eq!(store.stale_keys(), vec![FABRIC_ID]);

    assert_eq!(store.repair_stale().unwrap(), 2);
    assert_eq!(records(&flash, FABRIC_ID), 1);
    assert_eq!(store.read_u32(FABRIC_ID).unwrap(), 5);
    assert!(store.stale_keys().is_empty());
    assert_eq!(store.repair_stale().unwrap(), 0);
}

/// Test: Duplicates fail reads when the store is configured to report them.
#[test]
fn test_strict_mode_reports_duplicates() {
    let flash = Arc::new(InMemoryFlash::default());
    let store = store_on(
        &flash,
        StoreConfig {
            report_stale_on_read: true,
            ..StoreConfig::default()
        },
    );
    for v in [1u32, 2] {
        flash.seed_record(FABRIC_ID.file_id(), FABRIC_ID.record_key(), &Value::U32(v).encode());
    }

    assert_eq!(store.read_u32(FABRIC_ID), Err(StoreError::Corrupted));
    store.write_u32(FABRIC_ID, 4).unwrap();
    assert_eq!(store.read_u32(FABRIC_ID).unwrap(), 4);
}

/// Test: A corrupted record is reported, never returned.
#[test]
fn test_corrupted_record_reported() {
    let flash = Arc::new(InMemoryFlash::default());
    let store = store_on(&flash, StoreConfig::default());
    let desc = flash.seed_record(
        SERVICE_CONFIG.file_id(),
        SERVICE_CONFIG.record_key(),
        &Value::Bytes(b"cfg").encode(),
    );
    flash.corrupt_record(desc);

    assert_eq!(store.read_string(SERVICE_CONFIG), Err(StoreError::Corrupted));
    assert!(store.exists(SERVICE_CONFIG));
}

/// Test: A key whose record is corrupted can be cleared and written again.
#[test]
fn test_corrupted_key_cleared_then_rewritten() {
    let flash = Arc::new(InMemoryFlash::default());
    let store = store_on(&flash, StoreConfig::default());
    let desc = flash.seed_record(
        SERVICE_CONFIG.file_id(),
        SERVICE_CONFIG.record_key(),
        &Value::Bytes(b"cfg").encode(),
    );
    flash.corrupt_record(desc);

    store.clear(SERVICE_CONFIG).unwrap();
    assert!(!store.exists(SERVICE_CONFIG));
    assert_eq!(records(&flash, SERVICE_CONFIG), 0);

    store.write_str(SERVICE_CONFIG, "fresh").unwrap();
    assert_eq!(store.read_string(SERVICE_CONFIG).unwrap(), "fresh");
    assert_eq!(store.metrics().records_deleted, 1);
}

/// Test: Writing over a corrupted record replaces it.
#[test]
fn test_write_over_corrupted_record() {
    let flash = Arc::new(InMemoryFlash::default());
    let store = store_on(&flash, StoreConfig::default());
    let desc = flash.seed_record(FABRIC_ID.file_id(), FABRIC_ID.record_key(), &Value::U32(1).encode());
    flash.corrupt_record(desc);

    store.write_u32(FABRIC_ID, 2).unwrap();

    assert_eq!(records(&flash, FABRIC_ID), 1);
    assert_eq!(store.read_u32(FABRIC_ID).unwrap(), 2);
}

/// Test: Stale repair deletes a corrupted duplicate along with the other extras.
#[test]
fn test_repair_drops_corrupted_duplicate() {
    let flash = Arc::new(InMemoryFlash::default());
    let store = store_on(&flash, StoreConfig::default());
    let good = Value::U32(8).encode();
    flash.seed_record(FABRIC_ID.file_id(), FABRIC_ID.record_key(), &good);
    flash.seed_record(FABRIC_ID.file_id(), FABRIC_ID.record_key(), &good);
    assert_eq!(store.read_u32(FABRIC_ID).unwrap(), 8);
    assert_eq!(store.stale_keys(), vec![FABRIC_ID]);

    let bad = flash.seed_record(FABRIC_ID.file_id(), FABRIC_ID.record_key(), &good);
    flash.corrupt_record(bad);

    assert_eq!(store.repair_stale().unwrap(), 2);
    assert_eq!(records(&flash, FABRIC_ID), 1);
    assert_eq!(store.read_u32(FABRIC_ID).unwrap(), 8);
}
