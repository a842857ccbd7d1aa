//! Round-trip, clear and buffer contract tests for the configuration store
//!
//! Test Categories:
//! 1. Typed round trips
//! 2. Clear idempotence and exists
//! 3. Caller buffer contract

use flashcfg::flash::InMemoryFlash;
use flashcfg::key::well_known::{
    DEVICE_CERT, FABRIC_ID, FABRIC_SECRET, FAIL_SAFE_ARMED, LAST_USED_EPOCH_KEY_ID, PAIRING_CODE,
    SERIAL_NUM, SERVICE_CONFIG,
};
use flashcfg::{ConfigStore, StoreConfig, StoreError};

fn store() -> ConfigStore<InMemoryFlash> {
    let store = ConfigStore::in_memory(StoreConfig::default()).unwrap();
    store.init().unwrap();
    store
}

// =============================================================================
// TYPED ROUND TRIPS
// =============================================================================

/// Test: Every typed write is read back unchanged.
#[test]
fn test_every_type_round_trips() {
    let store = store();

    store.write_bool(FAIL_SAFE_ARMED, false).unwrap();
    store.write_u32(LAST_USED_EPOCH_KEY_ID, u32::MAX).unwrap();
    store.write_u64(FABRIC_ID, 0x0123_4567_89AB_CDEF).unwrap();
    store.write_str(SERIAL_NUM, "SN-000042").unwrap();
    store.write_bin(FABRIC_SECRET, &[0x00, 0xFF, 0x10, 0x20, 0x30]).unwrap();

    assert!(!store.read_bool(FAIL_SAFE_ARMED).unwrap());
    assert_eq!(store.read_u32(LAST_USED_EPOCH_KEY_ID).unwrap(), u32::MAX);
    assert_eq!(store.read_u64(FABRIC_ID).unwrap(), 0x0123_4567_89AB_CDEF);
    assert_eq!(store.read_string(SERIAL_NUM).unwrap(), "SN-000042");

    let mut buf = [0u8; 16];
    let len = store.read_bin(FABRIC_SECRET, &mut buf).unwrap();
    assert_eq!(&buf[..len], &[0x00, 0xFF, 0x10, 0x20, 0x30]);
}

/// Test: Empty strings are stored and distinguished from absent keys.
#[test]
fn test_empty_string_round_trips() {
    let store = store();
    store.write_str(PAIRING_CODE, "").unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(store.read_str(PAIRING_CODE, &mut buf).unwrap(), 0);
    assert!(store.exists(PAIRING_CODE));
}

/// Test: Large binary values survive word padding with their exact length.
#[test]
fn test_unaligned_binary_length_preserved() {
    let store = store();
    let cert: Vec<u8> = (0..=254u8).collect();
    store.write_bin(DEVICE_CERT, &cert).unwrap();

    let mut buf = vec![0u8; 512];
    let len = store.read_bin(DEVICE_CERT, &mut buf).unwrap();
    assert_eq!(len, 255);
    assert_eq!(&buf[..len], cert.as_slice());
}

/// Test: Reading a key that was never written is NotFound.
#[test]
fn test_absent_key_not_found() {
    let store = store();
    assert_eq!(store.read_u32(FABRIC_ID), Err(StoreError::NotFound));
    assert_eq!(store.read_string(SERVICE_CONFIG), Err(StoreError::NotFound));
    assert!(!store.exists(FABRIC_ID));
}

// =============================================================================
// CLEAR
// =============================================================================

/// Test: Clearing removes the value; clearing again is a no-op.
#[test]
fn test_clear_is_idempotent() {
    let store = store();
    store.write_u32(FABRIC_ID, 5).unwrap();
    assert!(store.exists(FABRIC_ID));

    store.clear(FABRIC_ID).unwrap();
    assert!(!store.exists(FABRIC_ID));
    assert_eq!(store.read_u32(FABRIC_ID), Err(StoreError::NotFound));

    store.clear(FABRIC_ID).unwrap();
    assert!(!store.exists(FABRIC_ID));
}

/// Test: Clearing a key that never existed succeeds without flash traffic.
#[test]
fn test_clear_absent_key() {
    let store = store();
    let before = store.library().stats().accepted;
    store.clear(SERVICE_CONFIG).unwrap();
    assert_eq!(store.library().stats().accepted, before);
}

// =============================================================================
// BUFFER CONTRACT
// =============================================================================

/// Test: A short buffer reports the exact required length and is untouched.
#[test]
fn test_buffer_too_small_leaves_buffer_untouched() {
    let store = store();
    store.write_str(SERIAL_NUM, "hello world").unwrap();

    let mut small = [0xAAu8; 4];
    assert_eq!(
        store.read_str(SERIAL_NUM, &mut small),
        Err(StoreError::BufferTooSmall { required: 11 })
    );
    assert_eq!(small, [0xAA; 4]);

    let mut exact = [0u8; 11];
    assert_eq!(store.read_str(SERIAL_NUM, &mut exact).unwrap(), 11);
    assert_eq!(&exact, b"hello world");
}

/// Test: Bytes beyond the value length are left as they were.
#[test]
fn test_read_does_not_touch_buffer_tail() {
    let store = store();
    store.write_bin(FABRIC_SECRET, &[1, 2, 3]).unwrap();

    let mut buf = [0xEEu8; 8];
    assert_eq!(store.read_bin(FABRIC_SECRET, &mut buf).unwrap(), 3);
    assert_eq!(buf, [1, 2, 3, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE]);
}

/// Test: Values longer than the configured maximum are rejected.
#[test]
fn test_value_too_large() {
    let store = store();
    let max = store.config().max_value_len;
    let err = store.write_bin(DEVICE_CERT, &vec![0u8; max + 1]).unwrap_err();
    assert_eq!(err, StoreError::ValueTooLarge { len: max + 1, max });
    assert_eq!(store.read_bin(DEVICE_CERT, &mut []), Err(StoreError::NotFound));

    store.write_bin(DEVICE_CERT, &vec![7u8; max]).unwrap();
}
