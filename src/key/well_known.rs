//! Well-known configuration keys
//!
//! Provisioning keys hold manufacturing data and survive a factory reset.
//! Runtime keys are written by the device during operation and are cleared
//! by a factory reset. Persisted counters occupy their own namespace.

use super::codec::{Key, Namespace, RECORD_KEY_MAX, RECORD_KEY_MIN};

// Provisioning namespace
pub const SERIAL_NUM: Key = Key::checked(Namespace::Provisioning, 0x0001);
pub const DEVICE_ID: Key = Key::checked(Namespace::Provisioning, 0x0002);
pub const DEVICE_CERT: Key = Key::checked(Namespace::Provisioning, 0x0003);
pub const DEVICE_PRIVATE_KEY: Key = Key::checked(Namespace::Provisioning, 0x0004);
pub const MANUFACTURING_DATE: Key = Key::checked(Namespace::Provisioning, 0x0005);
pub const PAIRING_CODE: Key = Key::checked(Namespace::Provisioning, 0x0006);

// Runtime-config namespace
pub const FABRIC_ID: Key = Key::checked(Namespace::RuntimeConfig, 0x0007);
pub const SERVICE_CONFIG: Key = Key::checked(Namespace::RuntimeConfig, 0x0008);
pub const PAIRED_ACCOUNT_ID: Key = Key::checked(Namespace::RuntimeConfig, 0x0009);
pub const SERVICE_ID: Key = Key::checked(Namespace::RuntimeConfig, 0x000A);
pub const FABRIC_SECRET: Key = Key::checked(Namespace::RuntimeConfig, 0x000B);
pub const LAST_USED_EPOCH_KEY_ID: Key = Key::checked(Namespace::RuntimeConfig, 0x000C);
pub const FAIL_SAFE_ARMED: Key = Key::checked(Namespace::RuntimeConfig, 0x000D);
pub const GROUP_KEY: Key = Key::checked(Namespace::RuntimeConfig, 0x000E);

/// Base record key for persisted counters. The counter id is added to it.
pub const PERSISTED_COUNTER_RECORD_KEY_BASE: u16 = RECORD_KEY_MIN;
/// Highest record key usable by a persisted counter.
pub const PERSISTED_COUNTER_RECORD_KEY_MAX: u16 = RECORD_KEY_MAX;

/// Key of the persisted counter with the given id.
///
/// Returns `None` when the id would push the record key past
/// [`PERSISTED_COUNTER_RECORD_KEY_MAX`].
pub fn counter_key(counter_id: u16) -> Option<Key> {
    let record_key = PERSISTED_COUNTER_RECORD_KEY_BASE.checked_add(counter_id)?;
    if record_key > PERSISTED_COUNTER_RECORD_KEY_MAX {
        return None;
    }
    Some(Key::new(Namespace::Counters.file_id(), record_key))
}

/// Every well-known key with its display name.
pub fn all() -> &'static [(&'static str, Key)] {
    &[
        ("serial_num", SERIAL_NUM),
        ("device_id", DEVICE_ID),
        ("device_cert", DEVICE_CERT),
        ("device_private_key", DEVICE_PRIVATE_KEY),
        ("manufacturing_date", MANUFACTURING_DATE),
        ("pairing_code", PAIRING_CODE),
        ("fabric_id", FABRIC_ID),
        ("service_config", SERVICE_CONFIG),
        ("paired_account_id", PAIRED_ACCOUNT_ID),
        ("service_id", SERVICE_ID),
        ("fabric_secret", FABRIC_SECRET),
        ("last_used_epoch_key_id", LAST_USED_EPOCH_KEY_ID),
        ("fail_safe_armed", FAIL_SAFE_ARMED),
        ("group_key", GROUP_KEY),
    ]
}
