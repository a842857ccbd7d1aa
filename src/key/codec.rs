//! Packing of configuration keys
//!
//! A configuration key is a 32-bit value that carries a flash file id in its
//! upper half and a record key in its lower half:
//!
//! ```text
//! +----------------+----------------+
//! | file id (u16)  | record key(u16)|
//! +----------------+----------------+
//!  31            16 15             0
//! ```
//!
//! The file id selects a [`Namespace`], which in turn decides whether the
//! key survives a factory reset.

use std::fmt;

/// Size in bytes of one flash storage word.
pub const WORD_SIZE: usize = 4;

/// Minimum file id accepted by the flash record library.
pub const FILE_ID_MIN: u16 = 0x0000;
/// Maximum file id accepted by the flash record library.
pub const FILE_ID_MAX: u16 = 0xBFFF;
/// Minimum record key accepted by the flash record library.
pub const RECORD_KEY_MIN: u16 = 0x0001;
/// Maximum record key accepted by the flash record library.
pub const RECORD_KEY_MAX: u16 = 0xBFFF;

/// Number of flash words needed to hold `byte_len` bytes.
pub const fn words_needed(byte_len: usize) -> usize {
    (byte_len + (WORD_SIZE - 1)) / WORD_SIZE
}

/// Logical partition of the key space.
///
/// Each namespace maps to one file of the flash record library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    /// Values set at manufacturing time. Retained during factory reset.
    Provisioning,
    /// Values set at runtime. Cleared during factory reset.
    RuntimeConfig,
    /// Persisted counter values.
    Counters,
}

impl Namespace {
    /// All namespaces, in file id order.
    pub const ALL: [Namespace; 3] = [
        Namespace::Provisioning,
        Namespace::RuntimeConfig,
        Namespace::Counters,
    ];

    /// Flash file id backing this namespace.
    pub const fn file_id(self) -> u16 {
        match self {
            Namespace::Provisioning => 0x235A,
            Namespace::RuntimeConfig => 0x235B,
            Namespace::Counters => 0x235C,
        }
    }

    /// Resolve a flash file id back to a namespace.
    pub const fn from_file_id(file_id: u16) -> Option<Namespace> {
        match file_id {
            0x235A => Some(Namespace::Provisioning),
            0x235B => Some(Namespace::RuntimeConfig),
            0x235C => Some(Namespace::Counters),
            _ => None,
        }
    }

    /// Whether a factory reset deletes every record in this namespace.
    pub const fn cleared_by_factory_reset(self) -> bool {
        match self {
            Namespace::Provisioning => false,
            Namespace::RuntimeConfig | Namespace::Counters => true,
        }
    }

    /// Short lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Provisioning => "provisioning",
            Namespace::RuntimeConfig => "config",
            Namespace::Counters => "counters",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A configuration key: (file id, record key) packed into 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(u32);

impl Key {
    /// Pack a file id and record key. No range checks.
    pub const fn new(file_id: u16, record_key: u16) -> Self {
        Key((file_id as u32) << 16 | record_key as u32)
    }

    /// Pack a namespace and record key, asserting the vendor ranges.
    ///
    /// Intended for `const` key declarations, where a bad record key fails
    /// the build instead of surfacing at runtime.
    pub const fn checked(namespace: Namespace, record_key: u16) -> Self {
        let file_id = namespace.file_id();
        assert!(file_id <= FILE_ID_MAX, "file id out of range");
        assert!(
            record_key >= RECORD_KEY_MIN && record_key <= RECORD_KEY_MAX,
            "record key out of range"
        );
        Key::new(file_id, record_key)
    }

    /// Reinterpret a raw 32-bit key.
    pub const fn from_raw(raw: u32) -> Self {
        Key(raw)
    }

    /// The raw 32-bit value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Flash file id (upper half).
    pub const fn file_id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Flash record key (lower half).
    pub const fn record_key(self) -> u16 {
        self.0 as u16
    }

    /// Namespace of this key, if the file id is one of ours.
    pub const fn namespace(self) -> Option<Namespace> {
        Namespace::from_file_id(self.file_id())
    }

    /// Whether both halves lie within the vendor ranges.
    pub const fn is_valid(self) -> bool {
        let file_id = self.file_id();
        let record_key = self.record_key();
        file_id <= FILE_ID_MAX && record_key >= RECORD_KEY_MIN && record_key <= RECORD_KEY_MAX
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}/{:04X}", self.file_id(), self.record_key())
    }
}

impl From<Key> for u32 {
    fn from(key: Key) -> u32 {
        key.0
    }
}
