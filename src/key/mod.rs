//! Configuration keys
//!
//! Translates between opaque 32-bit configuration keys and the
//! (file id, record key) pairs understood by the flash record library.

mod codec;
pub mod well_known;

pub use codec::{
    words_needed, Key, Namespace, FILE_ID_MAX, FILE_ID_MIN, RECORD_KEY_MAX, RECORD_KEY_MIN,
    WORD_SIZE,
};
pub use well_known::counter_key;
