//! Record payload framing
//!
//! - `bool` and `u32` occupy one word, `u64` two, little endian
//! - Strings and binary blobs carry a one-word little-endian byte length,
//!   followed by the bytes, zero padded to a whole word
//!
//! Any payload whose length disagrees with its framing is `Corrupted`.

use crate::error::{StoreError, StoreResult};
use crate::key::{words_needed, WORD_SIZE};

/// A value ready to be written to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Bool(bool),
    U32(u32),
    U64(u64),
    Bytes(&'a [u8]),
}

impl Value<'_> {
    /// Word-padded record payload.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Value::Bool(v) => u32::from(v).to_le_bytes().to_vec(),
            Value::U32(v) => v.to_le_bytes().to_vec(),
            Value::U64(v) => v.to_le_bytes().to_vec(),
            Value::Bytes(data) => {
                let mut payload = Vec::with_capacity(framed_len(data.len()));
                payload.extend_from_slice(&(data.len() as u32).to_le_bytes());
                payload.extend_from_slice(data);
                payload.resize(framed_len(data.len()), 0);
                payload
            }
        }
    }
}

/// Payload length of a framed string or blob of `len` bytes.
pub fn framed_len(len: usize) -> usize {
    WORD_SIZE + words_needed(len) * WORD_SIZE
}

pub fn decode_bool(payload: &[u8]) -> StoreResult<bool> {
    decode_u32(payload).map(|v| v != 0)
}

pub fn decode_u32(payload: &[u8]) -> StoreResult<u32> {
    let bytes: [u8; 4] = payload.try_into().map_err(|_| StoreError::Corrupted)?;
    Ok(u32::from_le_bytes(bytes))
}

pub fn decode_u64(payload: &[u8]) -> StoreResult<u64> {
    let bytes: [u8; 8] = payload.try_into().map_err(|_| StoreError::Corrupted)?;
    Ok(u64::from_le_bytes(bytes))
}

/// The bytes of a framed string or blob.
pub fn decode_bytes(payload: &[u8]) -> StoreResult<&[u8]> {
    if payload.len() < WORD_SIZE {
        return Err(StoreError::Corrupted);
    }
    let (header, rest) = payload.split_at(WORD_SIZE);
    let mut len_bytes = [0u8; WORD_SIZE];
    len_bytes.copy_from_slice(header);
    let len = u32::from_le_bytes(len_bytes) as usize;

    if framed_len(len) != payload.len() {
        return Err(StoreError::Corrupted);
    }
    Ok(&rest[..len])
}
