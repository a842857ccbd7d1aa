//! Translation of flash library result codes into store errors

use super::{StoreError, StoreResult};
use crate::flash::FlashCode;

/// Maps library result codes to the store's error taxonomy.
pub struct ErrorMapper;

impl ErrorMapper {
    /// Translate one library code. Codes without a dedicated store error
    /// become [`StoreError::Internal`] carrying the raw code.
    pub fn map(code: FlashCode) -> StoreResult<()> {
        match code {
            FlashCode::Success => Ok(()),
            FlashCode::NotFound => Err(StoreError::NotFound),
            FlashCode::NoSpaceInFlash => Err(StoreError::OutOfSpace),
            FlashCode::CrcCheckFailed => Err(StoreError::Corrupted),
            FlashCode::NotInitialized => Err(StoreError::NotInitialized),
            FlashCode::Busy => Err(StoreError::Busy),
            other => Err(StoreError::Internal(other.raw())),
        }
    }
}
