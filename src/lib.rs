//! flashcfg - persistent key/value configuration over an asynchronous
//! flash record library
//!
//! The flash library completes every mutating operation later, from its
//! own context. [`ConfigStore`] hides that behind blocking, typed calls:
//! one flash operation in flight at a time, compaction on demand when
//! flash fills up, and exactly one record per key after every write.
//!
//! ```ignore
//! use flashcfg::{ConfigStore, StoreConfig};
//! use flashcfg::key::well_known::FABRIC_ID;
//!
//! let store = ConfigStore::in_memory(StoreConfig::default())?;
//! store.init()?;
//! store.write_u64(FABRIC_ID, 0x1234)?;
//! assert_eq!(store.read_u64(FABRIC_ID)?, 0x1234);
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod flash;
pub mod key;
pub mod locator;
pub mod observability;
pub mod store;

mod sync;

pub use config::{FlashConfig, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use key::Key;
pub use store::ConfigStore;
