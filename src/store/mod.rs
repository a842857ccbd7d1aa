//! Configuration store
//!
//! [`ConfigStore`] is the public face of the crate: typed reads and writes
//! of configuration keys, factory reset and self-test.

mod self_test;
mod config_store;
mod value;

pub use self_test::{SelfTestReport, StepResult, SELF_TEST_KEY};
pub use config_store::ConfigStore;
pub use value::{framed_len, Value};
