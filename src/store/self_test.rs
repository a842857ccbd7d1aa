//! Store self-test
//!
//! Exercises write, read, overwrite, exists and clear on a scratch key in
//! the runtime-config namespace and reports each step.

use std::fmt;

use super::config_store::ConfigStore;
use crate::error::{StoreError, StoreResult};
use crate::flash::FlashRecordLibrary;
use crate::key::{Key, Namespace};
use crate::observability::{ObservationScope, SELF_TEST_SCOPE};

/// Scratch key used by the self-test. Cleared when the test finishes.
pub const SELF_TEST_KEY: Key = Key::checked(Namespace::RuntimeConfig, 0x0100);

/// Outcome of one self-test step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub name: &'static str,
    pub outcome: Result<(), String>,
}

/// Outcome of the whole self-test.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelfTestReport {
    pub steps: Vec<StepResult>,
}

impl SelfTestReport {
    /// True when every step passed.
    pub fn passed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|step| step.outcome.is_ok())
    }

    /// First failing step, if any.
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps.iter().find(|step| step.outcome.is_err())
    }
}

impl fmt::Display for SelfTestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match &step.outcome {
                Ok(()) => writeln!(f, "  ok    {}", step.name)?,
                Err(reason) => writeln!(f, "  FAIL  {}: {}", step.name, reason)?,
            }
        }
        write!(f, "{}", if self.passed() { "PASS" } else { "FAIL" })
    }
}

fn expect_eq<T: PartialEq + fmt::Debug>(got: StoreResult<T>, want: T) -> Result<(), String> {
    match got {
        Ok(v) if v == want => Ok(()),
        Ok(v) => Err(format!("expected {:?}, got {:?}", want, v)),
        Err(err) => Err(err.to_string()),
    }
}

fn expect_not_found<T: fmt::Debug>(got: StoreResult<T>) -> Result<(), String> {
    match got {
        Err(StoreError::NotFound) => Ok(()),
        Ok(v) => Err(format!("expected not found, got {:?}", v)),
        Err(err) => Err(err.to_string()),
    }
}

fn expect_ok(result: StoreResult<()>) -> Result<(), String> {
    result.map_err(|err| err.to_string())
}

impl<L: FlashRecordLibrary> ConfigStore<L> {
    /// Run the self-test. Stops at the first failing step.
    pub fn self_test(&self) -> SelfTestReport {
        let scope = ObservationScope::new(SELF_TEST_SCOPE);
        let key = SELF_TEST_KEY;
        let mut report = SelfTestReport::default();

        let steps: [(&'static str, &dyn Fn() -> Result<(), String>); 9] = [
            ("clear scratch key", &|| expect_ok(self.clear(key))),
            ("absent key not found", &|| expect_not_found(self.read_u32(key))),
            ("write u32", &|| expect_ok(self.write_u32(key, 0x5A5A_0001))),
            ("read u32", &|| expect_eq(self.read_u32(key), 0x5A5A_0001)),
            ("write over existing", &|| expect_ok(self.write_u32(key, 0x5A5A_0002))),
            ("read overwritten", &|| expect_eq(self.read_u32(key), 0x5A5A_0002)),
            ("exists", &|| expect_eq(Ok(self.exists(key)), true)),
            ("clear", &|| expect_ok(self.clear(key))),
            ("cleared key absent", &|| expect_eq(Ok(self.exists(key)), false)),
        ];

        for (name, step) in steps {
            let outcome = step();
            let failed = outcome.is_err();
            report.steps.push(StepResult { name, outcome });
            if failed {
                break;
            }
        }

        match report.first_failure() {
            None => scope.complete_with_fields(&[("steps", &report.steps.len().to_string())]),
            Some(step) => scope.fail(step.name),
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::flash::{EventKind, Fault, FlashCode, InMemoryFlash};

    fn store() -> ConfigStore<InMemoryFlash> {
        let store = ConfigStore::in_memory(StoreConfig::default()).unwrap();
        store.init().unwrap();
        store
    }

    #[test]
    fn test_self_test_passes() {
        let store = store();
        let report = store.self_test();
        assert!(report.passed(), "{}", report);
        assert_eq!(report.steps.len(), 9);
        assert!(!store.exists(SELF_TEST_KEY));
    }

    #[test]
    fn test_self_test_reports_failing_step() {
        let store = store();
        store
            .library()
            .inject(EventKind::Update, Fault::Fail(FlashCode::Internal));
        let report = store.self_test();
        assert!(!report.passed());
        assert_eq!(report.first_failure().unwrap().name, "write over existing");
        assert!(report.to_string().ends_with("FAIL"));
    }

    #[test]
    fn test_self_test_before_init_fails() {
        let store = ConfigStore::in_memory(StoreConfig::default()).unwrap();
        let report = store.self_test();
        assert!(!report.passed());
        assert_eq!(report.steps.len(), 1);
    }
}
