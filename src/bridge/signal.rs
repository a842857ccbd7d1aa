//! Persistent completion signal
//!
//! Created once with the bridge and reused for every operation. The waiter
//! resets it before issuing, the completion handler raises it after
//! publishing the result.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::sync::lock;

#[derive(Debug, Default)]
pub(crate) struct CompletionSignal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl CompletionSignal {
    /// Lower the signal.
    pub fn reset(&self) {
        *lock(&self.raised) = false;
    }

    /// Raise the signal and wake every waiter. Never blocks on the waiter.
    pub fn raise(&self) {
        *lock(&self.raised) = true;
        self.cond.notify_all();
    }

    /// Block until the signal is raised. With a timeout, returns `false` if
    /// it expires first.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut raised = lock(&self.raised);
        while !*raised {
            match deadline {
                None => {
                    raised = self.cond.wait(raised).unwrap_or_else(|e| e.into_inner());
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    raised = self
                        .cond
                        .wait_timeout(raised, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_raise_before_wait_is_not_lost() {
        let signal = CompletionSignal::default();
        signal.raise();
        assert!(signal.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_reset_lowers_signal() {
        let signal = CompletionSignal::default();
        signal.raise();
        signal.reset();
        assert!(!signal.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_wakes_waiter_on_other_thread() {
        let signal = Arc::new(CompletionSignal::default());
        let raiser = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            raiser.raise();
        });
        assert!(signal.wait(None));
        handle.join().unwrap();
    }
}
