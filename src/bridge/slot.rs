//! Single-slot bridge from asynchronous flash operations to blocking calls
//!
//! Exactly one flash operation is outstanding at any instant. A call that
//! finds the slot occupied fails with `Busy` instead of queueing. The
//! completion handler, registered once at construction, runs on the
//! library's context: it publishes the result into the slot and raises the
//! signal, nothing else.
//!
//! Other users share the library, so completions are matched by the
//! request id the library assigned on acceptance, never by kind or key.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::operation::{AsyncOp, OpState, PendingOperation};
use super::signal::CompletionSignal;
use crate::error::{ErrorMapper, StoreError, StoreResult};
use crate::flash::{FlashCode, FlashEvent, FlashRecordLibrary, RecordDesc};
use crate::observability::{Event, Logger, MetricsRegistry};
use crate::sync::lock;

/// State shared with the completion handler
#[derive(Debug, Default)]
struct BridgeShared {
    slot: Mutex<Option<PendingOperation>>,
    signal: CompletionSignal,
}

impl BridgeShared {
    /// Completion handler body. Runs on the library's context.
    fn on_event(&self, event: &FlashEvent) {
        {
            let mut slot = lock(&self.slot);
            let release = slot.as_mut().map_or(false, |op| op.on_event(event));
            if release {
                *slot = None;
            }
        }
        // Any library event may free queue space, so wake the caller even
        // when the event belongs to someone else.
        self.signal.raise();
    }
}

/// Serializes flash operations and waits for their completion.
pub struct AsyncOpBridge<L: FlashRecordLibrary> {
    library: Arc<L>,
    shared: Arc<BridgeShared>,
    timeout: Option<Duration>,
    metrics: Arc<MetricsRegistry>,
}

impl<L: FlashRecordLibrary> AsyncOpBridge<L> {
    /// Create the bridge and register its completion handler with the library.
    pub fn new(
        library: Arc<L>,
        timeout: Option<Duration>,
        metrics: Arc<MetricsRegistry>,
    ) -> StoreResult<Self> {
        let shared = Arc::new(BridgeShared::default());
        let handler_shared = Arc::clone(&shared);
        let code = library.register(Arc::new(move |event: &FlashEvent| {
            handler_shared.on_event(event)
        }));
        ErrorMapper::map(code)?;

        Ok(Self {
            library,
            shared,
            timeout,
            metrics,
        })
    }

    /// The underlying library, for synchronous enumeration.
    pub fn library(&self) -> &L {
        &self.library
    }

    /// Whether no operation occupies the slot.
    pub fn is_idle(&self) -> bool {
        lock(&self.shared.slot).is_none()
    }

    /// Initialize the library and wait for it to finish.
    pub fn initialize(&self) -> StoreResult<()> {
        self.execute(AsyncOp::Initialize).map(|_| ())
    }

    /// Run one operation to completion.
    ///
    /// Returns the descriptor carried by the completion event (the record
    /// written by `Add`/`Update`, the record removed by `Delete`).
    pub fn execute(&self, op: AsyncOp<'_>) -> StoreResult<Option<RecordDesc>> {
        {
            let mut slot = lock(&self.shared.slot);
            if slot.is_some() {
                self.metrics.increment_busy_rejections();
                return Err(StoreError::Busy);
            }
            *slot = Some(PendingOperation::new(&op));
        }

        self.issue(&op)?;
        let (result, desc) = self.await_completion(&op)?;
        self.metrics.increment_flash_ops();

        if !result.is_success() {
            self.log_failure(&op, result);
        }
        ErrorMapper::map(result).map(|_| desc)
    }

    /// Issue until the library accepts the request. Frees the slot on
    /// rejection.
    fn issue(&self, op: &AsyncOp<'_>) -> StoreResult<()> {
        loop {
            self.shared.signal.reset();
            self.with_pending(PendingOperation::begin_attempt);
            let code = match op.issue(self.library.as_ref()) {
                Ok(request) => {
                    self.with_pending(|pending| pending.accepted(request));
                    return Ok(());
                }
                Err(code) => code,
            };

            if code == FlashCode::NoSpaceInQueues {
                self.metrics.increment_queue_waits();
                Logger::info(
                    Event::FlashQueueFull.as_str(),
                    &[("kind", op.kind().as_str())],
                );
                if self.shared.signal.wait(self.timeout) {
                    continue;
                }
                self.release();
                self.metrics.increment_timeouts();
                Logger::warn(
                    Event::FlashOpTimeout.as_str(),
                    &[("kind", op.kind().as_str()), ("phase", "queue")],
                );
                return Err(StoreError::Timeout);
            }

            self.release();
            self.log_failure(op, code);
            return ErrorMapper::map(code);
        }
    }

    fn await_completion(
        &self,
        op: &AsyncOp<'_>,
    ) -> StoreResult<(FlashCode, Option<RecordDesc>)> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(done) = self.take_completed() {
                return Ok(done);
            }

            let remaining = match deadline {
                None => None,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return self.abandon(op);
                    }
                    Some(deadline - now)
                }
            };

            self.shared.signal.wait(remaining);
            self.shared.signal.reset();
        }
    }

    fn with_pending<F: FnOnce(&mut PendingOperation)>(&self, f: F) {
        if let Some(pending) = lock(&self.shared.slot).as_mut() {
            f(pending);
        }
    }

    /// Take the result out of the slot if it has completed, freeing the slot.
    fn take_completed(&self) -> Option<(FlashCode, Option<RecordDesc>)> {
        let mut slot = lock(&self.shared.slot);
        match slot.as_ref().map(|op| &op.state) {
            Some(&OpState::Completed { result, desc }) => {
                *slot = None;
                Some((result, desc))
            }
            _ => None,
        }
    }

    /// Give up waiting. The slot stays occupied until the completion arrives.
    fn abandon(&self, op: &AsyncOp<'_>) -> StoreResult<(FlashCode, Option<RecordDesc>)> {
        let mut slot = lock(&self.shared.slot);
        if let Some(pending) = slot.as_mut() {
            match pending.state {
                OpState::Completed { result, desc } => {
                    *slot = None;
                    return Ok((result, desc));
                }
                OpState::Pending(request) => pending.state = OpState::Abandoned(request),
                _ => {}
            }
        }
        drop(slot);

        self.metrics.increment_timeouts();
        Logger::warn(
            Event::FlashOpTimeout.as_str(),
            &[("kind", op.kind().as_str()), ("phase", "completion")],
        );
        Err(StoreError::Timeout)
    }

    fn release(&self) {
        *lock(&self.shared.slot) = None;
    }

    /// Out-of-space and not-found are handled by callers; anything else
    /// is worth a warning.
    fn log_failure(&self, op: &AsyncOp<'_>, code: FlashCode) {
        if matches!(code, FlashCode::NotFound | FlashCode::NoSpaceInFlash) {
            return;
        }
        Logger::warn(
            Event::FlashOpFailed.as_str(),
            &[("kind", op.kind().as_str()), ("result", &code.to_string())],
        );
    }
}
