//! Flash operations and the state of the one in flight

use crate::flash::{EventKind, FlashCode, FlashEvent, FlashRecordLibrary, RecordDesc, RequestId};

/// One asynchronous flash operation, borrowed for the duration of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncOp<'a> {
    /// Initialize the library
    Initialize,
    /// Add a new record
    Add {
        file_id: u16,
        record_key: u16,
        data: &'a [u8],
    },
    /// Replace an existing record
    Update {
        desc: RecordDesc,
        file_id: u16,
        record_key: u16,
        data: &'a [u8],
    },
    /// Delete one record
    Delete { desc: RecordDesc },
    /// Delete every record of a key
    DeleteByKey { file_id: u16, record_key: u16 },
    /// Delete every record of a namespace
    DeleteNamespace { file_id: u16 },
    /// Garbage-collect deleted records
    Compact,
}

impl AsyncOp<'_> {
    /// Kind of the completion event this operation produces.
    pub fn kind(&self) -> EventKind {
        match self {
            AsyncOp::Initialize => EventKind::Init,
            AsyncOp::Add { .. } => EventKind::Write,
            AsyncOp::Update { .. } => EventKind::Update,
            AsyncOp::Delete { .. } => EventKind::DelRecord,
            AsyncOp::DeleteByKey { .. } => EventKind::DelKey,
            AsyncOp::DeleteNamespace { .. } => EventKind::DelFile,
            AsyncOp::Compact => EventKind::Gc,
        }
    }

    /// Hand the operation to the library. Returns the id of the accepted
    /// request, or the code it was rejected with.
    pub(crate) fn issue<L: FlashRecordLibrary + ?Sized>(
        &self,
        library: &L,
    ) -> Result<RequestId, FlashCode> {
        match *self {
            AsyncOp::Initialize => library.init(),
            AsyncOp::Add {
                file_id,
                record_key,
                data,
            } => library.write(file_id, record_key, data),
            AsyncOp::Update {
                desc,
                file_id,
                record_key,
                data,
            } => library.update(desc, file_id, record_key, data),
            AsyncOp::Delete { desc } => library.delete(desc),
            AsyncOp::DeleteByKey {
                file_id,
                record_key,
            } => library.delete_by_key(file_id, record_key),
            AsyncOp::DeleteNamespace { file_id } => library.delete_file(file_id),
            AsyncOp::Compact => library.gc(),
        }
    }
}

/// Progress of the operation held in the bridge slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OpState {
    /// Being handed to the library, or waiting for queue space. Events that
    /// arrive meanwhile are kept: the library may complete the request
    /// before the caller learns its id.
    Issuing { early: Vec<FlashEvent> },
    /// Accepted as `request`, awaiting its completion
    Pending(RequestId),
    /// Completion received
    Completed {
        result: FlashCode,
        desc: Option<RecordDesc>,
    },
    /// Caller stopped waiting; the slot is released when the completion of
    /// `request` finally arrives
    Abandoned(RequestId),
}

/// The single operation in flight.
#[derive(Debug, Clone)]
pub(crate) struct PendingOperation {
    pub kind: EventKind,
    pub state: OpState,
}

impl PendingOperation {
    pub fn new(op: &AsyncOp<'_>) -> Self {
        Self {
            kind: op.kind(),
            state: OpState::Issuing { early: Vec::new() },
        }
    }

    /// Start a new issue attempt, forgetting events seen by earlier ones.
    pub fn begin_attempt(&mut self) {
        self.state = OpState::Issuing { early: Vec::new() };
    }

    /// Record the completion handler's view of `event`. Returns `true` when
    /// the slot should be released.
    pub fn on_event(&mut self, event: &FlashEvent) -> bool {
        match &mut self.state {
            OpState::Issuing { early } => {
                if event.kind == self.kind {
                    early.push(*event);
                }
                false
            }
            OpState::Pending(request) if *request == event.request => {
                self.state = OpState::Completed {
                    result: event.result,
                    desc: event.desc,
                };
                false
            }
            OpState::Abandoned(request) => *request == event.request,
            _ => false,
        }
    }

    /// The library accepted the request as `request`. Completes at once if
    /// its event already arrived.
    pub fn accepted(&mut self, request: RequestId) {
        let early = match &mut self.state {
            OpState::Issuing { early } => std::mem::take(early),
            _ => Vec::new(),
        };
        self.state = match early.iter().find(|event| event.request == request) {
            Some(event) => OpState::Completed {
                result: event.result,
                desc: event.desc,
            },
            None => OpState::Pending(request),
        };
    }
}
