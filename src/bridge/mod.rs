//! Asynchronous flash operations as blocking calls

mod slot;
mod operation;
mod signal;

pub use slot::AsyncOpBridge;
pub use operation::AsyncOp;
