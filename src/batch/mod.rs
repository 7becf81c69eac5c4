//! Concurrent batch dispatch.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ConcurrencyGate`] | FIFO counting gate bounding requests in flight |
//! | [`Dispatcher`] | Runs a batch under a gate, returning results in input order |
//! | [`BatchReport`] | Responses plus per-request [`CallStats`](crate::client::CallStats) |
//!
//! A batch is all-or-nothing: every task runs to completion, then either all responses
//! are returned or the first terminal error is.

mod dispatcher;
mod gate;

pub use dispatcher::{BatchReport, Dispatcher};
pub use gate::{ConcurrencyGate, GatePermit};
