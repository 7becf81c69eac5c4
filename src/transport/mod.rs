//! Network transport: one POST per attempt, no retry logic.
//!
//! The [`Transport`] trait is the seam between the retry state machine and the wire.
//! [`HttpTransport`] is the reqwest-backed implementation; tests substitute their own.

mod http;

pub use http::{HttpTransport, Transport, TransportError, TransportResponse};

#[cfg(test)]
pub use http::MockTransport;
