//! Client for OpenAI-compatible chat completion endpoints.
//!
//! The public surface is [`LlmClient`] and its [`LlmClientBuilder`]. Retry and
//! classification rules live in their own submodules so the dispatcher and tests can
//! use them directly.

pub mod builder;
pub mod core;
pub mod error_classification;
pub mod execution;
pub mod policy;
pub mod signals;

pub use builder::LlmClientBuilder;
pub use core::LlmClient;
pub use error_classification::ErrorClass;
pub use execution::{AttemptOutcome, AttemptRecord, CallStats, RequestExecutor};
pub use policy::{Decision, RetryPolicy};
pub use signals::InflightSnapshot;
