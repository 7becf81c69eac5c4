//! # llm-dispatch
//!
//! Concurrent, retrying client for OpenAI-compatible chat completion endpoints.
//!
//! ## Overview
//!
//! Each prompt becomes one HTTP request. A batch of prompts is dispatched concurrently
//! under a counting gate, transient failures are retried with exponential backoff and
//! jitter, and the responses come back in the order the prompts were given.
//!
//! - **Bounded concurrency**: at most N requests in flight; a request keeps its slot
//!   through all of its retries
//! - **Classified failures**: 4xx answers fail at once, 5xx answers, network errors and
//!   timeouts are retried up to three attempts in total
//! - **All-or-nothing batches**: the first terminal failure fails the batch, after every
//!   other request has settled
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_dispatch::LlmClientBuilder;
//!
//! #[tokio::main]
//! async fn main() -> llm_dispatch::Result<()> {
//!     let client = LlmClientBuilder::new()
//!         .model("openai/gpt-4o-mini")
//!         .api_key_from_env()
//!         .concurrency(8)
//!         .build()?;
//!
//!     let answers = client.send_batch(&["What is 2+2?", "Name a prime."]).await?;
//!     for c in &answers {
//!         println!("{} -> {:?}", c.prompt, c.content());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client, builder, retry policy and single-request execution |
//! | [`batch`] | Concurrency gate and batch dispatcher |
//! | [`transport`] | HTTP transport seam |
//! | [`types`] | Request payloads, prompts and completions |
//! | [`error`] | Error type and failure classes |
//!
//! The crate logs through `tracing` and never installs a subscriber.

pub mod batch;
pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use batch::{BatchReport, Dispatcher};
pub use client::{CallStats, ErrorClass, LlmClient, LlmClientBuilder, RetryPolicy};
pub use error::{Error, ErrorContext};
pub use types::{
    ChatRequest, Completion, Message, MessageRole, PromptInput, RequestDefaults, SendOptions,
    SendOutput,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
