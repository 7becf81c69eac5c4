//! Core data types.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and content |
//! | [`ChatRequest`] | Request body built from a prompt and [`RequestDefaults`] |
//! | [`PromptInput`] | One prompt or an ordered batch |
//! | [`Completion`] | A prompt paired with its response body |

pub mod completion;
pub mod message;
pub mod request;

pub use completion::{Completion, PromptInput, SendOptions, SendOutput};
pub use message::{Message, MessageRole};
pub use request::{ChatRequest, ProviderPreferences, RequestDefaults};
