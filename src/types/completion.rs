//! Caller-facing input and output shapes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One prompt or an ordered batch of prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptInput {
    Single(String),
    Batch(Vec<String>),
}

impl From<&str> for PromptInput {
    fn from(p: &str) -> Self {
        PromptInput::Single(p.to_string())
    }
}

impl From<String> for PromptInput {
    fn from(p: String) -> Self {
        PromptInput::Single(p)
    }
}

impl From<Vec<String>> for PromptInput {
    fn from(ps: Vec<String>) -> Self {
        PromptInput::Batch(ps)
    }
}

impl From<Vec<&str>> for PromptInput {
    fn from(ps: Vec<&str>) -> Self {
        PromptInput::Batch(ps.into_iter().map(str::to_string).collect())
    }
}

/// A prompt paired with the raw JSON body the endpoint returned for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub prompt: String,
    pub response: serde_json::Value,
}

impl Completion {
    /// `choices[0].message.content` of an OpenAI-compatible response, if present.
    pub fn content(&self) -> Option<&str> {
        self.response
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
    }
}

/// Mirrors the shape of [`PromptInput`].
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutput {
    Single(Completion),
    Batch(Vec<Completion>),
}

impl SendOutput {
    pub fn into_vec(self) -> Vec<Completion> {
        match self {
            SendOutput::Single(c) => vec![c],
            SendOutput::Batch(cs) => cs,
        }
    }
}

/// Per-call overrides of the client's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub concurrency: Option<usize>,
    pub timeout: Option<Duration>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = Some(n);
        self
    }

    pub fn timeout(mut self, t: Duration) -> Self {
        self.timeout = Some(t);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_extracts_first_choice() {
        let c = Completion {
            prompt: "Hello".to_string(),
            response: json!({"choices": [{"message": {"role": "assistant", "content": "Hi!"}}]}),
        };
        assert_eq!(c.content(), Some("Hi!"));
    }

    #[test]
    fn test_content_is_none_for_other_shapes() {
        let c = Completion {
            prompt: "Hello".to_string(),
            response: json!({"error": "nope"}),
        };
        assert_eq!(c.content(), None);
    }

    #[test]
    fn test_prompt_input_conversions() {
        assert_eq!(PromptInput::from("a"), PromptInput::Single("a".to_string()));
        assert_eq!(
            PromptInput::from(vec!["a", "b"]),
            PromptInput::Batch(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_completion_serializes_as_pair() {
        let c = Completion {
            prompt: "p".to_string(),
            response: json!({"x": 1}),
        };
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            json!({"prompt": "p", "response": {"x": 1}})
        );
    }
}
