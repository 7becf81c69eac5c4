//! Request payload shaping for OpenAI-compatible chat completion endpoints.

use super::message::Message;
use serde::{Deserialize, Serialize};

/// Routing preferences understood by aggregators such as OpenRouter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

impl Default for ProviderPreferences {
    fn default() -> Self {
        Self {
            data_collection: Some("deny".to_string()),
            sort: Some("price".to_string()),
        }
    }
}

/// Sampling and routing parameters applied to every prompt a client sends.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDefaults {
    pub temperature: f64,
    pub max_tokens: u32,
    pub provider: Option<ProviderPreferences>,
    pub quantizations: Option<String>,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 2048,
            provider: Some(ProviderPreferences::default()),
            quantizations: Some("bf16".to_string()),
        }
    }
}

impl RequestDefaults {
    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn provider(mut self, provider: Option<ProviderPreferences>) -> Self {
        self.provider = provider;
        self
    }

    pub fn quantizations(mut self, q: Option<String>) -> Self {
        self.quantizations = q;
        self
    }
}

/// Chat completion request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderPreferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantizations: Option<String>,
}

impl ChatRequest {
    /// Wrap a single user prompt. Streaming is always off.
    pub fn from_prompt(model: &str, prompt: &str, defaults: &RequestDefaults) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![Message::user(prompt)],
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            stream: false,
            provider: defaults.provider.clone(),
            quantizations: defaults.quantizations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_payload_shape() {
        let req = ChatRequest::from_prompt(
            "openai/gpt-4o-mini",
            "What is 2+2?",
            &RequestDefaults::default(),
        );
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "model": "openai/gpt-4o-mini",
                "messages": [{"role": "user", "content": "What is 2+2?"}],
                "temperature": 0.0,
                "max_tokens": 2048,
                "stream": false,
                "provider": {"data_collection": "deny", "sort": "price"},
                "quantizations": "bf16"
            })
        );
    }

    #[test]
    fn test_routing_fields_can_be_dropped() {
        let defaults = RequestDefaults::default()
            .temperature(0.7)
            .max_tokens(64)
            .provider(None)
            .quantizations(None);
        let v = serde_json::to_value(ChatRequest::from_prompt("m", "hi", &defaults)).unwrap();
        assert!(v.get("provider").is_none());
        assert!(v.get("quantizations").is_none());
        assert_eq!(v["temperature"], json!(0.7));
        assert_eq!(v["max_tokens"], json!(64));
    }
}
