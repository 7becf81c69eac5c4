use crate::batch::Dispatcher;
use crate::client::core::LlmClient;
use crate::client::execution::RequestExecutor;
use crate::client::policy::RetryPolicy;
use crate::transport::{HttpTransport, Transport};
use crate::types::RequestDefaults;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const MODEL_ENV: &str = "LLM_DISPATCH_MODEL";
pub const ENDPOINT_ENV: &str = "LLM_DISPATCH_ENDPOINT";
pub const CONCURRENCY_ENV: &str = "LLM_DISPATCH_CONCURRENCY";
pub const TIMEOUT_SECS_ENV: &str = "LLM_DISPATCH_TIMEOUT_SECS";
pub const PROXY_ENV: &str = "LLM_DISPATCH_PROXY_URL";

/// Builder for creating clients with custom configuration.
///
/// All configuration is resolved here; the client never reads the environment while
/// dispatching.
pub struct LlmClientBuilder {
    model: Option<String>,
    endpoint: String,
    api_key: Option<String>,
    require_api_key: bool,
    concurrency: usize,
    timeout: Duration,
    retry_policy: RetryPolicy,
    defaults: RequestDefaults,
    proxy: Option<String>,
    transport: Option<Arc<dyn Transport>>,
}

impl LlmClientBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            require_api_key: true,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            defaults: RequestDefaults::default(),
            proxy: None,
            transport: None,
        }
    }

    /// Start from the process environment. Call once at startup.
    ///
    /// Reads:
    /// - `OPENROUTER_API_KEY`
    /// - `LLM_DISPATCH_MODEL`
    /// - `LLM_DISPATCH_ENDPOINT`
    /// - `LLM_DISPATCH_CONCURRENCY`
    /// - `LLM_DISPATCH_TIMEOUT_SECS`
    /// - `LLM_DISPATCH_PROXY_URL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::new();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(API_KEY_ENV) {
            builder.api_key = Some(key);
        }
        if let Some(model) = get(MODEL_ENV) {
            builder.model = Some(model);
        }
        if let Some(endpoint) = get(ENDPOINT_ENV) {
            builder.endpoint = endpoint;
        }
        if let Some(raw) = get(CONCURRENCY_ENV) {
            builder.concurrency = parse_env(CONCURRENCY_ENV, &raw)?;
        }
        if let Some(raw) = get(TIMEOUT_SECS_ENV) {
            builder.timeout = Duration::from_secs(parse_env(TIMEOUT_SECS_ENV, &raw)?);
        }
        if let Some(proxy) = get(PROXY_ENV) {
            builder.proxy = Some(proxy);
        }
        Ok(builder)
    }

    /// Model identifier sent with every request (e.g. "openai/gpt-4o-mini").
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Full URL requests are POSTed to.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Fill the API key from `OPENROUTER_API_KEY` unless one was set explicitly.
    pub fn api_key_from_env(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty());
        }
        self
    }

    /// Build without a credential (local endpoints). No `Authorization` header is sent.
    pub fn allow_missing_api_key(mut self) -> Self {
        self.require_api_key = false;
        self
    }

    /// Default number of requests in flight per batch.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    /// Default per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn request_defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy = Some(proxy_url.into());
        self
    }

    /// Use a custom transport instead of HTTP. The endpoint and proxy are then ignored.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<LlmClient> {
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| config_error("model is required", "model", None))?;

        if self.require_api_key && self.api_key.is_none() {
            return Err(config_error(
                "API key is required",
                API_KEY_ENV,
                Some("set it explicitly, via the environment, or call allow_missing_api_key()"),
            ));
        }
        if self.concurrency == 0 {
            return Err(config_error(
                "concurrency must be at least 1",
                "concurrency",
                None,
            ));
        }
        if self.timeout.is_zero() {
            return Err(config_error("timeout must be positive", "timeout", None));
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => {
                let endpoint = parse_endpoint(&self.endpoint)?;
                Arc::new(HttpTransport::with_proxy(
                    endpoint,
                    self.api_key,
                    self.proxy.as_deref(),
                )?)
            }
        };

        let executor = RequestExecutor::with_policy(transport, self.retry_policy);
        Ok(LlmClient::new(
            model,
            Dispatcher::new(executor),
            self.defaults,
            self.concurrency,
            self.timeout,
        ))
    }
}

impl Default for LlmClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn config_error(message: &str, field: &str, details: Option<&str>) -> Error {
    let mut context = ErrorContext::new()
        .with_field_path(field)
        .with_source("client_builder");
    if let Some(d) = details {
        context = context.with_details(d);
    }
    Error::configuration_with_context(message, context)
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        config_error(
            "invalid numeric value",
            key,
            Some(&format!("got {:?}", raw)),
        )
    })
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| config_error("invalid endpoint URL", "endpoint", Some(&e.to_string())))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(config_error(
            "endpoint must use http or https",
            "endpoint",
            Some(&format!("got scheme {:?}", other)),
        )),
    }
}
