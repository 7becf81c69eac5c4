use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Proxy;
use std::time::Duration;
use url::Url;

/// Status line, `Content-Type` and raw body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A single network call.
///
/// Implementations perform exactly one exchange and must bound it by `timeout`
/// (connect, send and reading the full body). Any HTTP status is returned as
/// `Ok`; only failures that prevent a complete response are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        body: &serde_json::Value,
        timeout: Duration,
        request_id: &str,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(timeout)
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Http(e)
        }
    }
}

/// reqwest-backed transport posting JSON to a fixed endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: Url, api_key: Option<String>) -> Result<Self> {
        Self::with_proxy(endpoint, api_key, None)
    }

    pub fn with_proxy(endpoint: Url, api_key: Option<String>, proxy: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(proxy_url) = proxy {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    "Invalid proxy URL",
                    ErrorContext::new()
                        .with_field_path("proxy")
                        .with_details(e.to_string())
                        .with_source("http_transport"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                "Failed to build HTTP client",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("http_transport"),
            )
        })?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        body: &serde_json::Value,
        timeout: Duration,
        request_id: &str,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut req = self
            .client
            .post(self.endpoint.clone())
            .json(body)
            .timeout(timeout)
            .header("x-request-id", request_id);

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // The per-request timeout also covers reading the body.
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn endpoint(server: &mockito::ServerGuard) -> Url {
        Url::parse(&format!("{}/chat/completions", server.url())).unwrap()
    }

    #[tokio::test]
    async fn test_post_json_sends_bearer_and_request_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_header("x-request-id", "req-1")
            .match_body(Matcher::Json(serde_json::json!({"model": "m"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new(endpoint(&server), Some("sk-test".to_string())).unwrap();
        let resp = transport
            .post_json(
                &serde_json::json!({"model": "m"}),
                Duration::from_secs(5),
                "req-1",
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type.as_deref(), Some("application/json"));
        assert_eq!(resp.body, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_post_json_omits_authorization_without_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let transport = HttpTransport::new(endpoint(&server), None).unwrap();
        transport
            .post_json(&serde_json::json!({}), Duration::from_secs(5), "req-2")
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_statuses_are_returned_not_raised() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let transport = HttpTransport::new(endpoint(&server), None).unwrap();
        let resp = transport
            .post_json(&serde_json::json!({}), Duration::from_secs(5), "req-3")
            .await
            .unwrap();
        assert_eq!(resp.status, 503);
        assert_eq!(resp.body, "overloaded");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_transport_error() {
        // Port 9 (discard) is not expected to accept connections on test hosts.
        let transport =
            HttpTransport::new(Url::parse("http://127.0.0.1:9/v1").unwrap(), None).unwrap();
        let err = transport
            .post_json(&serde_json::json!({}), Duration::from_secs(2), "req-4")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Connect(_) | TransportError::Timeout(_) | TransportError::Http(_)
        ));
    }
}
