use crate::client::error_classification::ErrorClass;
use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for configuration and validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "builder.endpoint", "LLM_DISPATCH_CONCURRENCY")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "client_builder", "concurrency_gate")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the dispatcher.
///
/// Failures that cross the request boundary keep their classification, the HTTP status
/// (if any) and the number of attempts spent, so a failed batch stays diagnosable.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Remote error: HTTP {status} ({class}) after {attempts} attempt(s): {message}")]
    Remote {
        status: u16,
        class: ErrorClass,
        message: String,
        attempts: u32,
    },

    #[error("Network transport error ({class}) after {attempts} attempt(s): {source}")]
    Transport {
        class: ErrorClass,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Failed to decode response body (HTTP {status}): {message}")]
    Decode { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request cancelled")]
    Cancelled,
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Classification of a request failure, if this error came out of the retry loop.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Error::Remote { class, .. } | Error::Transport { class, .. } => Some(*class),
            _ => None,
        }
    }

    /// HTTP status that caused the failure, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } | Error::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Number of attempts spent before the error was raised.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::Remote { attempts, .. } | Error::Transport { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Whether the underlying condition is transient. A retryable error can still reach
    /// the caller once the attempt budget is spent.
    pub fn is_retryable(&self) -> bool {
        self.class().map(|c| c.is_retryable()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_context_is_rendered_in_display() {
        let err = Error::configuration_with_context(
            "API key is required",
            ErrorContext::new()
                .with_field_path("OPENROUTER_API_KEY")
                .with_source("client_builder"),
        );
        let msg = err.to_string();
        assert!(msg.contains("API key is required"));
        assert!(msg.contains("field: OPENROUTER_API_KEY"));
        assert!(msg.contains("source: client_builder"));
        assert_eq!(
            err.context().and_then(|c| c.source.as_deref()),
            Some("client_builder")
        );
    }

    #[test]
    fn test_empty_context_adds_nothing() {
        let err = Error::runtime_with_context("boom", ErrorContext::default());
        assert_eq!(err.to_string(), "Runtime error: boom");
    }

    #[test]
    fn test_remote_error_preserves_status_and_class() {
        let err = Error::Remote {
            status: 503,
            class: ErrorClass::TransientServer,
            message: "overloaded".to_string(),
            attempts: 3,
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.class(), Some(ErrorClass::TransientServer));
        assert_eq!(err.attempts(), Some(3));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("HTTP 503"));
        assert!(err.to_string().contains("transient_server"));
    }

    #[test]
    fn test_transport_error_keeps_source() {
        let err = Error::Transport {
            class: ErrorClass::Timeout,
            attempts: 3,
            source: TransportError::Timeout(Duration::from_secs(30)),
        };
        assert_eq!(err.status(), None);
        assert_eq!(err.class(), Some(ErrorClass::Timeout));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_terminal_client_error_is_not_retryable() {
        let err = Error::Remote {
            status: 401,
            class: ErrorClass::TerminalClient,
            message: String::new(),
            attempts: 1,
        };
        assert!(!err.is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }
}
