//! Error classification logic

use crate::transport::TransportError;
use serde::Serialize;
use std::fmt;

/// Classification of a failed attempt.
///
/// - `TerminalClient`: HTTP 4xx, never retried
/// - `TransientServer`: HTTP 5xx, retried within the attempt budget
/// - `TransientNetwork`: connection-level failure, retried
/// - `Timeout`: the attempt exceeded its duration, retried
/// - `UnexpectedContent`: answered below 400 with a body that is neither JSON nor
///   JSON-typed (an HTML page from a gateway, say), retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    TerminalClient,
    TransientServer,
    TransientNetwork,
    Timeout,
    UnexpectedContent,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorClass::TerminalClient)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::TerminalClient => "terminal_client",
            ErrorClass::TransientServer => "transient_server",
            ErrorClass::TransientNetwork => "transient_network",
            ErrorClass::Timeout => "timeout",
            ErrorClass::UnexpectedContent => "unexpected_content",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an HTTP status. Returns `None` for statuses below 400 (success).
pub fn classify_status(status: u16) -> Option<ErrorClass> {
    match status {
        0..=399 => None,
        400..=499 => Some(ErrorClass::TerminalClient),
        _ => Some(ErrorClass::TransientServer),
    }
}

/// Whether a `Content-Type` value declares JSON (`application/json` or `*/*+json`).
///
/// A missing header is not JSON.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(raw) = content_type else {
        return false;
    };
    let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Classify a failure that happened before a status line was received.
pub fn classify_transport(error: &TransportError) -> ErrorClass {
    match error {
        TransportError::Timeout(_) => ErrorClass::Timeout,
        TransportError::Connect(_) | TransportError::Http(_) | TransportError::Other(_) => {
            ErrorClass::TransientNetwork
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_success_statuses_are_unclassified() {
        for status in [100, 200, 201, 204, 301, 304, 399] {
            assert_eq!(classify_status(status), None, "status {}", status);
        }
    }

    #[test]
    fn test_client_statuses_are_terminal() {
        for status in [400, 401, 403, 404, 409, 422, 429, 499] {
            assert_eq!(
                classify_status(status),
                Some(ErrorClass::TerminalClient),
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_server_statuses_are_transient() {
        for status in [500, 502, 503, 504, 599] {
            assert_eq!(
                classify_status(status),
                Some(ErrorClass::TransientServer),
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_transport_failures() {
        assert_eq!(
            classify_transport(&TransportError::Timeout(Duration::from_secs(1))),
            ErrorClass::Timeout
        );
        assert_eq!(
            classify_transport(&TransportError::Connect("refused".to_string())),
            ErrorClass::TransientNetwork
        );
        assert_eq!(
            classify_transport(&TransportError::Other("reset".to_string())),
            ErrorClass::TransientNetwork
        );
    }

    #[test]
    fn test_only_client_class_is_terminal() {
        assert!(!ErrorClass::TerminalClient.is_retryable());
        assert!(ErrorClass::TransientServer.is_retryable());
        assert!(ErrorClass::TransientNetwork.is_retryable());
        assert!(ErrorClass::Timeout.is_retryable());
        assert!(ErrorClass::UnexpectedContent.is_retryable());
    }

    #[test]
    fn test_json_content_types() {
        assert!(is_json_content_type(Some("application/json")));
        assert!(is_json_content_type(Some("Application/JSON; charset=utf-8")));
        assert!(is_json_content_type(Some("application/problem+json")));
        assert!(!is_json_content_type(Some("text/html; charset=utf-8")));
        assert!(!is_json_content_type(Some("text/plain")));
        assert!(!is_json_content_type(None));
    }
}
