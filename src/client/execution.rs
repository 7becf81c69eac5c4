//! Request execution: one request, a bounded number of attempts.
//!
//! Per attempt the executor issues one network call, classifies the outcome and asks the
//! [`RetryPolicy`] whether to back off and try again. Only the final outcome leaves
//! this module; intermediate failures are visible through logs and [`CallStats`].

use crate::client::error_classification::{
    classify_status, classify_transport, is_json_content_type, ErrorClass,
};
use crate::client::policy::{Decision, RetryPolicy};
use crate::transport::{Transport, TransportError, TransportResponse};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success { status: u16 },
    /// The server answered below 400 with a JSON-typed body that could not be decoded.
    Malformed { status: u16 },
    /// Failed, and another attempt follows.
    Retryable(ErrorClass),
    /// Failed, and this ended the request.
    Terminal(ErrorClass),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 0-based attempt index.
    pub index: u32,
    pub outcome: AttemptOutcome,
    pub status: Option<u16>,
    pub duration: Duration,
    /// Wait that followed this attempt, if a retry was scheduled.
    pub backoff: Option<Duration>,
}

/// Per-request statistics.
#[derive(Debug, Clone)]
pub struct CallStats {
    /// Correlation id sent as `x-request-id` on every attempt of this request.
    pub request_id: String,
    pub attempts: Vec<AttemptRecord>,
    /// Status of the last attempt the server answered.
    pub http_status: Option<u16>,
    pub duration: Duration,
}

impl CallStats {
    pub fn retry_count(&self) -> u32 {
        self.attempts.len().saturating_sub(1) as u32
    }

    pub fn total_backoff(&self) -> Duration {
        self.attempts.iter().filter_map(|a| a.backoff).sum()
    }
}

enum Failure {
    Remote {
        status: u16,
        class: ErrorClass,
        message: String,
    },
    Transport {
        class: ErrorClass,
        source: TransportError,
    },
}

impl Failure {
    fn class(&self) -> ErrorClass {
        match self {
            Failure::Remote { class, .. } | Failure::Transport { class, .. } => *class,
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            Failure::Remote { status, .. } => Some(*status),
            Failure::Transport { .. } => None,
        }
    }

    fn into_error(self, attempts: u32) -> Error {
        match self {
            Failure::Remote {
                status,
                class,
                message,
            } => Error::Remote {
                status,
                class,
                message,
                attempts,
            },
            Failure::Transport { class, source } => Error::Transport {
                class,
                attempts,
                source,
            },
        }
    }
}

/// Executes one request with retry, backoff and failure classification.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_policy(transport, RetryPolicy::default())
    }

    pub fn with_policy(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request` and decode the successful body as `Resp`.
    ///
    /// `timeout` bounds each attempt independently. Fails with the classified error of the
    /// last attempt once the budget is spent, or immediately on a 4xx.
    pub async fn execute<Req, Resp>(&self, request: &Req, timeout: Duration) -> Result<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        self.run(request, timeout, None).await.0
    }

    /// Like [`execute`](Self::execute), also returning per-attempt statistics.
    pub async fn execute_with_stats<Req, Resp>(
        &self,
        request: &Req,
        timeout: Duration,
    ) -> Result<(Resp, CallStats)>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let (result, stats) = self.run(request, timeout, None).await;
        result.map(|resp| (resp, stats))
    }

    /// Like [`execute_with_stats`](Self::execute_with_stats), aborting with
    /// [`Error::Cancelled`] when `cancel` fires during a network call or a backoff.
    pub async fn execute_with_cancel<Req, Resp>(
        &self,
        request: &Req,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(Resp, CallStats)>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let (result, stats) = self.run(request, timeout, Some(cancel)).await;
        result.map(|resp| (resp, stats))
    }

    /// Statistics are returned whatever the outcome, including the record of the
    /// attempt that ended a failed request.
    pub async fn execute_recorded<Req, Resp>(
        &self,
        request: &Req,
        timeout: Duration,
    ) -> (Result<Resp>, CallStats)
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        self.run(request, timeout, None).await
    }

    async fn run<Req, Resp>(
        &self,
        request: &Req,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> (Result<Resp>, CallStats)
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();
        let mut attempts = Vec::with_capacity(self.policy.max_attempts as usize);

        let result = self
            .attempt_loop(request, timeout, cancel, &request_id, start, &mut attempts)
            .await;

        let stats = CallStats {
            http_status: attempts.iter().rev().find_map(|a| a.status),
            request_id,
            attempts,
            duration: start.elapsed(),
        };
        (result, stats)
    }

    async fn attempt_loop<Req, Resp>(
        &self,
        request: &Req,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
        request_id: &str,
        start: Instant,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_value(request)?;
        let mut attempt: u32 = 0;

        loop {
            let attempt_start = Instant::now();
            let result = cancellable(cancel, self.attempt_once(&body, timeout, request_id)).await?;

            let failure = match result {
                Ok(resp) => match classify_status(resp.status) {
                    None => {
                        let status = resp.status;
                        debug!(request_id, attempt, http_status = status, "attempt completed");
                        match serde_json::from_str::<Resp>(&resp.body) {
                            Ok(decoded) => {
                                attempts.push(AttemptRecord {
                                    index: attempt,
                                    outcome: AttemptOutcome::Success { status },
                                    status: Some(status),
                                    duration: attempt_start.elapsed(),
                                    backoff: None,
                                });
                                return Ok(decoded);
                            }
                            Err(e) if is_json_content_type(resp.content_type.as_deref()) => {
                                attempts.push(AttemptRecord {
                                    index: attempt,
                                    outcome: AttemptOutcome::Malformed { status },
                                    status: Some(status),
                                    duration: attempt_start.elapsed(),
                                    backoff: None,
                                });
                                info!(
                                    request_id,
                                    attempts = attempt + 1,
                                    http_status = status,
                                    "response body is not valid JSON"
                                );
                                return Err(Error::Decode {
                                    status,
                                    message: e.to_string(),
                                });
                            }
                            Err(_) => Failure::Remote {
                                status,
                                class: ErrorClass::UnexpectedContent,
                                message: format!(
                                    "expected a JSON body, got {}",
                                    resp.content_type.as_deref().unwrap_or("no content type")
                                ),
                            },
                        }
                    }
                    Some(class) => Failure::Remote {
                        status: resp.status,
                        class,
                        message: resp.body,
                    },
                },
                Err(source) => Failure::Transport {
                    class: classify_transport(&source),
                    source,
                },
            };

            let class = failure.class();
            match self.policy.decide(attempt, class) {
                Decision::Fail => {
                    attempts.push(AttemptRecord {
                        index: attempt,
                        outcome: AttemptOutcome::Terminal(class),
                        status: failure.status(),
                        duration: attempt_start.elapsed(),
                        backoff: None,
                    });
                    info!(
                        request_id,
                        attempts = attempt + 1,
                        error_class = class.as_str(),
                        http_status = failure.status(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "request failed"
                    );
                    return Err(failure.into_error(attempt + 1));
                }
                Decision::Retry { delay } => {
                    attempts.push(AttemptRecord {
                        index: attempt,
                        outcome: AttemptOutcome::Retryable(class),
                        status: failure.status(),
                        duration: attempt_start.elapsed(),
                        backoff: Some(delay),
                    });
                    warn!(
                        request_id,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error_class = class.as_str(),
                        http_status = failure.status(),
                        backoff_ms = delay.as_millis() as u64,
                        "attempt failed, retrying"
                    );
                    cancellable(cancel, tokio::time::sleep(delay)).await?;
                    attempt += 1;
                }
            }
        }
    }

    /// One network call, bounded by `timeout` even if the transport does not enforce it.
    async fn attempt_once(
        &self,
        body: &serde_json::Value,
        timeout: Duration,
        request_id: &str,
    ) -> std::result::Result<TransportResponse, TransportError> {
        match tokio::time::timeout(timeout, self.transport.post_json(body, timeout, request_id)).await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}

async fn cancellable<F: std::future::Future>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Result<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            out = fut => Ok(out),
        },
        None => Ok(fut.await),
    }
}
