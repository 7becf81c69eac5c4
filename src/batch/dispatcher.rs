//! Batch dispatcher.

use super::gate::ConcurrencyGate;
use crate::client::execution::{CallStats, RequestExecutor};
use crate::{Error, ErrorContext, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Responses of a fully successful batch, in input order, with per-request statistics.
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    pub responses: Vec<T>,
    pub stats: Vec<CallStats>,
    pub execution_time: Duration,
}

impl<T> BatchReport<T> {
    fn empty() -> Self {
        Self {
            responses: Vec::new(),
            stats: Vec::new(),
            execution_time: Duration::ZERO,
        }
    }

    pub fn total_retries(&self) -> u32 {
        self.stats.iter().map(|s| s.retry_count()).sum()
    }
}

/// Runs a batch of independent requests under a concurrency gate.
///
/// Every request gets its own logical task. A task takes one gate slot before its first
/// attempt and keeps it through all retries. The batch either yields every response in
/// input order or fails with the first terminal error, after all other tasks have finished.
#[derive(Clone)]
pub struct Dispatcher {
    executor: RequestExecutor,
}

impl Dispatcher {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Send all `requests` with at most `concurrency` in flight; `timeout` bounds each attempt.
    pub async fn run<Req, Resp>(
        &self,
        requests: &[Req],
        concurrency: usize,
        timeout: Duration,
    ) -> Result<Vec<Resp>>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        self.dispatch(requests, concurrency, timeout, None)
            .await
            .map(|report| report.responses)
    }

    /// Like [`run`](Self::run), with statistics for every request.
    pub async fn run_with_report<Req, Resp>(
        &self,
        requests: &[Req],
        concurrency: usize,
        timeout: Duration,
    ) -> Result<BatchReport<Resp>>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        self.dispatch(requests, concurrency, timeout, None).await
    }

    /// Like [`run`](Self::run). Tasks still waiting on the gate, in a network call or in a
    /// backoff when `cancel` fires end with [`Error::Cancelled`].
    pub async fn run_with_cancel<Req, Resp>(
        &self,
        requests: &[Req],
        concurrency: usize,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<BatchReport<Resp>>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        self.dispatch(requests, concurrency, timeout, Some(cancel))
            .await
    }

    async fn dispatch<Req, Resp>(
        &self,
        requests: &[Req],
        concurrency: usize,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchReport<Resp>>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        if timeout.is_zero() {
            return Err(Error::validation_with_context(
                "timeout must be positive",
                ErrorContext::new()
                    .with_field_path("timeout")
                    .with_source("dispatcher"),
            ));
        }
        let gate = ConcurrencyGate::new(concurrency)?;

        let n = requests.len();
        if n == 0 {
            return Ok(BatchReport::empty());
        }

        let start = Instant::now();
        debug!(total = n, concurrency, timeout_ms = timeout.as_millis() as u64, "dispatching batch");

        let gate = &gate;
        let mut pending: FuturesUnordered<_> = requests
            .iter()
            .enumerate()
            .map(|(idx, req)| async move {
                (idx, self.dispatch_one(gate, req, timeout, cancel).await)
            })
            .collect();

        let mut slots: Vec<Option<(Resp, CallStats)>> = (0..n).map(|_| None).collect();
        let mut first_error: Option<(usize, Error)> = None;
        let mut failed = 0usize;

        // Drain everything, even after a failure, so no task outlives the call.
        while let Some((idx, result)) = pending.next().await {
            match result {
                Ok(done) => slots[idx] = Some(done),
                Err(e) => {
                    failed += 1;
                    if first_error.is_none() {
                        warn!(index = idx, error = %e, "request failed, draining remaining requests");
                        first_error = Some((idx, e));
                    } else {
                        debug!(index = idx, error = %e, "additional request failure");
                    }
                }
            }
        }

        if let Some((idx, err)) = first_error {
            info!(
                total = n,
                failed,
                first_failed_index = idx,
                duration_ms = start.elapsed().as_millis() as u64,
                "batch failed"
            );
            return Err(err);
        }

        let (responses, stats): (Vec<Resp>, Vec<CallStats>) = slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    Error::runtime_with_context(
                        "batch result missing",
                        ErrorContext::new().with_source("dispatcher"),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();

        let execution_time = start.elapsed();
        info!(
            total = n,
            retries = stats.iter().map(|s| s.retry_count()).sum::<u32>(),
            duration_ms = execution_time.as_millis() as u64,
            "batch completed"
        );

        Ok(BatchReport {
            responses,
            stats,
            execution_time,
        })
    }

    async fn dispatch_one<Req, Resp>(
        &self,
        gate: &ConcurrencyGate,
        request: &Req,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<(Resp, CallStats)>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        // Held until this function returns, whatever the outcome.
        let _permit = match cancel {
            Some(token) => gate.acquire_or_cancel(token).await?,
            None => gate.acquire().await?,
        };
        match cancel {
            Some(token) => {
                self.executor
                    .execute_with_cancel(request, timeout, token)
                    .await
            }
            None => self.executor.execute_with_stats(request, timeout).await,
        }
    }
}
