//! Concurrency gate.

use crate::client::signals::InflightSnapshot;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Counting gate bounding how many requests may be in flight at once.
///
/// Backed by a tokio semaphore, which hands out permits in FIFO order, so a waiting
/// task is never starved. A task holds its permit across all of its retries.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max: usize,
}

/// Slot held by one task. Dropping it releases the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    pub fn new(max: usize) -> Result<Self> {
        if max == 0 {
            return Err(Error::validation_with_context(
                "concurrency must be at least 1",
                ErrorContext::new()
                    .with_field_path("concurrency")
                    .with_details("got 0")
                    .with_source("concurrency_gate"),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        })
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<GatePermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| {
                Error::runtime_with_context(
                    "Concurrency gate closed",
                    ErrorContext::new().with_source("concurrency_gate"),
                )
            })?;
        Ok(GatePermit { _permit: permit })
    }

    /// Wait for a free slot, giving up with [`Error::Cancelled`] if `cancel` fires first.
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> Result<GatePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            permit = self.acquire() => permit,
        }
    }

    pub fn snapshot(&self) -> InflightSnapshot {
        let available = self.semaphore.available_permits();
        InflightSnapshot {
            max: self.max,
            available,
            in_use: self.max.saturating_sub(available),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let err = ConcurrencyGate::new(0).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_permits_are_released_on_drop() {
        let gate = ConcurrencyGate::new(2).unwrap();
        let a = gate.acquire().await.unwrap();
        let b = gate.acquire().await.unwrap();
        assert_eq!(
            gate.snapshot(),
            InflightSnapshot {
                max: 2,
                available: 0,
                in_use: 2
            }
        );
        drop(a);
        assert_eq!(gate.snapshot().in_use, 1);
        drop(b);
        assert_eq!(gate.snapshot().available, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_blocks_until_slot_frees() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancel_wins_over_blocked_acquire() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let _held = gate.acquire().await.unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = gate.acquire_or_cancel(&token).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
