//! Explicit time budgets for provider calls.
//!
//! Network calls to embedding and generation backends carry a [`Deadline`]
//! rather than relying on transport defaults.  One deadline covers a whole
//! logical operation: every sequential step spends from the same budget.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{MnemosError, Result};

/// Point in time after which a pending provider call is abandoned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline: calls may run for as long as the transport allows.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(budget: Duration) -> Self {
        Self(Some(Instant::now() + budget))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// Time left before expiry, saturating at zero.  `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Run `fut` under this deadline.
    ///
    /// `what` names the awaited call in the resulting
    /// [`MnemosError::DeadlineExceeded`].
    pub async fn bound<T, F>(self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.0 {
            None => fut.await,
            Some(at) => match tokio::time::timeout_at(at, fut).await {
                Ok(result) => result,
                Err(_) => Err(MnemosError::DeadlineExceeded(what.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_deadline_never_expires() {
        let d = Deadline::none();
        assert!(d.remaining().is_none());
        assert!(!d.is_expired());
    }

    #[tokio::test]
    async fn bound_passes_result_through() {
        let out = Deadline::after(Duration::from_secs(5))
            .bound("fast call", async { Ok(41 + 1) })
            .await
            .unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn bound_times_out_slow_future() {
        let err = Deadline::after(Duration::from_millis(10))
            .bound("slow call", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err, MnemosError::DeadlineExceeded("slow call".into()));
    }

    #[tokio::test]
    async fn expired_deadline_reports_zero_remaining() {
        let d = Deadline::at(Instant::now());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(d.is_expired());
    }
}
