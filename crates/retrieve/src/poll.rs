use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

/// What one readiness check observed.
#[derive(Debug)]
pub enum PollOutcome<T> {
    Ready(T),
    /// Not ready yet; carries the observed state for logging.
    Pending(String),
    /// Terminal state that will never become ready.
    Failed(String),
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("timed out waiting for {resource} after {attempts} attempts ({elapsed:?})")]
    Timeout {
        resource: String,
        attempts: usize,
        elapsed: Duration,
    },

    #[error("{resource} failed: {reason}")]
    Failed { resource: String, reason: String },
}

/// `step * attempts`, saturating at `Duration::MAX`.
fn span(step: Duration, attempts: usize) -> Duration {
    let attempts = u32::try_from(attempts.max(1)).unwrap_or(u32::MAX);
    step.saturating_mul(attempts)
}

/// Bounded-retry poller for externally provisioned resources.
pub struct Poller {
    max_attempts: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
    deadline: Duration,
}

impl Poller {
    pub fn new(max_attempts: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        let max_backoff = Duration::from_millis(max_backoff_ms);
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff,
            deadline: span(max_backoff, max_attempts),
        }
    }

    /// Same interval between every attempt.
    pub fn fixed(interval: Duration, max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: interval,
            max_backoff: interval,
            deadline: span(interval, max_attempts),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run `check` until it reports ready, with exponential backoff between
    /// attempts. Gives up after `max_attempts` checks or once the next sleep
    /// would cross the deadline.
    pub async fn wait_until<F, Fut, T>(&self, resource: &str, mut check: F) -> Result<T, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PollOutcome<T>>,
    {
        let started = Instant::now();
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match check().await {
                PollOutcome::Ready(value) => {
                    info!(resource, attempts = attempt, "Resource is ready");
                    return Ok(value);
                }
                PollOutcome::Failed(reason) => {
                    warn!(resource, attempts = attempt, reason = %reason, "Resource reached a failed state");
                    return Err(PollError::Failed {
                        resource: resource.to_string(),
                        reason,
                    });
                }
                PollOutcome::Pending(state) => {
                    if attempt >= self.max_attempts || started.elapsed().saturating_add(backoff) > self.deadline {
                        warn!(resource, attempts = attempt, state = %state, "Gave up waiting for resource");
                        return Err(PollError::Timeout {
                            resource: resource.to_string(),
                            attempts: attempt,
                            elapsed: started.elapsed(),
                        });
                    }

                    info!(
                        resource,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        state = %state,
                        backoff_ms = backoff.as_millis(),
                        "Resource not ready, polling again"
                    );

                    sleep(backoff).await;

                    backoff = std::cmp::min(backoff.saturating_mul(2), self.max_backoff);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_ready_after_pending_attempts() {
        let calls = Cell::new(0);
        let poller = Poller::new(5, 1, 4).with_deadline(Duration::from_secs(5));

        let value = poller
            .wait_until("kb", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        PollOutcome::Pending("creating".to_string())
                    } else {
                        PollOutcome::Ready(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let poller = Poller::fixed(Duration::from_millis(1), 4).with_deadline(Duration::from_secs(5));

        let err = poller
            .wait_until("ingestion job", || {
                calls.set(calls.get() + 1);
                async { PollOutcome::<()>::Pending("in_progress".to_string()) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Timeout { attempts: 4, .. }));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn test_failed_state_stops_immediately() {
        let calls = Cell::new(0);
        let poller = Poller::fixed(Duration::from_millis(1), 10);

        let err = poller
            .wait_until("kb", || {
                calls.set(calls.get() + 1);
                async { PollOutcome::<()>::Failed("FAILED".to_string()) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Failed { ref reason, .. } if reason == "FAILED"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_default_deadline_saturates() {
        assert_eq!(Poller::new(30, 1000, 10_000).deadline, Duration::from_secs(300));
        assert_eq!(Poller::new(usize::MAX, 1, u64::MAX).deadline, Duration::MAX);
        assert_eq!(Poller::fixed(Duration::MAX, 2).deadline, Duration::MAX);
        // attempts past u32::MAX must not wrap to a tiny multiplier
        #[cfg(target_pointer_width = "64")]
        {
            let wide = Poller::new((1usize << 32) + 1, 1, 1);
            assert_eq!(wide.deadline, Duration::from_millis(u64::from(u32::MAX)));
        }
    }

    #[tokio::test]
    async fn test_deadline_cuts_polling_short() {
        let poller = Poller::fixed(Duration::from_millis(50), 100).with_deadline(Duration::from_millis(20));

        let err = poller
            .wait_until("kb", || async { PollOutcome::<()>::Pending("creating".to_string()) })
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Timeout { attempts: 1, .. }));
    }
}
