//! Retry and pacing policy shared by every request the pipeline makes.
//!
//! The governor never performs I/O itself. Callers report the outcome of an
//! attempt and receive a [`Decision`]; waiting is left to the caller so that
//! cancellation can interrupt it.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::backoff::exponential_jitter_backoff;
use crate::error::TransportFailure;
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    WaitThen(Duration),
    Abort,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Fixed wait after a rate-limit response.
    pub cooldown: Duration,
    /// Minimum gap between page requests across all streams.
    pub request_spacing: Duration,
    /// Attempts allowed for server and network failures before giving up.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub jitter_frac: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            request_spacing: Duration::from_millis(500),
            max_retries: 5,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(60),
            jitter_frac: 0.2,
        }
    }
}

pub struct Governor {
    policy: RetryPolicy,
    next_slot: Mutex<Option<Instant>>,
}

impl Governor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            next_slot: Mutex::new(None),
        }
    }

    /// `failure` is `None` when the attempt succeeded. `attempt` counts the
    /// server and network failures of the current logical request, from 1.
    /// Rate limits ignore it.
    pub fn decide(&self, failure: Option<&TransportFailure>, attempt: u32) -> Decision {
        let Some(failure) = failure else {
            return Decision::Proceed;
        };

        let decision = match failure {
            TransportFailure::RateLimited { retry_after, .. } => {
                let wait = retry_after
                    .map(|advice| advice.max(self.policy.cooldown))
                    .unwrap_or(self.policy.cooldown);
                Decision::WaitThen(wait)
            }
            TransportFailure::ServerError { .. } | TransportFailure::NetworkError { .. } => {
                if attempt >= self.policy.max_retries {
                    Decision::Abort
                } else {
                    Decision::WaitThen(exponential_jitter_backoff(
                        self.policy.backoff_base,
                        attempt.saturating_sub(1),
                        self.policy.backoff_max,
                        self.policy.jitter_frac,
                    ))
                }
            }
            TransportFailure::ClientError { .. } => Decision::Abort,
        };

        match decision {
            Decision::WaitThen(wait) => {
                metrics::RETRIES_TOTAL
                    .with_label_values(&[failure.class()])
                    .inc();
                metrics::SLEEP_SECONDS
                    .with_label_values(&[failure.class()])
                    .inc_by(wait.as_secs_f64());
            }
            Decision::Abort => {
                metrics::ABORTS_TOTAL
                    .with_label_values(&[failure.class()])
                    .inc();
            }
            Decision::Proceed => {}
        }
        decision
    }

    /// Reserves the next courtesy slot and sleeps until it arrives. The lock is
    /// only held while the slot is computed.
    pub async fn pace(&self) {
        let slot = {
            let mut guard = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *guard {
                Some(next) if next > now => next,
                _ => now,
            };
            *guard = Some(slot + self.policy.request_spacing);
            slot
        };
        sleep_until(slot).await;
    }
}
