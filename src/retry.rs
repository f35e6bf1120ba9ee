//! Retry classification and backoff for calls to external services
//!
//! An operation reports each attempt as an [`Attempt`]; a [`BackoffPolicy`]
//! decides whether and when to try again. Page fetches never go through here:
//! only the LLM and search layers retry.

use std::future::Future;
use std::time::Duration;

/// Outcome of a single attempt
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// The call succeeded
    Ok(T),
    /// The call failed in a way another attempt may fix (reset, timeout)
    Retryable(E),
    /// The call failed for good (4xx rejection, malformed reply)
    Fatal(E),
}

impl<T, E> Attempt<T, E> {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Collapses the attempt into a plain result
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Retryable(err) | Self::Fatal(err) => Err(err),
        }
    }
}

/// Exponential backoff between retries
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Whether another retry is allowed after `retries_done` retries
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(retry as i32 - 1);
        let millis = (self.base_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails fatally, or retries run out
    ///
    /// `op` receives the zero-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            let outcome = op(attempt).await;
            if !outcome.is_retryable() || !self.should_retry(attempt) {
                return outcome.into_result();
            }

            attempt += 1;
            let delay = self.delay_for(attempt);
            if let Attempt::Retryable(err) = &outcome {
                tracing::debug!("Retry {} in {:?} after: {}", attempt, delay, err);
            }
            tokio::time::sleep(delay).await;
        }
    }
}
