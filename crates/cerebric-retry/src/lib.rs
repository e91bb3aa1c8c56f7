//! C3 — Retry Engine: wraps any async callable with jittered exponential
//! backoff and per-attempt callbacks.
//!
//! Delay schedule (full jitter, chosen explicitly to avoid synchronized
//! retry storms across many concurrent jobs): for the k-th retry (1-indexed),
//! nominal delay = min(base_delay * backoff_factor^(k-1), max_delay); when
//! `jitter` is enabled the actual delay is drawn uniformly from [0, nominal].

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Configuration for the retry engine. `retriable` decides whether an error
/// is eligible for another attempt; non-matching errors propagate
/// immediately without retry.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn critical() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs_f64(2.0),
            max_delay: Duration::from_secs_f64(60.0),
            backoff_factor: 2.0,
            jitter: true,
        }
    }

    pub fn standard() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs_f64(0.5),
            max_delay: Duration::from_secs_f64(30.0),
            backoff_factor: 2.0,
            jitter: true,
        }
    }

    pub fn fast() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs_f64(0.1),
            max_delay: Duration::from_secs_f64(5.0),
            backoff_factor: 1.5,
            jitter: true,
        }
    }

    /// Nominal delay for the k-th retry (1-indexed), before jitter.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exp = self.backoff_factor.powi((attempt.saturating_sub(1)) as i32);
        let nominal = self.base_delay.as_secs_f64() * exp;
        Duration::from_secs_f64(nominal.min(self.max_delay.as_secs_f64()))
    }

    /// Actual delay to sleep for the k-th retry: full jitter draws uniformly
    /// from [0, nominal_delay] when jitter is enabled.
    pub fn actual_delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if self.jitter {
            let secs = rand::thread_rng().gen_range(0.0..=nominal.as_secs_f64().max(0.0));
            Duration::from_secs_f64(secs)
        } else {
            nominal
        }
    }
}

/// Observer invoked before each retry sleep. Observer errors/panics are
/// caught by the caller contract: implementations must not propagate; the
/// retry loop never lets an observer break retrying.
pub trait RetryObserver<E> {
    fn on_retry(&mut self, attempt: u32, error: &E, delay: Duration);
}

impl<E, F: FnMut(u32, &E, Duration)> RetryObserver<E> for F {
    fn on_retry(&mut self, attempt: u32, error: &E, delay: Duration) {
        self(attempt, error, delay)
    }
}

/// Runs `f` under `policy`, retrying while `retriable(&error)` is true.
/// Re-raises the last error unchanged once attempts are exhausted.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut retriable: impl FnMut(&E) -> bool,
    mut on_retry: impl RetryObserver<E>,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !retriable(&error) {
                    return Err(error);
                }
                attempt += 1;
                if attempt >= policy.max_attempts {
                    tracing::error!(attempt, "retry attempts exhausted");
                    return Err(error);
                }
                let delay = policy.actual_delay(attempt);
                tracing::warn!(attempt, max = policy.max_attempts, ?delay, "retrying after error");
                on_retry.on_retry(attempt, &error, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
