//! Lock-aware retry for mutating API calls
//!
//! Attach and detach calls fail with `ResourceLocked` while a previous
//! asynchronous operation still holds the parent or the association.
//! `retry_on_lock` absorbs that condition, everything else passes through.

use crate::api::LinkApi;
use crate::association::LockTarget;
use crate::error::{LinkError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Retry schedule for locked resources
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Maximum number of invocations of the wrapped operation
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound for a single delay
    pub max_delay: Duration,

    pub backoff_multiplier: f64,

    /// Interval between lock-status polls once the delay has elapsed
    pub poll_interval: Duration,

    /// Cap on the total time spent waiting for one operation
    pub max_total_wait: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            poll_interval: Duration::from_secs(2),
            max_total_wait: Duration::from_secs(10 * 60),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        if secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

/// Run `op`, retrying while it fails with `ResourceLocked`.
///
/// Between attempts the schedule delay elapses, then `target` is polled
/// until it reports unlocked. Non-lock errors return immediately and
/// unmodified. Running out of attempts or of `max_total_wait` yields
/// `LockTimeoutExceeded` carrying the last lock error.
pub async fn retry_on_lock<A, F, Fut, T>(
    api: &A,
    target: &LockTarget,
    backoff: &Backoff,
    mut op: F,
) -> Result<T>
where
    A: LinkApi + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 1;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_lock() => return Err(err),
            Err(err) => err,
        };

        if attempt >= backoff.max_attempts {
            return Err(lock_timeout(target, attempt, err));
        }

        let delay = backoff.delay_for(attempt);
        if started.elapsed() + delay > backoff.max_total_wait {
            return Err(lock_timeout(target, attempt, err));
        }

        tracing::warn!(
            %target,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Resource locked, retrying"
        );
        sleep(delay).await;

        while api.is_locked(target).await? {
            if started.elapsed() + backoff.poll_interval > backoff.max_total_wait {
                return Err(lock_timeout(target, attempt, err));
            }
            sleep(backoff.poll_interval).await;
        }

        attempt += 1;
    }
}

/// Block until `target` reports unlocked, bounded by `max_total_wait`
pub async fn wait_unlocked<A>(api: &A, target: &LockTarget, backoff: &Backoff) -> Result<()>
where
    A: LinkApi + ?Sized,
{
    let started = Instant::now();
    let mut polls: u32 = 0;

    while api.is_locked(target).await? {
        polls += 1;
        if started.elapsed() + backoff.poll_interval > backoff.max_total_wait {
            return Err(lock_timeout(
                target,
                polls,
                LinkError::ResourceLocked(target.to_string()),
            ));
        }
        sleep(backoff.poll_interval).await;
    }

    if polls > 0 {
        tracing::debug!(%target, polls, "Lock released");
    }
    Ok(())
}

fn lock_timeout(target: &LockTarget, attempts: u32, last: LinkError) -> LinkError {
    LinkError::LockTimeoutExceeded {
        resource: target.to_string(),
        attempts,
        source: Box::new(last),
    }
}
