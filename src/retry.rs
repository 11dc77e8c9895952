//! Retry policies for the blocking `lock` operations.
//!
//! Every blocking acquire in this crate is a loop of "try, sleep, try again".
//! [`RetryPolicy`] decides how long each sleep lasts and when to give up, and a
//! [`CancelToken`] lets another thread stop a waiting caller early.

use crate::error::{LockError, Result};
use rand::Rng;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Sleep after the first failed attempt
    pub initial_interval: Duration,
    /// Growth factor applied to the sleep after each failed attempt (1.0 = fixed)
    pub multiplier: f64,
    /// Upper bound for a single sleep
    pub max_interval: Option<Duration>,
    /// Total number of attempts, including the first one
    pub max_attempts: Option<u32>,
    /// Overall deadline measured from the first attempt
    pub timeout: Option<Duration>,
    /// Random extra added to each sleep, drawn from `[0, jitter)`
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Fixed-interval policy that retries forever.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 1.0,
            max_interval: None,
            max_attempts: None,
            timeout: None,
            jitter: Duration::ZERO,
        }
    }

    /// Port binding: start at one second, grow by 1.2 per failure, never stop.
    pub fn port() -> Self {
        Self::new(Duration::from_secs(1)).with_multiplier(1.2)
    }

    /// Marker directories: a short fixed sleep, never stop.
    pub fn directory() -> Self {
        Self::new(Duration::from_millis(10))
    }

    /// Polling an advisory lock: 10ms growing by 1.5, capped at one second.
    pub fn polling() -> Self {
        Self::new(Duration::from_millis(10))
            .with_multiplier(1.5)
            .with_max_interval(Duration::from_millis(1000))
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        // Shrinking or NaN factors would spin; clamp to a fixed interval instead
        self.multiplier = if multiplier.is_finite() && multiplier >= 1.0 {
            multiplier
        } else {
            1.0
        };
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sleep durations between consecutive attempts, without jitter.
    pub fn backoff(&self) -> Backoff {
        let first = match self.max_interval {
            Some(max) => self.initial_interval.min(max),
            None => self.initial_interval,
        };
        Backoff {
            next: first,
            multiplier: self.multiplier,
            max_interval: self.max_interval,
            remaining: self.max_attempts.map(|n| n.saturating_sub(1)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::polling()
    }
}

/// Iterator over the sleeps of a [`RetryPolicy`].
///
/// Yields one duration per gap between attempts, so a policy limited to `n`
/// attempts yields `n - 1` sleeps. Unlimited policies never end.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
    remaining: Option<u32>,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        let current = self.next;
        let grown = Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .unwrap_or(Duration::MAX);
        self.next = match self.max_interval {
            Some(max) => grown.min(max),
            None => grown,
        };
        Some(current)
    }
}

/// Cancellation signal shared between a waiting caller and whoever wants to stop it.
///
/// Cancelling wakes a retry loop that is currently sleeping instead of waiting
/// for its interval to run out.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, wakeup) = &*self.inner;
        *lock_flag(flag) = true;
        wakeup.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *lock_flag(&self.inner.0)
    }

    /// Sleep for up to `duration`. Returns true if the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, wakeup) = &*self.inner;
        let guard = lock_flag(flag);
        let (guard, _) = wakeup
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

fn lock_flag(flag: &Mutex<bool>) -> MutexGuard<'_, bool> {
    // A bool cannot be left half-written, so a poisoned flag is still valid
    flag.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `attempt` until it yields a value, sleeping between failures per `policy`.
///
/// `attempt` returns `Ok(Some(_))` once acquired, `Ok(None)` to retry, and
/// `Err(_)` to abort with that error. With a timeout, the last sleep is cut
/// short so one final attempt runs at the deadline before `Timeout` is returned.
pub(crate) fn retry<T, F>(
    target: &str,
    policy: &RetryPolicy,
    cancel: Option<&CancelToken>,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Result<Option<T>>,
{
    let start = Instant::now();
    let deadline = policy.timeout.and_then(|timeout| start.checked_add(timeout));
    let mut backoff = policy.backoff();
    let mut rng = rand::thread_rng();
    let mut attempts: u32 = 0;

    loop {
        if cancel.map_or(false, CancelToken::is_cancelled) {
            return Err(LockError::Cancelled(target.to_string()));
        }

        attempts = attempts.saturating_add(1);
        if let Some(acquired) = attempt()? {
            debug!("Lock acquired: {} (attempt {})", target, attempts);
            return Ok(acquired);
        }

        let Some(interval) = backoff.next() else {
            return Err(LockError::RetriesExhausted {
                target: target.to_string(),
                attempts,
            });
        };

        let mut sleep_time = interval.saturating_add(jitter(&mut rng, policy.jitter));
        if let (Some(deadline), Some(timeout)) = (deadline, policy.timeout) {
            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Timeout {
                    target: target.to_string(),
                    duration: timeout,
                });
            }
            // One last attempt lands on the deadline itself
            sleep_time = sleep_time.min(deadline - now);
        }

        debug!(
            "Lock busy: {} (attempt {}), retrying in {:?}",
            target, attempts, sleep_time
        );

        match cancel {
            Some(token) => {
                if token.sleep(sleep_time) {
                    return Err(LockError::Cancelled(target.to_string()));
                }
            }
            None => thread::sleep(sleep_time),
        }
    }
}

fn jitter(rng: &mut impl Rng, max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
    Duration::from_nanos(rng.gen_range(0..nanos))
}
