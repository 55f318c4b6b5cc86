//! Bounded retry loop for embedding requests.
//!
//! Every attempt reports one of four outcomes. Rate limiting backs off
//! exponentially, transport failures wait a fixed delay, and hard errors
//! abort without retrying. No sleep follows the final attempt.

use std::thread;
use std::time::Duration;

/// Default attempt budget per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base of the rate-limit backoff: attempt `n` (0-based) waits `2^n * base`.
pub const DEFAULT_RATE_LIMIT_BASE: Duration = Duration::from_secs(2);

/// Fixed wait after a transport failure.
pub const DEFAULT_TRANSPORT_DELAY: Duration = Duration::from_secs(2);

/// Something that can block the current thread.
///
/// Production code sleeps for real; tests record the requested durations.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// The attempt produced a value.
    Done(T),
    /// The remote side asked us to slow down (HTTP 429).
    RateLimited,
    /// Transport-level failure, retried after a fixed delay.
    Transient(String),
    /// Hard failure, never retried.
    Abort(E),
}

/// Why a retried operation gave up.
#[derive(Debug, PartialEq)]
pub enum RetryError<E> {
    /// An attempt returned [`Attempt::Abort`].
    Aborted(E),
    /// Every attempt failed with a retryable outcome.
    Exhausted { attempts: u32, last_error: String },
}

/// Retry policy for the embedding client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub rate_limit_base: Duration,
    pub transport_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limit_base: DEFAULT_RATE_LIMIT_BASE,
            transport_delay: DEFAULT_TRANSPORT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_rate_limit_base(mut self, base: Duration) -> Self {
        self.rate_limit_base = base;
        self
    }

    pub fn with_transport_delay(mut self, delay: Duration) -> Self {
        self.transport_delay = delay;
        self
    }

    /// Backoff after a rate-limited attempt (0-based): 2s, 4s, 8s with defaults.
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.rate_limit_base.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, aborts, or the budget runs out.
    ///
    /// `operation` receives the 0-based attempt number.
    pub fn run<T, E, F>(&self, sleeper: &dyn Sleeper, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Attempt<T, E>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = String::from("no attempt made");

        for attempt in 0..max_attempts {
            let has_next = attempt + 1 < max_attempts;

            match operation(attempt) {
                Attempt::Done(value) => return Ok(value),
                Attempt::Abort(err) => return Err(RetryError::Aborted(err)),
                Attempt::RateLimited => {
                    last_error = "rate limited".to_string();
                    if has_next {
                        let wait = self.rate_limit_delay(attempt);
                        log::warn!("rate limited, waiting {}s before retry", wait.as_secs_f32());
                        sleeper.sleep(wait);
                    }
                }
                Attempt::Transient(err) => {
                    log::warn!("embedding attempt {} failed: {err}", attempt + 1);
                    last_error = err;
                    if has_next {
                        sleeper.sleep(self.transport_delay);
                    }
                }
            }
        }

        Err(RetryError::Exhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Duration>>);

    impl Sleeper for Recorder {
        fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    impl Recorder {
        fn slept(&self) -> Vec<Duration> {
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_rate_limit_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(0), Duration::from_secs(2));
        assert_eq!(policy.rate_limit_delay(1), Duration::from_secs(4));
        assert_eq!(policy.rate_limit_delay(2), Duration::from_secs(8));
    }

    #[test]
    fn test_rate_limit_delay_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.rate_limit_delay(64) >= policy.rate_limit_delay(31));
    }

    #[test]
    fn test_first_try_success_never_sleeps() {
        let sleeper = Recorder::default();
        let result: Result<&str, RetryError<()>> =
            RetryPolicy::default().run(&sleeper, |_| Attempt::Done("ok"));

        assert_eq!(result, Ok("ok"));
        assert!(sleeper.slept().is_empty());
    }

    #[test]
    fn test_abort_stops_immediately() {
        let sleeper = Recorder::default();
        let mut calls = 0;
        let result: Result<(), RetryError<u16>> = RetryPolicy::default().run(&sleeper, |_| {
            calls += 1;
            Attempt::Abort(500)
        });

        assert_eq!(result, Err(RetryError::Aborted(500)));
        assert_eq!(calls, 1);
        assert!(sleeper.slept().is_empty());
    }

    #[test]
    fn test_transient_uses_fixed_delay_and_exhausts() {
        let sleeper = Recorder::default();
        let result: Result<(), RetryError<()>> = RetryPolicy::default()
            .run(&sleeper, |attempt| Attempt::Transient(format!("boom {attempt}")));

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last_error: "boom 2".to_string()
            })
        );
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(2); 2]);
    }

    #[test]
    fn test_rate_limited_then_success() {
        let sleeper = Recorder::default();
        let result: Result<u32, RetryError<()>> = RetryPolicy::default().run(&sleeper, |attempt| {
            if attempt < 2 {
                Attempt::RateLimited
            } else {
                Attempt::Done(attempt)
            }
        });

        assert_eq!(result, Ok(2));
        assert_eq!(
            sleeper.slept(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_zero_attempt_budget_still_tries_once() {
        let sleeper = Recorder::default();
        let mut calls = 0;
        let _: Result<(), RetryError<()>> =
            RetryPolicy::default().with_max_attempts(0).run(&sleeper, |_| {
                calls += 1;
                Attempt::RateLimited
            });
        assert_eq!(calls, 1);
    }
}
