//! Retry logic with exponential backoff for transient errors.
//!
//! 429, 5xx and network failures are always retried. Requests the server
//! rejected as invalid are never retried. Everything else is retried only
//! when the caller's predicate asks for it. The caller's budget (deadline
//! and cancellation) bounds the whole loop, sleeps included.

use crate::error::{Error, ErrorCategory, Result};
use crate::types::RetryConfig;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of cancellation checks while waiting between attempts
const SLEEP_SLICE: Duration = Duration::from_millis(25);

static NEVER_CANCELLED: fn() -> bool = || false;

/// Deadline and cancellation supplied by the caller
pub struct RetryBudget<'a> {
    pub deadline: Option<Instant>,
    pub cancelled: &'a dyn Fn() -> bool,
}

impl RetryBudget<'_> {
    /// A budget with no deadline that is never cancelled
    pub fn unbounded() -> RetryBudget<'static> {
        RetryBudget {
            deadline: None,
            cancelled: &NEVER_CANCELLED,
        }
    }

    fn is_exhausted(&self) -> bool {
        (self.cancelled)() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Sleep for `delay`, waking early when cancelled. Returns false if cancelled.
    fn sleep(&self, delay: Duration) -> bool {
        let until = Instant::now() + delay;
        loop {
            if (self.cancelled)() {
                return false;
            }
            let now = Instant::now();
            if now >= until {
                return true;
            }
            thread::sleep(SLEEP_SLICE.min(until - now));
        }
    }
}

/// Whether an error should be retried given the caller's predicate
pub fn should_retry(error: &Error, predicate: &dyn Fn(&Error) -> bool) -> bool {
    let category = error.category();
    if category.is_retryable() {
        return true;
    }
    match category {
        ErrorCategory::Validation | ErrorCategory::Cancelled => false,
        _ => predicate(error),
    }
}

/// Execute an operation with retry logic.
///
/// Returns the result of the operation, or the last error if all attempts
/// failed. Returns [`Error::Cancelled`] as soon as the budget is exhausted
/// before an attempt.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    budget: &RetryBudget<'_>,
    predicate: &dyn Fn(&Error) -> bool,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut last_error: Option<Error> = None;

    for attempt in 0..config.max_attempts.max(1) {
        if budget.is_exhausted() {
            log::debug!("Retry budget exhausted before attempt {}", attempt + 1);
            return Err(Error::Cancelled);
        }

        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !should_retry(&e, predicate) {
                    return Err(e);
                }

                // If this was the last attempt, return the error
                if attempt + 1 >= config.max_attempts {
                    last_error = Some(e);
                    break;
                }

                let delay = config.delay_for_attempt(attempt);
                if budget
                    .deadline
                    .is_some_and(|d| Instant::now() + delay >= d)
                {
                    log::debug!("Not retrying: next attempt would pass the deadline");
                    return Err(e);
                }

                log::info!(
                    "Attempt {}/{} failed: {}. Retrying in {}ms...",
                    attempt + 1,
                    config.max_attempts,
                    e,
                    delay.as_millis()
                );

                if !budget.sleep(delay) {
                    return Err(Error::Cancelled);
                }

                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Other("retry exhausted".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    fn never(_: &Error) -> bool {
        false
    }

    #[test]
    fn test_should_retry_follows_category() {
        let always = |_: &Error| true;
        for error in [
            Error::api(429, "GET", "/x", b""),
            Error::api(503, "GET", "/x", b""),
            Error::Network {
                message: "reset".to_string(),
            },
        ] {
            assert!(error.is_retryable());
            assert!(should_retry(&error, &never));
        }

        let rejected = Error::api(400, "POST", "/x", b"");
        assert!(!should_retry(&rejected, &always));
        assert!(!should_retry(&Error::Cancelled, &always));

        let missing = Error::api(404, "GET", "/x", b"");
        assert!(!should_retry(&missing, &never));
        assert!(should_retry(&missing, &always));
    }

    #[test]
    fn test_with_retry_success_first_try() {
        let config = RetryConfig::no_retry();
        let result = with_retry(&config, &RetryBudget::unbounded(), &never, || Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_validation_error_is_never_retried() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<()> = with_retry(&fast(), &RetryBudget::unbounded(), &|_: &Error| true, || {
            attempts_clone.set(attempts_clone.get() + 1);
            Err(Error::api(400, "POST", "/x", br#"{"code":"INVALID_DATA","message":"bad"}"#))
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_rate_limit_eventual_success() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry(&fast(), &RetryBudget::unbounded(), &never, || {
            let current = attempts_clone.get();
            attempts_clone.set(current + 1);
            if current < 2 {
                Err(Error::api(429, "GET", "/x", b""))
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_all_attempts_fail() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<()> = with_retry(&fast(), &RetryBudget::unbounded(), &never, || {
            attempts_clone.set(attempts_clone.get() + 1);
            Err(Error::Network {
                message: "timeout".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_predicate_enables_not_found_retry() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry(&fast(), &RetryBudget::unbounded(), &Error::is_not_found, || {
            let current = attempts_clone.get();
            attempts_clone.set(current + 1);
            if current == 0 {
                Err(Error::api(404, "GET", "/x", b""))
            } else {
                Ok(())
            }
        });

        assert!(result.is_ok());
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_cancelled_budget_aborts_immediately() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();
        let budget = RetryBudget {
            deadline: None,
            cancelled: &|| true,
        };

        let result: Result<()> = with_retry(&fast(), &budget, &never, || {
            attempts_clone.set(attempts_clone.get() + 1);
            Ok(())
        });

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(attempts.get(), 0);
    }

    #[test]
    fn test_deadline_bounds_backoff() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(300),
        };
        let budget = RetryBudget {
            deadline: Some(Instant::now() + Duration::from_secs(5)),
            cancelled: &|| false,
        };
        let started = Instant::now();

        let result: Result<()> = with_retry(&config, &budget, &never, || {
            Err(Error::api(503, "GET", "/x", b""))
        });

        assert_eq!(result.unwrap_err().status(), Some(503));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
