use crate::error::Result;
use rand::Rng;
use std::time::Duration;

pub const MAX_RETRY_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op`, retrying transient failures with exponential backoff and jitter.
///
/// Non-transient errors return immediately. After `max_attempts` the last
/// error is returned.
pub fn with_backoff<T, F>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = policy.max_attempts.clamp(1, MAX_RETRY_ATTEMPTS);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay = policy.delay_for(attempt - 1);
                let jitter_ms = match delay.as_millis() as u64 / 2 {
                    0 => 0,
                    half => rand::thread_rng().gen_range(0..=half),
                };
                let wait = delay + Duration::from_millis(jitter_ms);
                tracing::warn!(%what, attempt, error = %e, wait_ms = wait.as_millis() as u64, "transient failure, retrying");
                std::thread::sleep(wait);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConclaveError;
    use std::cell::Cell;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn api(status: u16) -> ConclaveError {
        ConclaveError::Api {
            endpoint: "/status".into(),
            status,
            body: String::new(),
        }
    }

    #[test]
    fn delay_grows_and_caps() {
        let p = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(p.delay_for(0), Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(200));
        assert_eq!(p.delay_for(2), Duration::from_millis(350));
        assert_eq!(p.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn retries_transient_until_success() {
        let calls = Cell::new(0);
        let out = with_backoff(&fast(), "test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(api(503))
            } else {
                Ok(7)
            }
        })
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let err = with_backoff(&fast(), "test", || -> Result<()> {
            calls.set(calls.get() + 1);
            Err(api(500))
        })
        .unwrap_err();
        assert!(matches!(err, ConclaveError::Api { status: 500, .. }));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let calls = Cell::new(0);
        let _ = with_backoff(&fast(), "test", || -> Result<()> {
            calls.set(calls.get() + 1);
            Err(api(404))
        });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn none_policy_makes_one_attempt() {
        let calls = Cell::new(0);
        let _ = with_backoff(&RetryPolicy::none(), "test", || -> Result<()> {
            calls.set(calls.get() + 1);
            Err(api(502))
        });
        assert_eq!(calls.get(), 1);
    }
}
