//! Orchestration-level retry with exponential backoff and jitter.

use std::time::Duration;

use federation_core::RetrySettings;
use rand::{thread_rng, Rng};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64, // 0.0 - 1.0
}

impl Default for RetryConfig { fn default() -> Self { Self { max_retries: 2, base_delay: Duration::from_millis(10), max_delay: Duration::from_millis(200), jitter: 0.25 } } }

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        Self { max_retries: s.max_retries, base_delay: Duration::from_millis(s.base_delay_ms), max_delay: Duration::from_millis(s.max_delay_ms), ..Default::default() }
    }
}

const MAX_BACKOFF_EXPONENT: u32 = 20;

impl RetryConfig {
    fn backoff(&self, attempt: usize) -> Duration {
        let exp = (attempt as u32).min(MAX_BACKOFF_EXPONENT);
        let delay = self.base_delay.checked_mul(1u32 << exp).map_or(self.max_delay, |d| std::cmp::min(d, self.max_delay));
        if self.jitter <= 0.0 { return delay; }
        let jitter_ms = (delay.as_millis() as f64 * self.jitter) as i64;
        let offset: i64 = thread_rng().gen_range(-jitter_ms..=jitter_ms);
        Duration::from_millis((delay.as_millis() as i64 + offset).max(0) as u64)
    }
}

/// Runs `op` until it succeeds, `retryable` rejects the error, or retries run out.
pub async fn retry_async<F, Fut, T, E, R>(cfg: &RetryConfig, mut op: F, retryable: R) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= cfg.max_retries || !retryable(&e) => return Err(e),
            Err(e) => {
                let delay = cfg.backoff(attempt);
                warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying");
                tokio::time::sleep(delay).await;
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> RetryConfig { RetryConfig { max_retries: 3, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(10), jitter: 0.0 } }

    #[tokio::test]
    async fn test_retry_eventual_success() {
        let mut attempts = 0;
        let res: Result<usize, &str> = retry_async(&fast(), |_i| {
            attempts += 1;
            let n = attempts;
            async move { if n < 3 { Err("fail") } else { Ok(42) } }
        }, |_| true).await;
        assert_eq!(res.unwrap(), 42);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let mut attempts = 0;
        let res: Result<(), &str> = retry_async(&fast(), |_| { attempts += 1; async { Err("down") } }, |_| true).await;
        assert!(res.is_err());
        assert_eq!(attempts, 4);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let mut attempts = 0;
        let res: Result<(), &str> = retry_async(&fast(), |_| { attempts += 1; async { Err("fatal") } }, |e| *e != "fatal").await;
        assert!(res.is_err());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn backoff_is_capped() {
        let cfg = RetryConfig { jitter: 0.0, ..fast() };
        assert_eq!(cfg.backoff(0), Duration::from_millis(1));
        assert_eq!(cfg.backoff(10), Duration::from_millis(10));
    }

    #[test]
    fn backoff_survives_large_attempts() {
        let cfg = RetryConfig { jitter: 0.0, ..RetryConfig::from(&RetrySettings { max_retries: 100, base_delay_ms: 10, max_delay_ms: 200 }) };
        assert_eq!(cfg.backoff(75), Duration::from_millis(200));
        assert_eq!(cfg.backoff(100), cfg.max_delay);
        let huge = RetryConfig { base_delay: Duration::from_secs(u64::MAX / 2), max_delay: Duration::from_secs(1), jitter: 0.0, max_retries: 1 };
        assert_eq!(huge.backoff(5), Duration::from_secs(1));
    }

    #[test]
    fn settings_convert() {
        let cfg = RetryConfig::from(&RetrySettings { max_retries: 7, base_delay_ms: 3, max_delay_ms: 9 });
        assert_eq!(cfg.max_retries, 7);
        assert_eq!(cfg.base_delay, Duration::from_millis(3));
    }
}
