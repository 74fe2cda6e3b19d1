use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Exponential backoff with a fixed attempt cap and up to 20% random jitter.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub max_attempts: u32,
    pub base: Duration,
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based), without jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max_delay)
    }

    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let delay = self.delay(attempt);
        let jitter_ms = delay.as_millis() as u64 / 5;
        if jitter_ms == 0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        delay + Duration::from_millis(extra)
    }

    /// Polls until `poll` yields a value, sleeping between attempts. Returns
    /// `None` once the attempts are used up; errors end polling at once.
    pub async fn retry<T, E, F, Fut>(&self, mut poll: F) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        for attempt in 0..self.max_attempts {
            if let Some(value) = poll().await? {
                return Ok(Some(value));
            }
            if attempt + 1 < self.max_attempts {
                tokio::time::sleep(self.delay_with_jitter(attempt)).await;
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_is_capped() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_millis(500));
        assert_eq!(backoff.delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
        assert_eq!(backoff.delay(10), Duration::from_secs(4));
        assert_eq!(backoff.delay(40), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = Backoff::default();
        for attempt in 0..5 {
            let base = backoff.delay(attempt);
            let jittered = backoff.delay_with_jitter(attempt);
            assert!(jittered >= base);
            assert!(jittered <= base + base / 5);
        }
    }

    fn instant() -> Backoff {
        Backoff {
            max_attempts: 5,
            base: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<Option<u32>, String> = instant()
            .retry(|| {
                calls += 1;
                async { Ok(None) }
            })
            .await;
        assert_eq!(result, Ok(None));
        assert_eq!(calls, 5);
    }

    #[tokio::test]
    async fn test_retry_stops_on_value_or_error() {
        let mut calls = 0;
        let result: Result<Option<u32>, String> = instant()
            .retry(|| {
                calls += 1;
                let n = calls;
                async move { Ok((n == 3).then_some(n)) }
            })
            .await;
        assert_eq!(result, Ok(Some(3)));

        let mut calls = 0;
        let result: Result<Option<u32>, String> = instant()
            .retry(|| {
                calls += 1;
                async { Err("forbidden".to_string()) }
            })
            .await;
        assert_eq!(result, Err("forbidden".to_string()));
        assert_eq!(calls, 1);
    }
}
