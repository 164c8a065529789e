use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tinyrand::{Rand, Seeded, StdRand};

/// Retry schedule for the transport.
///
/// Connection failures (and transient 5xx responses) back off linearly:
/// `network_backoff * attempt`. Rate-limited responses honor a numeric
/// `Retry-After` header, otherwise wait `rate_limit_backoff * attempt`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_network_attempts: u32,
    pub network_backoff: Duration,
    pub max_rate_limit_attempts: u32,
    pub rate_limit_backoff: Duration,
    pub honor_retry_after: bool,
    /// Upper bound for a server-provided `Retry-After`.
    pub max_retry_after: Duration,
    /// Random extra delay in `[0, jitter]` added to computed backoffs.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_network_attempts: 3,
            network_backoff: Duration::from_millis(500),
            max_rate_limit_attempts: 5,
            rate_limit_backoff: Duration::from_secs(1),
            honor_retry_after: true,
            max_retry_after: Duration::from_secs(60),
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Wait before retrying after the `attempt`-th connection failure (1-based).
    pub fn network_delay(&self, attempt: u32) -> Duration {
        self.network_backoff * attempt + self.jitter_sample()
    }

    /// Wait before retrying after the `attempt`-th rate-limited response (1-based).
    pub fn rate_limit_delay(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        if self.honor_retry_after
            && let Some(wait) = retry_after.and_then(parse_retry_after)
        {
            return wait.min(self.max_retry_after);
        }
        self.rate_limit_backoff * attempt + self.jitter_sample()
    }

    fn jitter_sample(&self) -> Duration {
        let max_millis = self.jitter.as_millis() as u64;
        if max_millis == 0 {
            return Duration::ZERO;
        }
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let mut rand = StdRand::seed(seed);
        Duration::from_millis(rand.next_lim_u64(max_millis + 1))
    }
}

/// `Retry-After` in its delta-seconds form. HTTP-date values are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Blocks the current thread between retries. Swappable so callers can observe waits.
pub trait Sleeper: fmt::Debug + Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSleeper {
    waits: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub(crate) fn waits(&self) -> Vec<Duration> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.network_delay(1), Duration::from_millis(500));
        assert_eq!(policy.network_delay(2), Duration::from_millis(1000));
    }

    #[test]
    fn rate_limit_prefers_retry_after() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(1, Some("2")), Duration::from_secs(2));
        assert_eq!(policy.rate_limit_delay(3, None), Duration::from_secs(3));
        assert_eq!(policy.rate_limit_delay(2, Some("soon")), Duration::from_secs(2));
    }

    #[test]
    fn retry_after_is_clamped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(1, Some("3600")), Duration::from_secs(60));
    }

    #[test]
    fn retry_after_can_be_ignored() {
        let policy = RetryPolicy { honor_retry_after: false, ..Default::default() };
        assert_eq!(policy.rate_limit_delay(4, Some("2")), Duration::from_secs(4));
    }

    #[test]
    fn retry_after_only_accepts_delta_seconds() {
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after(""), None);
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy { jitter: Duration::from_millis(100), ..Default::default() };
        for attempt in 1..=5 {
            let wait = policy.network_delay(attempt);
            let base = Duration::from_millis(500) * attempt;
            assert!(wait >= base && wait <= base + Duration::from_millis(100), "{wait:?}");
        }
    }
}
