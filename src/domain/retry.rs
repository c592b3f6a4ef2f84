use crate::domain::integration::{IntegrationError, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry budget and backoff schedule for partner deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total deliveries allowed, the first one included.
    pub max_attempts: u32,
    #[serde(with = "millis_vec")]
    pub delays: Vec<Duration>,
    pub backoff_multiplier: f64,
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays: vec![Duration::from_secs(5)],
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryConfig {
    pub const MAX_ATTEMPTS_LIMIT: u32 = 10;
    pub const MIN_DELAY: Duration = Duration::from_secs(1);
    pub const MAX_DELAY: Duration = Duration::from_secs(300);

    pub fn validate(&self) -> Result<(), IntegrationError> {
        if !(1..=Self::MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(IntegrationError::config(format!(
                "max_attempts must be between 1 and {}, got {}",
                Self::MAX_ATTEMPTS_LIMIT,
                self.max_attempts
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 0.0 {
            return Err(IntegrationError::config(
                "backoff_multiplier must be a positive number",
            ));
        }
        if let Some(bad) = self
            .delays
            .iter()
            .find(|d| **d < Self::MIN_DELAY || **d > Self::MAX_DELAY)
        {
            return Err(IntegrationError::config(format!(
                "retry delay {}ms outside {}..={}ms",
                bad.as_millis(),
                Self::MIN_DELAY.as_millis(),
                Self::MAX_DELAY.as_millis()
            )));
        }
        Ok(())
    }

    /// Delay before retry number `attempt_index` (zero-based).
    ///
    /// `delays[min(i, len - 1)] * multiplier^i`, clamped to `max_delay`.
    pub fn delay(&self, attempt_index: u32) -> Duration {
        let Some(base) = self
            .delays
            .get(attempt_index as usize)
            .or_else(|| self.delays.last())
        else {
            return self.max_delay;
        };
        let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
        let secs = base.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs < 0.0 {
            return self.max_delay;
        }
        Duration::try_from_secs_f64(secs)
            .map(|d| d.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }

    pub fn next_retry_at(&self, now: Timestamp, attempt_index: u32) -> Timestamp {
        let delay = u64::try_from(self.delay(attempt_index).as_millis()).unwrap_or(u64::MAX);
        now.saturating_add(delay)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod millis_vec {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &[Duration], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(
            v.iter()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Duration>, D::Error> {
        Vec::<u64>::deserialize(d).map(|v| v.into_iter().map(Duration::from_millis).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(delays: &[u64], multiplier: f64, max_secs: u64) -> RetryConfig {
        RetryConfig {
            max_attempts: 5,
            delays: delays.iter().copied().map(Duration::from_secs).collect(),
            backoff_multiplier: multiplier,
            max_delay: Duration::from_secs(max_secs),
        }
    }

    #[test]
    fn test_default_progression() {
        let config = RetryConfig::default();
        assert_eq!(config.delay(0), Duration::from_secs(5));
        assert_eq!(config.delay(1), Duration::from_secs(10));
        assert_eq!(config.delay(2), Duration::from_secs(20));
        // 5 * 2^6 = 320, capped
        assert_eq!(config.delay(6), Duration::from_secs(300));
    }

    #[test]
    fn test_delay_index_clamps_to_last_entry() {
        let config = config(&[1, 10, 60], 1.0, 3600);
        assert_eq!(config.delay(0), Duration::from_secs(1));
        assert_eq!(config.delay(1), Duration::from_secs(10));
        assert_eq!(config.delay(2), Duration::from_secs(60));
        assert_eq!(config.delay(7), Duration::from_secs(60));
    }

    #[test]
    fn test_delay_uses_multiplier_with_table() {
        // delays[1] * 3^1 = 30
        let config = config(&[2, 10], 3.0, 3600);
        assert_eq!(config.delay(1), Duration::from_secs(30));
        // delays[1] * 3^2 = 90
        assert_eq!(config.delay(2), Duration::from_secs(90));
    }

    #[test]
    fn test_empty_delays_and_overflow_clamp() {
        let empty = config(&[], 2.0, 42);
        assert_eq!(empty.delay(0), Duration::from_secs(42));

        let huge = config(&[5], 1e10, 42);
        assert_eq!(huge.delay(1_000), Duration::from_secs(42));
    }

    #[test]
    fn test_validate_bounds() {
        assert!(RetryConfig::default().validate().is_ok());
        let zero = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert!(zero.validate().is_err());
        let negative = RetryConfig {
            backoff_multiplier: -1.0,
            ..RetryConfig::default()
        };
        assert!(negative.validate().is_err());
        let too_fast = RetryConfig {
            delays: vec![Duration::from_millis(10)],
            ..RetryConfig::default()
        };
        assert!(too_fast.validate().is_err());
    }

    #[test]
    fn test_next_retry_at() {
        let config = RetryConfig::default();
        assert_eq!(config.next_retry_at(1_000, 0), 6_000);
        assert_eq!(config.next_retry_at(1_000, 1), 11_000);
        assert_eq!(config.next_retry_at(u64::MAX - 1, 0), u64::MAX);
    }

    #[test]
    fn test_config_millis_roundtrip_from_toml() {
        let config: RetryConfig =
            toml::from_str("max_attempts = 4\ndelays = [1000, 2500]\nbackoff_multiplier = 1.5\nmax_delay = 60000").unwrap();
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.delays, vec![Duration::from_millis(1000), Duration::from_millis(2500)]);
        assert_eq!(config.max_delay, Duration::from_secs(60));
    }
}
