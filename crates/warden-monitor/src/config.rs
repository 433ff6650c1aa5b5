//! Tuning parameters for the compliance monitor.
//!
//! Defaults match the field-tested cadence:
//!
//! | Parameter | Default | Effect |
//! |-----------|---------|--------|
//! | Movement threshold | 5 m | Smaller moves are not re-evaluated |
//! | Compliant interval | 120 s | Periodic heartbeat while inside |
//! | Warning interval | 30 s | Periodic heartbeat while outside |
//! | Noise ceiling | 100 m | Fixes with worse accuracy are dropped |
//! | Sync tick | 10 s | How often the periodic deadline is checked without new fixes |
//! | Retry base / cap | 1 s / 60 s | Exponential backoff bounds |
//! | Max retries | 5 | Failures before the network-error callback fires |

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Exponential backoff policy for heartbeat delivery.
///
/// Delay after the `n`th consecutive failure is
/// `min(base_delay_ms * 2^n, max_delay_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
    /// Consecutive failures that raise the network-error callback.
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Creates the default policy (1 s base, 60 s cap, 5 retries).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_retries: 5,
        }
    }

    /// Delay to wait after `attempt` consecutive failures.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use warden_monitor::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new();
    /// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2_000));
    /// assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(32_000));
    /// assert_eq!(policy.delay_for_attempt(6), Duration::from_millis(60_000));
    /// ```
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the compliance state machine and its feed.
///
/// # Example
///
/// ```rust
/// use warden_monitor::MonitorConfig;
///
/// let config = MonitorConfig::new()
///     .with_movement_threshold(10.0)
///     .with_warning_interval_secs(15);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Moves at or below this distance are not significant.
    pub movement_threshold_meters: f64,
    /// Periodic heartbeat interval while compliant.
    pub compliant_interval_secs: u64,
    /// Periodic heartbeat interval while in warning.
    pub warning_interval_secs: u64,
    /// Fixes with a worse reported accuracy are discarded.
    pub noise_ceiling_meters: f64,
    /// Period of the timer that checks the sync deadline between fixes.
    pub sync_tick_secs: u64,
    /// Heartbeat retry policy.
    pub retry: RetryPolicy,
}

impl MonitorConfig {
    /// Creates a config with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            movement_threshold_meters: 5.0,
            compliant_interval_secs: 120,
            warning_interval_secs: 30,
            noise_ceiling_meters: 100.0,
            sync_tick_secs: 10,
            retry: RetryPolicy::new(),
        }
    }

    /// Sets the significant-movement threshold.
    #[must_use]
    pub const fn with_movement_threshold(mut self, meters: f64) -> Self {
        self.movement_threshold_meters = meters;
        self
    }

    /// Sets the compliant-state heartbeat interval.
    #[must_use]
    pub const fn with_compliant_interval_secs(mut self, secs: u64) -> Self {
        self.compliant_interval_secs = secs;
        self
    }

    /// Sets the warning-state heartbeat interval.
    #[must_use]
    pub const fn with_warning_interval_secs(mut self, secs: u64) -> Self {
        self.warning_interval_secs = secs;
        self
    }

    /// Sets the accuracy noise ceiling.
    #[must_use]
    pub const fn with_noise_ceiling(mut self, meters: f64) -> Self {
        self.noise_ceiling_meters = meters;
        self
    }

    /// Sets the sync tick period.
    #[must_use]
    pub const fn with_sync_tick_secs(mut self, secs: u64) -> Self {
        self.sync_tick_secs = secs;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Periodic interval while compliant.
    #[inline]
    #[must_use]
    pub const fn compliant_interval(&self) -> Duration {
        Duration::from_secs(self.compliant_interval_secs)
    }

    /// Periodic interval while in warning.
    #[inline]
    #[must_use]
    pub const fn warning_interval(&self) -> Duration {
        Duration::from_secs(self.warning_interval_secs)
    }

    /// Sync tick period.
    #[inline]
    #[must_use]
    pub const fn sync_tick(&self) -> Duration {
        Duration::from_secs(self.sync_tick_secs)
    }

    /// Checks that every parameter is usable.
    pub fn validate(&self) -> Result<()> {
        if !self.movement_threshold_meters.is_finite() || self.movement_threshold_meters < 0.0 {
            return Err(MonitorError::InvalidConfig(format!(
                "movement threshold must be >= 0, got {}",
                self.movement_threshold_meters
            )));
        }
        if !self.noise_ceiling_meters.is_finite() || self.noise_ceiling_meters <= 0.0 {
            return Err(MonitorError::InvalidConfig(format!(
                "noise ceiling must be > 0, got {}",
                self.noise_ceiling_meters
            )));
        }
        if self.compliant_interval_secs == 0 || self.warning_interval_secs == 0 {
            return Err(MonitorError::InvalidConfig(
                "heartbeat intervals must be at least one second".to_string(),
            ));
        }
        if self.sync_tick_secs == 0 {
            return Err(MonitorError::InvalidConfig(
                "sync tick must be at least one second".to_string(),
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(MonitorError::InvalidConfig(
                "max retries must be at least one".to_string(),
            ));
        }
        if self.retry.base_delay_ms == 0 || self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(MonitorError::InvalidConfig(format!(
                "retry delays must satisfy 0 < base ({}) <= cap ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.compliant_interval(), Duration::from_secs(120));
        assert_eq!(config.warning_interval(), Duration::from_secs(30));
        assert!((config.movement_threshold_meters - 5.0).abs() < f64::EPSILON);
        assert!((config.noise_ceiling_meters - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.retry.max_retries, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = RetryPolicy::new();
        let delays: Vec<u64> = (1..=7)
            .map(|n| policy.delay_for_attempt(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![2_000, 4_000, 8_000, 16_000, 32_000, 60_000, 60_000]);
    }

    #[test]
    fn test_backoff_is_non_decreasing_and_capped() {
        let policy = RetryPolicy::new();
        let mut previous = Duration::ZERO;
        for attempt in 0..200 {
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay >= previous);
            assert!(delay <= Duration::from_millis(60_000));
            previous = delay;
        }
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(MonitorConfig::new().with_noise_ceiling(0.0).validate().is_err());
        assert!(MonitorConfig::new().with_movement_threshold(-1.0).validate().is_err());
        assert!(MonitorConfig::new().with_warning_interval_secs(0).validate().is_err());
        assert!(MonitorConfig::new().with_sync_tick_secs(0).validate().is_err());
        let retry = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::new()
        };
        assert!(MonitorConfig::new().with_retry(retry).validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{"warning_interval_secs": 20, "retry": {"max_retries": 3}}"#)
                .unwrap();
        assert_eq!(config.warning_interval_secs, 20);
        assert_eq!(config.compliant_interval_secs, 120);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.max_delay_ms, 60_000);
    }
}
