//! Reconnection backoff for SSE streams.

use std::time::Duration;

/// Exponential backoff for re-opening a dropped SSE stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectionOptions {
    /// Delay before the first reconnection attempt
    pub initial_reconnection_delay: Duration,
    /// Multiplier applied per attempt
    pub reconnection_delay_grow_factor: f64,
    /// Upper bound for any single delay
    pub max_reconnection_delay: Duration,
    /// Attempts before giving up; 0 retries forever
    pub max_retries: u32,
}

impl Default for ReconnectionOptions {
    fn default() -> Self {
        Self {
            initial_reconnection_delay: Duration::from_millis(1000),
            reconnection_delay_grow_factor: 1.5,
            max_reconnection_delay: Duration::from_millis(30_000),
            max_retries: 2,
        }
    }
}

impl ReconnectionOptions {
    /// Defaults: 1s initial, x1.5 growth, 30s cap, 2 retries
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the first delay
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_reconnection_delay = delay;
        self
    }

    /// Set the growth factor
    #[must_use]
    pub fn with_grow_factor(mut self, factor: f64) -> Self {
        self.reconnection_delay_grow_factor = factor;
        self
    }

    /// Set the delay cap
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_reconnection_delay = delay;
        self
    }

    /// Set the retry limit
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Whether `attempt` (zero-based) is still allowed
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_retries == 0 || attempt < self.max_retries
    }

    /// `min(initial * factor^attempt, max)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let initial = self.initial_reconnection_delay.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let grown = initial * self.reconnection_delay_grow_factor.powi(exponent);
        let max = self.max_reconnection_delay.as_secs_f64();
        if grown.is_finite() && grown < max {
            Duration::from_secs_f64(grown.max(0.0))
        } else {
            self.max_reconnection_delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_schedule() {
        let options = ReconnectionOptions::default();
        assert_eq!(options.delay(0), Duration::from_millis(1000));
        assert_eq!(options.delay(1), Duration::from_millis(1500));
        assert_eq!(options.delay(2), Duration::from_millis(2250));
    }

    #[test]
    fn test_delay_is_capped() {
        let options = ReconnectionOptions::default();
        assert_eq!(options.delay(20), Duration::from_millis(30_000));
        assert_eq!(options.delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_retry_limit() {
        let options = ReconnectionOptions::default();
        assert!(options.allows(0));
        assert!(options.allows(1));
        assert!(!options.allows(2));

        let unlimited = options.with_max_retries(0);
        assert!(unlimited.allows(10_000));
    }
}
