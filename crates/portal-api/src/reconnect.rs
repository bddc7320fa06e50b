//! Bounded linear reconnect schedule.

use std::time::Duration;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Linear backoff configuration for the portal channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Step added per consecutive failure. Default: 1s.
    pub interval: Duration,

    /// Upper bound on a single delay. Default: 10s.
    pub max_delay: Duration,

    /// Consecutive failed connections tolerated before giving up. Default: 3.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            max_attempts: 3,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt number `attempt` (1-based).
    ///
    /// `delay = min(interval * attempt, max_delay)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.interval.saturating_mul(attempt).min(self.max_delay)
    }
}

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Tracks consecutive failures for one channel.
///
/// The counter resets on every successful open and only grows on close,
/// so a flapping device gets a fresh budget each time it comes back.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Called when a connection opens.
    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// Called when a connection closes or fails to open.
    ///
    /// Returns the delay before the next attempt, or `None` once the
    /// budget is spent.
    pub fn on_close(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.config.delay_for(self.attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn delays_grow_linearly_then_give_up() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        assert_eq!(policy.on_close(), Some(Duration::from_millis(1000)));
        assert_eq!(policy.on_close(), Some(Duration::from_millis(2000)));
        assert_eq!(policy.on_close(), Some(Duration::from_millis(3000)));
        assert_eq!(policy.on_close(), None);
        assert_eq!(policy.attempts(), 3);
    }

    #[test]
    fn open_resets_the_budget() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        policy.on_close();
        policy.on_close();
        policy.on_open();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.on_close(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn delay_is_capped() {
        let config = ReconnectConfig {
            max_attempts: 20,
            ..ReconnectConfig::default()
        };
        assert_eq!(config.delay_for(9), Duration::from_secs(9));
        assert_eq!(config.delay_for(15), Duration::from_secs(10));
    }

    #[test]
    fn zero_budget_never_retries() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            max_attempts: 0,
            ..ReconnectConfig::default()
        });
        assert_eq!(policy.on_close(), None);
    }
}
