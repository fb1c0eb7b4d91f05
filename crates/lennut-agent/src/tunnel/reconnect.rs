//! Exponential backoff for reconnection

use std::time::Duration;

use lennut_core::config::BackoffConfig;

/// Exponential backoff with optional ceiling and jitter
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Delay to restore on reset
    initial: Duration,
    /// Current delay
    current: Duration,
    /// Maximum delay, if any
    max: Option<Duration>,
    /// Multiplier
    multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    jitter: f64,
}

impl Backoff {
    /// Create a new backoff from configuration
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial, config.max, config.multiplier, config.jitter)
    }

    /// Create a new backoff with custom parameters
    pub fn new(initial: Duration, max: Option<Duration>, multiplier: f64, jitter: f64) -> Self {
        Self {
            initial,
            current: initial,
            max,
            multiplier,
            jitter,
        }
    }

    /// Delay the next call to [`Backoff::next_delay`] will return, without jitter
    #[cfg(test)]
    fn current(&self) -> Duration {
        self.current
    }

    /// Get the next delay and advance the backoff
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;

        let next = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(Duration::MAX);
        self.current = match self.max {
            Some(max) => std::cmp::min(next, max),
            None => next,
        };

        if self.jitter > 0.0 {
            let jitter_amount = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
            delay.saturating_add(Duration::try_from_secs_f64(jitter_amount).unwrap_or_default())
        } else {
            delay
        }
    }

    /// Reset the backoff to the initial delay
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
