//! Agent configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::{duration_secs, option_duration_secs};

/// Configuration for the agent running next to the private backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Broker's agent-facing address
    pub broker_address: String,

    /// Local backend every tunnel is proxied to
    pub backend_address: String,

    /// Upper bound on a single dial to the broker or the backend
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Backoff configuration for reconnections
    pub backoff: BackoffConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            broker_address: "localhost:3001".to_string(),
            backend_address: "localhost:8080".to_string(),
            connect_timeout: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Exponential backoff configuration
///
/// The defaults grow the delay by 1.5x per failure with no ceiling and no
/// jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_secs")]
    pub initial: Duration,

    /// Maximum delay, unbounded when unset
    #[serde(with = "option_duration_secs")]
    pub max: Option<Duration>,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: None,
            multiplier: 1.5,
            jitter: 0.0,
        }
    }
}
