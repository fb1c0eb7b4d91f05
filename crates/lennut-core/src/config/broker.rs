//! Broker configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use lennut_protocol::HANDSHAKE_WRITE_TIMEOUT;

use super::serde_utils::duration_secs;

/// Configuration for the broker daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Address end clients connect to; their traffic is tunnelled to the backend
    pub inbound_address: String,

    /// Address agents connect to in order to park a connection
    pub agent_address: String,

    /// Maximum number of parked agent connections
    pub queue_capacity: usize,

    /// Deadline for writing the handshake marker to a parked agent
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            inbound_address: "0.0.0.0:3000".to_string(),
            agent_address: "0.0.0.0:3001".to_string(),
            queue_capacity: 128,
            handshake_timeout: HANDSHAKE_WRITE_TIMEOUT,
        }
    }
}
