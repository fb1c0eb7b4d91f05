//! Agent error types

use lennut_protocol::ProtocolError;
use thiserror::Error;

/// Reasons a single tunnel attempt failed
#[derive(Error, Debug)]
pub enum AgentError {
    /// Could not reach the broker
    #[error("dialing lennut broker at {address}: {source}")]
    DialBroker {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The broker connection did not deliver a valid handshake
    #[error("reading initial header from broker: {0}")]
    Handshake(#[from] ProtocolError),

    /// Could not reach the local backend
    #[error("dialing backend server at {address}: {source}")]
    DialBackend {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The agent was closed while the attempt was in progress
    #[error("agent stopped")]
    Stopped,
}
