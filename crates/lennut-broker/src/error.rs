//! Broker error types

use thiserror::Error;

/// Errors that stop the broker from serving
#[derive(Error, Debug)]
pub enum BrokerError {
    /// A listener could not be bound
    #[error("Failed to bind {role} listener to {address}: {source}")]
    Bind {
        role: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },
}
