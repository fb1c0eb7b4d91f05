//! Outbound connections to the broker and the local backend
//!
//! Every step here blocks on the network, so each one races the agent's
//! shutdown signal and gives up with [`AgentError::Stopped`] when it fires.

use std::io;

use tokio::net::TcpStream;

use lennut_core::config::AgentConfig;
use lennut_core::Shutdown;
use lennut_protocol::read_marker;

use crate::error::AgentError;

/// Dials the broker and the backend for one tunnel attempt
#[derive(Debug, Clone)]
pub struct TunnelConnector {
    /// Agent configuration
    config: AgentConfig,
}

impl TunnelConnector {
    /// Create a new tunnel connector
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Get the agent configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Open a connection to the broker's agent-facing listener
    pub async fn connect_broker(&self, shutdown: &Shutdown) -> Result<TcpStream, AgentError> {
        let address = &self.config.broker_address;
        tracing::debug!("Connecting to broker at {}", address);

        match self.dial(address, shutdown).await {
            Some(Ok(stream)) => Ok(stream),
            Some(Err(source)) => Err(AgentError::DialBroker {
                address: address.clone(),
                source,
            }),
            None => Err(AgentError::Stopped),
        }
    }

    /// Wait on a parked broker connection until the handshake marker arrives
    ///
    /// This can block for as long as no end client shows up.
    pub async fn await_handshake(
        &self,
        broker: &mut TcpStream,
        shutdown: &Shutdown,
    ) -> Result<(), AgentError> {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(AgentError::Stopped),
            result = read_marker(broker) => Ok(result?),
        }
    }

    /// Open a connection to the local backend
    pub async fn connect_backend(&self, shutdown: &Shutdown) -> Result<TcpStream, AgentError> {
        let address = &self.config.backend_address;
        tracing::debug!("Connecting to backend at {}", address);

        match self.dial(address, shutdown).await {
            Some(Ok(stream)) => Ok(stream),
            Some(Err(source)) => Err(AgentError::DialBackend {
                address: address.clone(),
                source,
            }),
            None => Err(AgentError::Stopped),
        }
    }

    /// Dial `address`, or `None` if shutdown fired first
    async fn dial(&self, address: &str, shutdown: &Shutdown) -> Option<io::Result<TcpStream>> {
        let timeout = self.config.connect_timeout;
        let connect = tokio::time::timeout(timeout, TcpStream::connect(address));

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            result = connect => Some(match result {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection timed out after {:?}", timeout),
                )),
            }),
        }
    }
}
