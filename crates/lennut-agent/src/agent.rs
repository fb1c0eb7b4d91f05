//! Agent reconnect loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_util::task::TaskTracker;

use lennut_core::config::AgentConfig;
use lennut_core::{relay, RelayOutcome, Shutdown};

use crate::error::AgentError;
use crate::tunnel::{Backoff, TunnelConnector};

/// Keeps a connection parked at the broker and proxies matched ones to the backend
pub struct Agent {
    /// Dials the broker and the backend
    connector: TunnelConnector,
    /// Stop signal for the loop and every relay
    shutdown: Shutdown,
    /// Relays running in the background
    tunnels: TaskTracker,
    /// Number of tunnels currently relaying
    active: Arc<AtomicUsize>,
}

impl Agent {
    /// Create a new agent
    pub fn new(config: AgentConfig) -> Self {
        Self {
            connector: TunnelConnector::new(config),
            shutdown: Shutdown::new(),
            tunnels: TaskTracker::new(),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of tunnels currently relaying
    pub fn active_tunnels(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Run until [`Agent::close`] is called
    ///
    /// Connection failures never end the loop; they are logged and retried
    /// with exponential backoff.
    pub async fn run(&self) -> Result<(), AgentError> {
        let config = self.connector.config();
        tracing::info!(
            "Starting agent connecting to {}, proxying to {}",
            config.broker_address,
            config.backend_address
        );

        let mut backoff = Backoff::from_config(&config.backoff);

        while !self.shutdown.is_stopped() {
            match self.establish().await {
                Ok((broker, backend)) => {
                    self.spawn_relay(broker, backend);
                    backoff.reset();
                }
                Err(e) => self.retry_after(&mut backoff, e).await,
            }
        }

        self.tunnels.close();
        self.tunnels.wait().await;

        tracing::info!("Agent shutdown complete");
        Ok(())
    }

    /// Stop the agent
    ///
    /// Safe to call more than once and from any task.
    pub fn close(&self) -> Result<(), AgentError> {
        if self.shutdown.trigger() {
            tracing::info!("Agent stopping");
        }
        Ok(())
    }

    /// Park a connection at the broker, wait for a client, then dial the backend
    ///
    /// Any connection opened by a failed attempt is dropped before returning.
    async fn establish(&self) -> Result<(TcpStream, TcpStream), AgentError> {
        let mut broker = self.connector.connect_broker(&self.shutdown).await?;
        tracing::info!("Established conn to broker, waiting for incoming");

        self.connector
            .await_handshake(&mut broker, &self.shutdown)
            .await?;

        let backend = self.connector.connect_backend(&self.shutdown).await?;
        tracing::info!("Got header, proxying to backend");

        Ok((broker, backend))
    }

    fn spawn_relay(&self, broker: TcpStream, backend: TcpStream) {
        let shutdown = self.shutdown.clone();
        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::SeqCst);

        self.tunnels.spawn(async move {
            let outcome = relay(broker, backend, &shutdown).await;
            active.fetch_sub(1, Ordering::SeqCst);

            if let RelayOutcome::Completed(stats) = outcome {
                tracing::debug!(
                    bytes_to_backend = stats.a_to_b,
                    bytes_to_broker = stats.b_to_a,
                    "Tunnel closed"
                );
            }
        });
    }

    /// Log the failure and sleep for the current backoff delay
    async fn retry_after(&self, backoff: &mut Backoff, err: AgentError) {
        if self.shutdown.is_stopped() {
            return;
        }

        let delay = backoff.next_delay();
        tracing::warn!("{}, retry in {:?}", err, delay);

        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
