//! Broker accept loops and connection matching

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::task::TaskTracker;

use lennut_core::config::BrokerConfig;
use lennut_core::{relay, RelayOutcome, Shutdown};
use lennut_protocol::write_marker;

use crate::error::BrokerError;
use crate::queue::WaitingQueue;

/// An agent connection waiting for an end client
#[derive(Debug)]
pub struct ParkedAgent {
    /// The agent's connection, owned by the queue while parked
    pub stream: TcpStream,
    /// Agent's remote address
    pub peer_addr: SocketAddr,
    /// When the connection was parked
    pub parked_at: Instant,
}

/// Both listeners of a bound broker
#[derive(Debug)]
pub struct BrokerListeners {
    inbound: TcpListener,
    agent: TcpListener,
}

impl BrokerListeners {
    /// Local address end clients connect to
    pub fn inbound_addr(&self) -> std::io::Result<SocketAddr> {
        self.inbound.local_addr()
    }

    /// Local address agents connect to
    pub fn agent_addr(&self) -> std::io::Result<SocketAddr> {
        self.agent.local_addr()
    }
}

/// Relay broker matching end clients with parked agent connections
pub struct Broker {
    /// Broker configuration
    config: BrokerConfig,
    /// Stop signal for the accept loops and every relay
    shutdown: Shutdown,
    /// Parked agent connections, oldest first
    waiting: Arc<WaitingQueue<ParkedAgent>>,
    /// In-flight handshake and relay tasks
    relays: TaskTracker,
}

impl Broker {
    /// Create a new broker
    pub fn new(config: BrokerConfig) -> Self {
        let waiting = Arc::new(WaitingQueue::new(config.queue_capacity));
        Self {
            config,
            shutdown: Shutdown::new(),
            waiting,
            relays: TaskTracker::new(),
        }
    }

    /// Number of agent connections currently parked
    pub fn parked(&self) -> usize {
        self.waiting.len()
    }

    /// Bind both listeners
    pub async fn bind(&self) -> Result<BrokerListeners, BrokerError> {
        let inbound = bind_listener("inbound", &self.config.inbound_address).await?;
        let agent = bind_listener("agent", &self.config.agent_address).await?;

        Ok(BrokerListeners { inbound, agent })
    }

    /// Bind both listeners and serve until [`Broker::close`] is called
    ///
    /// Only a bind failure is returned as an error.
    pub async fn run(&self) -> Result<(), BrokerError> {
        let listeners = self.bind().await?;
        self.serve(listeners).await;
        Ok(())
    }

    /// Serve on already bound listeners until [`Broker::close`] is called
    pub async fn serve(&self, listeners: BrokerListeners) {
        tracing::info!(
            "Starting broker listening for agents on {}, proxying conns from {}",
            display_addr(&listeners.agent),
            display_addr(&listeners.inbound),
        );

        tokio::join!(
            self.accept_agents(listeners.agent),
            self.accept_inbound(listeners.inbound),
        );

        let parked = self.waiting.drain();
        if !parked.is_empty() {
            tracing::debug!("Closing {} parked agent connections", parked.len());
        }
        drop(parked);

        self.relays.close();
        self.relays.wait().await;

        tracing::info!("Broker shutdown complete");
    }

    /// Stop the broker
    ///
    /// Safe to call more than once and from any task.
    pub fn close(&self) -> Result<(), BrokerError> {
        if self.shutdown.trigger() {
            tracing::info!("Broker stopping");
        }
        Ok(())
    }

    /// Park every accepted agent connection, dropping it when the queue is full
    async fn accept_agents(&self, listener: TcpListener) {
        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        if self.shutdown.is_stopped() {
                            break;
                        }
                        tracing::error!("Failed to accept agent connection: {}", e);
                        continue;
                    }
                },
            };

            let parked = ParkedAgent {
                stream,
                peer_addr,
                parked_at: Instant::now(),
            };

            match self.waiting.try_enqueue(parked) {
                Ok(()) => {
                    tracing::debug!(
                        agent = %peer_addr,
                        parked = self.waiting.len(),
                        "Parked agent connection"
                    );
                }
                Err(rejected) => {
                    drop(rejected);
                    tracing::warn!(
                        agent = %peer_addr,
                        capacity = self.waiting.capacity(),
                        "Waiting queue full, closing agent connection"
                    );
                }
            }
        }

        tracing::debug!("Agent listener stopped");
    }

    /// Match every accepted end client with the oldest parked agent
    async fn accept_inbound(&self, listener: TcpListener) {
        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        if self.shutdown.is_stopped() {
                            break;
                        }
                        tracing::error!("Failed to accept inbound connection: {}", e);
                        continue;
                    }
                },
            };

            match self.waiting.try_dequeue() {
                Some(agent) => {
                    self.relays.spawn(proxy_conn(
                        stream,
                        peer_addr,
                        agent,
                        self.config.handshake_timeout,
                        self.shutdown.clone(),
                    ));
                }
                None => {
                    drop(stream);
                    tracing::warn!(client = %peer_addr, "Closing inbound conn, no waiting agents");
                }
            }
        }

        tracing::debug!("Inbound listener stopped");
    }
}

/// Announce the end client to the agent, then relay between them
async fn proxy_conn(
    client: TcpStream,
    client_addr: SocketAddr,
    mut agent: ParkedAgent,
    handshake_timeout: Duration,
    shutdown: Shutdown,
) {
    let handshake = tokio::select! {
        _ = shutdown.cancelled() => return,
        result = write_marker(&mut agent.stream, handshake_timeout) => result,
    };

    if let Err(e) = handshake {
        if !shutdown.is_stopped() {
            tracing::error!(
                client = %client_addr,
                agent = %agent.peer_addr,
                "Failed to write header: {}",
                e
            );
        }
        return;
    }

    tracing::info!(
        "Accepted conn from {} connecting with agent {} (parked {:?})",
        client_addr,
        agent.peer_addr,
        agent.parked_at.elapsed()
    );

    if let RelayOutcome::Completed(stats) = relay(client, agent.stream, &shutdown).await {
        tracing::debug!(
            client = %client_addr,
            agent = %agent.peer_addr,
            bytes_to_agent = stats.a_to_b,
            bytes_to_client = stats.b_to_a,
            "Tunnel closed"
        );
    }
}

async fn bind_listener(role: &'static str, address: &str) -> Result<TcpListener, BrokerError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| BrokerError::Bind {
            role,
            address: address.to_string(),
            source,
        })
}

fn display_addr(listener: &TcpListener) -> String {
    listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string())
}
