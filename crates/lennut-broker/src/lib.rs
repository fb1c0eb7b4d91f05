//! lennut-broker: Publicly reachable side of the lennut tunnel
//!
//! The broker listens on two addresses. Agents connect to one and park
//! their connection in a bounded waiting queue. End clients connect to the
//! other; each one is matched with the oldest parked agent connection,
//! the handshake marker is written to the agent, and bytes are relayed
//! between the two.

pub mod broker;
pub mod error;
pub mod queue;

pub use broker::{Broker, BrokerListeners, ParkedAgent};
pub use error::BrokerError;
pub use queue::WaitingQueue;
