//! lennut-agent: Private side of the lennut tunnel
//!
//! The agent runs next to a backend that is not reachable from the
//! internet. It keeps a connection parked at the broker; when the broker
//! announces an end client with the handshake marker, the agent dials the
//! backend, relays the pair in the background and parks a fresh connection.

pub mod agent;
pub mod error;
pub mod tunnel;

pub use agent::Agent;
pub use error::AgentError;
