//! Tunnel establishment towards the broker and the backend

mod connector;
mod reconnect;

pub use connector::TunnelConnector;
pub use reconnect::Backoff;
