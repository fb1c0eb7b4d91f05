//! lennut-core: Shared building blocks for the lennut broker and agent
//!
//! This crate provides configuration structures, the per-instance shutdown
//! token, and the bidirectional byte relay used on both ends of a tunnel.

pub mod config;
pub mod error;
pub mod relay;
pub mod shutdown;

pub use error::ConfigError;
pub use relay::{relay, Direction, RelayOutcome, RelayStats};
pub use shutdown::Shutdown;
