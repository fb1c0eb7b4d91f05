//! lennut-protocol: Handshake protocol for the lennut reverse tunnel
//!
//! The only bytes lennut itself puts on the wire are the fixed marker the
//! broker writes to a parked agent connection once an end client has been
//! matched to it. Everything after the marker is passthrough traffic.

pub mod error;
pub mod handshake;

pub use error::ProtocolError;
pub use handshake::{
    read_marker, write_marker, HANDSHAKE_WRITE_TIMEOUT, HEADER_LEN, MAGIC_BYTES,
};
