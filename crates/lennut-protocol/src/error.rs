//! Protocol error types

use thiserror::Error;

use crate::handshake::{HEADER_LEN, MAGIC_BYTES};

/// Errors that can occur while exchanging the handshake marker
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The peer sent something other than the marker
    #[error(
        "expected initial header \"{}\" from server, got \"{}\"",
        MAGIC_BYTES.escape_ascii(),
        .got.escape_ascii()
    )]
    BadMarker { got: [u8; HEADER_LEN] },

    /// Writing the marker did not complete before the deadline
    #[error("timed out writing handshake header after {0:?}")]
    WriteTimeout(std::time::Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the error is a marker mismatch rather than a transport failure
    pub fn is_mismatch(&self) -> bool {
        matches!(self, ProtocolError::BadMarker { .. })
    }
}
