//! Readiness marker exchanged between broker and agent
//!
//! An agent connects to the broker and sends nothing. When an end client
//! is matched to that parked connection, the broker writes [`MAGIC_BYTES`]
//! exactly once. The agent must see those exact bytes before it dials the
//! backend; after them the connection carries raw tunnel traffic.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Marker written by the broker to announce a matched end client.
pub const MAGIC_BYTES: &[u8; HEADER_LEN] = b"lennet01";

/// Length of [`MAGIC_BYTES`] on the wire.
pub const HEADER_LEN: usize = 8;

/// Deadline for writing the marker. Never applied to proxied traffic.
pub const HANDSHAKE_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Write the marker to a parked agent connection
///
/// The deadline covers only the marker; once this returns the stream has
/// no timeout attached.
pub async fn write_marker<W>(writer: &mut W, deadline: Duration) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let write = async {
        writer.write_all(MAGIC_BYTES).await?;
        writer.flush().await
    };

    match tokio::time::timeout(deadline, write).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ProtocolError::WriteTimeout(deadline)),
    }
}

/// Block until exactly [`HEADER_LEN`] bytes arrive and check them
pub async fn read_marker<R>(reader: &mut R) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut got = [0u8; HEADER_LEN];
    reader.read_exact(&mut got).await?;

    if &got != MAGIC_BYTES {
        tracing::debug!("Rejecting handshake header {:?}", got.escape_ascii().to_string());
        return Err(ProtocolError::BadMarker { got });
    }

    Ok(())
}
