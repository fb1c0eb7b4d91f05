//! Bidirectional byte relay between two established streams
//!
//! Used on both ends of a tunnel: by the broker between an end client and a
//! parked agent connection, and by the agent between the broker connection
//! and the local backend.

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::shutdown::Shutdown;

/// Which way bytes were flowing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the first stream to the second
    AToB,
    /// From the second stream to the first
    BToA,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AToB => write!(f, "a->b"),
            Direction::BToA => write!(f, "b->a"),
        }
    }
}

/// Bytes moved in each direction by a completed relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub a_to_b: u64,
    pub b_to_a: u64,
}

/// How a relay ended
#[derive(Debug)]
pub enum RelayOutcome {
    /// Both sides reached EOF
    Completed(RelayStats),
    /// One direction failed; the other was abandoned
    Failed { direction: Direction, error: io::Error },
    /// The shutdown signal fired first
    Stopped,
}

/// Copy bytes both ways between `a` and `b` until both sides finish,
/// either side fails, or `shutdown` fires
///
/// EOF on one side is forwarded as a write shutdown to the other, so the
/// opposite direction can keep draining. Both streams are dropped, and
/// therefore closed, before this returns.
pub async fn relay<A, B>(a: A, b: B, shutdown: &Shutdown) -> RelayOutcome
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let copy = async {
        tokio::try_join!(
            pipe(&mut a_read, &mut b_write, Direction::AToB),
            pipe(&mut b_read, &mut a_write, Direction::BToA),
        )
    };

    let outcome = tokio::select! {
        _ = shutdown.cancelled() => RelayOutcome::Stopped,
        result = copy => match result {
            Ok((a_to_b, b_to_a)) => RelayOutcome::Completed(RelayStats { a_to_b, b_to_a }),
            Err((direction, error)) => RelayOutcome::Failed { direction, error },
        },
    };

    if let RelayOutcome::Failed { direction, error } = &outcome {
        if !shutdown.is_stopped() {
            tracing::warn!(%direction, "Dropping proxy conn: {}", error);
        }
    }

    outcome
}

async fn pipe<R, W>(
    reader: &mut R,
    writer: &mut W,
    direction: Direction,
) -> Result<u64, (Direction, io::Error)>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = tokio::io::copy(reader, writer)
        .await
        .map_err(|e| (direction, e))?;

    match writer.shutdown().await {
        Ok(()) => Ok(copied),
        // Peer already fully closed; nothing left to half-close
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(copied),
        Err(e) => Err((direction, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_relay_both_directions_with_half_close() {
        let (mut client, client_side) = tokio::io::duplex(1024);
        let (backend_side, mut backend) = tokio::io::duplex(1024);
        let shutdown = Shutdown::new();

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { relay(client_side, backend_side, &shutdown).await })
        };

        client.write_all(b"hello backend").await.unwrap();
        client.shutdown().await.unwrap();

        let mut request = Vec::new();
        backend.read_to_end(&mut request).await.unwrap();
        assert_eq!(request, b"hello backend");

        // Client's write side is closed but the response must still drain
        backend.write_all(b"hello client").await.unwrap();
        backend.shutdown().await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, b"hello client");

        match handle.await.unwrap() {
            RelayOutcome::Completed(stats) => {
                assert_eq!(stats.a_to_b, 13);
                assert_eq!(stats.b_to_a, 12);
            }
            other => panic!("expected completed relay, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relay_preserves_order_of_large_payload() {
        let (mut client, client_side) = tokio::io::duplex(256);
        let (backend_side, mut backend) = tokio::io::duplex(256);
        let shutdown = Shutdown::new();

        let relay_task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { relay(client_side, backend_side, &shutdown).await })
        };

        let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            client.write_all(&payload).await.unwrap();
            client.shutdown().await.unwrap();
            client
        });

        let mut received = Vec::new();
        backend.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, expected);

        drop(backend);
        drop(writer.await.unwrap());
        assert!(matches!(
            relay_task.await.unwrap(),
            RelayOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_both_sides() {
        let (mut client, client_side) = tokio::io::duplex(1024);
        let (backend_side, mut backend) = tokio::io::duplex(1024);
        let shutdown = Shutdown::new();

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { relay(client_side, backend_side, &shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();

        let outcome = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("relay did not stop")
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::Stopped));

        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
        assert_eq!(backend.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_direction_tears_down_relay() {
        let (mut client, client_side) = tokio::io::duplex(1024);
        let (backend_side, backend) = tokio::io::duplex(1024);
        let shutdown = Shutdown::new();

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { relay(client_side, backend_side, &shutdown).await })
        };

        // Backend vanishes: its read side hits EOF, then writes to it fail
        drop(backend);
        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
        client.write_all(b"anyone there?").await.unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("relay did not finish")
            .unwrap();
        match outcome {
            RelayOutcome::Failed { direction, .. } => assert_eq!(direction, Direction::AToB),
            other => panic!("expected failed relay, got {other:?}"),
        }
    }
}
