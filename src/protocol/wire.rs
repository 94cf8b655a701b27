//! Frame codec for the RPC socket.
//!
//! Each frame is `[u32 big-endian length][payload]`.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{AgentError, ProtocolErrorKind};

/// Default upper bound on a frame payload.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Read one frame and return its payload.
///
/// A clean EOF before the length prefix is reported as `ConnectionClosed`.
pub async fn read_message<R>(reader: &mut R, max_size: usize) -> Result<Vec<u8>, AgentError>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut len_buf).await {
        return Err(if e.kind() == std::io::ErrorKind::UnexpectedEof {
            AgentError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            }
        } else {
            AgentError::Io(e)
        });
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(AgentError::Protocol {
            kind: ProtocolErrorKind::MessageTooLarge {
                size: len,
                max: max_size,
            },
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write one frame and flush.
pub async fn write_message<W>(writer: &mut W, data: &[u8]) -> Result<(), AgentError>
where
    W: AsyncWriteExt + Unpin,
{
    let len = u32::try_from(data.len()).map_err(|_| AgentError::Protocol {
        kind: ProtocolErrorKind::MessageTooLarge {
            size: data.len(),
            max: u32::MAX as usize,
        },
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// [`read_message`] bounded by `limit`; expiry yields `ConnectionTimeout`.
pub async fn read_message_with_timeout<R>(
    reader: &mut R,
    max_size: usize,
    limit: Duration,
) -> Result<Vec<u8>, AgentError>
where
    R: AsyncReadExt + Unpin,
{
    timeout(limit, read_message(reader, max_size))
        .await
        .map_err(|_| AgentError::Protocol {
            kind: ProtocolErrorKind::ConnectionTimeout,
        })?
}

/// [`write_message`] bounded by `limit`; expiry yields `ConnectionTimeout`.
pub async fn write_message_with_timeout<W>(
    writer: &mut W,
    data: &[u8],
    limit: Duration,
) -> Result<(), AgentError>
where
    W: AsyncWriteExt + Unpin,
{
    timeout(limit, write_message(writer, data))
        .await
        .map_err(|_| AgentError::Protocol {
            kind: ProtocolErrorKind::ConnectionTimeout,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_frame_layout() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, b"{\"method\":\"x\"}").await.unwrap();

        assert_eq!(&buffer[0..4], &[0, 0, 0, 14]);

        let mut cursor = Cursor::new(buffer);
        let payload = read_message(&mut cursor, DEFAULT_MAX_MESSAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(payload, b"{\"method\":\"x\"}");
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut data = vec![0u8; 16];
        data[0..4].copy_from_slice(&2_000_000u32.to_be_bytes());

        let result = read_message(&mut Cursor::new(data), DEFAULT_MAX_MESSAGE_SIZE).await;
        assert!(matches!(
            result,
            Err(AgentError::Protocol {
                kind: ProtocolErrorKind::MessageTooLarge { .. }
            })
        ));
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let result = read_message(&mut Cursor::new(Vec::new()), DEFAULT_MAX_MESSAGE_SIZE).await;
        assert!(matches!(
            result,
            Err(AgentError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed
            })
        ));
    }
}
