use crate::error::{AppResult, InfraError, ProtocolError, RelayError};
use crate::net::AppCtx;
use crate::net::output::{Peers, outbound_channel};
use crate::net::sink::JsonLineSink;
use crate::protocol::ConnectionId;
use crate::router::handle_line;
use crate::state::registry::Registry;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

/// Run the relay server on `addr`.
pub async fn serve(addr: std::net::SocketAddr, registry: Arc<Registry>) -> AppResult<()> {
    let listener = TcpListener::bind(&addr).await.map_err(InfraError::from)?;
    serve_with_listener(listener, registry).await
}

/// Accept loop over a pre-bound listener (lets tests bind port 0).
pub async fn serve_with_listener(listener: TcpListener, registry: Arc<Registry>) -> AppResult<()> {
    let peers = Arc::new(Peers::new());

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::info!(%peer, "client connected");

                let ctx = Arc::new(AppCtx {
                    registry: registry.clone(),
                    peers: peers.clone(),
                });

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, ctx).await {
                        tracing::error!(%peer, error=%e, "connection error");
                    }
                    tracing::info!(%peer, "client disconnected");
                });
            }
            Err(e) => {
                tracing::error!(error=%e, "failed to accept connection");
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        }
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    peer: std::net::SocketAddr,
    ctx: Arc<AppCtx>,
) -> AppResult<()> {
    let connection_id = ConnectionId::assign(peer);
    let (read_half, write_half) = stream.into_split();

    // Connection-open hook: the session entry lives for exactly as long as
    // this connection.
    ctx.registry.sessions.register_connection(&connection_id);

    let (outbound, writer) = outbound_channel();
    ctx.peers.attach(&connection_id, outbound);

    let writer_id = connection_id.clone();
    tokio::spawn(async move {
        if let Err(e) = writer.run(JsonLineSink::new(write_half)).await {
            tracing::debug!(connection_id = %writer_id, error=%e, "writer task ended");
        }
    });

    let result = read_loop(read_half, &connection_id, ctx.clone()).await;

    // Connection-close hook, also reached on read errors.
    ctx.peers.detach(&connection_id);
    ctx.registry.sessions.remove_connection(&connection_id);

    result
}

async fn read_loop(
    read_half: tokio::net::tcp::OwnedReadHalf,
    connection_id: &ConnectionId,
    ctx: Arc<AppCtx>,
) -> AppResult<()> {
    let max_frame_bytes = ctx.registry.config.max_frame_bytes;
    let mut reader = BufReader::new(read_half);

    loop {
        let line = match read_frame(&mut reader, max_frame_bytes).await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                if matches!(e, RelayError::Protocol(ProtocolError::FrameTooLarge { .. })) {
                    tracing::warn!(%connection_id, "inbound frame too large, closing");
                }
                return Err(e);
            }
        };

        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }

        match handle_line(&ctx.registry.sessions, connection_id, raw) {
            Ok(deliveries) => {
                for delivery in deliveries {
                    ctx.peers.deliver(delivery).await;
                }
            }
            Err(e) => {
                // Validation failures are logged and dropped; the connection
                // stays open.
                tracing::warn!(%connection_id, error=%e, "rejected inbound frame");
            }
        }
    }

    Ok(())
}

/// Read one newline-terminated frame, buffering at most `max_frame_bytes`.
///
/// The cap is enforced while reading: the moment the pending bytes exceed it
/// the frame is rejected, whether or not a newline ever arrives. Returns
/// `None` on a clean EOF; bytes left at EOF without a newline count as a
/// final frame.
async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> AppResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            if frame.is_empty() {
                return Ok(None);
            }
            break;
        }

        match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                frame.extend_from_slice(&chunk[..pos]);
                reader.consume(pos + 1);
                break;
            }
            None => {
                let len = chunk.len();
                frame.extend_from_slice(chunk);
                reader.consume(len);
            }
        }

        if frame.len() > max_frame_bytes {
            return Err(ProtocolError::FrameTooLarge { limit: max_frame_bytes }.into());
        }
    }

    if frame.len() > max_frame_bytes {
        return Err(ProtocolError::FrameTooLarge { limit: max_frame_bytes }.into());
    }

    Ok(Some(String::from_utf8_lossy(&frame).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_frame_splits_on_newlines() {
        let mut reader = BufReader::new(&b"one\r\ntwo\nthree"[..]);

        assert_eq!(read_frame(&mut reader, 64).await.unwrap(), Some("one\r".to_string()));
        assert_eq!(read_frame(&mut reader, 64).await.unwrap(), Some("two".to_string()));
        // Trailing bytes without a newline still form a final frame.
        assert_eq!(read_frame(&mut reader, 64).await.unwrap(), Some("three".to_string()));
        assert_eq!(read_frame(&mut reader, 64).await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_frame_rejects_oversized_line() {
        let data = vec![b'a'; 256];
        let mut reader = BufReader::new(&data[..]);

        let err = read_frame(&mut reader, 64).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::Protocol(ProtocolError::FrameTooLarge { limit: 64 })
        ));
    }

    #[tokio::test]
    async fn read_frame_bails_before_buffering_the_whole_line() {
        // A small transport buffer forces many refills; the cap must trip on
        // the first chunk past the limit, long before the newline shows up.
        let mut data = vec![b'a'; 4096];
        data.push(b'\n');
        let mut reader = BufReader::with_capacity(16, &data[..]);

        let err = read_frame(&mut reader, 64).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::Protocol(ProtocolError::FrameTooLarge { limit: 64 })
        ));

        // Most of the oversized line was never pulled off the transport.
        let leftover = reader.fill_buf().await.unwrap();
        assert!(!leftover.is_empty());
    }

    #[tokio::test]
    async fn read_frame_accepts_line_at_the_limit() {
        let mut data = vec![b'a'; 64];
        data.push(b'\n');
        let mut reader = BufReader::new(&data[..]);

        let frame = read_frame(&mut reader, 64).await.unwrap().unwrap();
        assert_eq!(frame.len(), 64);
    }
}
