//! WebSocket listener using tokio-tungstenite.
//!
//! Text frames carry JSON messages, binary frames carry CBOR. Every accepted
//! connection is handed to the server over a channel.

use futures_util::{SinkExt, StreamExt};
use rendezvous_core::{EncodedFrame, RendezvousError, RendezvousResult};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

/// A handle to an accepted WebSocket connection.
pub struct WebSocketConnection {
    pub ws_stream: WebSocketStream<TcpStream>,
    pub remote_addr: SocketAddr,
}

/// Start the WebSocket listener.
///
/// Returns the bound address (useful with port 0) and a receiver that yields
/// accepted connections.
pub async fn start_listener(
    bind_addr: SocketAddr,
) -> RendezvousResult<(SocketAddr, mpsc::Receiver<WebSocketConnection>)> {
    let tcp_listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| RendezvousError::Transport(format!("WS bind failed: {e}")))?;
    let local_addr = tcp_listener.local_addr()?;

    info!(addr = %local_addr, "WebSocket listener started");

    let (tx, rx) = mpsc::channel::<WebSocketConnection>(64);

    tokio::spawn(async move {
        loop {
            match tcp_listener.accept().await {
                Ok((stream, addr)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        match tokio_tungstenite::accept_async(stream).await {
                            Ok(ws_stream) => {
                                debug!(remote = %addr, "WebSocket connection accepted");
                                let conn = WebSocketConnection {
                                    ws_stream,
                                    remote_addr: addr,
                                };
                                if tx.send(conn).await.is_err() {
                                    warn!("WebSocket connection channel closed");
                                }
                            }
                            Err(e) => {
                                warn!(remote = %addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
            if tx.is_closed() {
                debug!("connection receiver dropped, listener stopping");
                break;
            }
        }
    });

    Ok((local_addr, rx))
}

/// Send an encoded frame: text for JSON, binary for CBOR.
pub async fn ws_send(
    ws: &mut WebSocketStream<TcpStream>,
    frame: EncodedFrame,
) -> RendezvousResult<()> {
    let msg = match frame {
        EncodedFrame::Text(text) => Message::Text(text.into()),
        EncodedFrame::Binary(data) => Message::Binary(data.into()),
    };
    ws.send(msg)
        .await
        .map_err(|e| RendezvousError::Transport(format!("WS send failed: {e}")))
}

/// Send a close frame. Errors are ignored: the peer may already be gone.
pub async fn ws_close(ws: &mut WebSocketStream<TcpStream>) {
    let _ = ws.close(None).await;
}

/// Receive the next text or binary frame.
///
/// Returns `None` when the connection is closed. Frames larger than
/// `max_frame_size` are rejected with `InvalidMessage`.
pub async fn ws_recv(
    ws: &mut WebSocketStream<TcpStream>,
    max_frame_size: usize,
) -> RendezvousResult<Option<EncodedFrame>> {
    loop {
        let frame = match ws.next().await {
            Some(Ok(Message::Text(text))) => EncodedFrame::Text(text.to_string()),
            Some(Ok(Message::Binary(data))) => EncodedFrame::Binary(data.to_vec()),
            Some(Ok(Message::Close(_))) => return Ok(None),
            Some(Ok(Message::Ping(payload))) => {
                let _ = ws.send(Message::Pong(payload)).await;
                continue;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(RendezvousError::Transport(format!("WS recv failed: {e}")));
            }
            None => return Ok(None),
        };

        if frame.len() > max_frame_size {
            return Err(RendezvousError::InvalidMessage(format!(
                "WS frame too large: {} bytes (max {max_frame_size})",
                frame.len()
            )));
        }
        return Ok(Some(frame));
    }
}
