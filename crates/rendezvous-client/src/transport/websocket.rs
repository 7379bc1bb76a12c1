//! WebSocket transport for the rendezvous client.
//!
//! A background dispatch loop reads frames off the socket, decodes them into
//! [`ServerMessage`]s and hands them to the client over an mpsc channel.
//! Undecodable frames are logged and skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use rendezvous_core::{ClientMessage, EncodedFrame, RendezvousError, RendezvousResult, ServerMessage, WireFormat};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = Arc<Mutex<SplitSink<WsStream, Message>>>;

/// Inbound queue depth between the dispatch loop and the client.
const INBOUND_BUFFER: usize = 256;

/// A WebSocket connection to the relay.
pub struct WebSocketSession {
    ws_sink: WsSink,
    incoming_rx: mpsc::Receiver<ServerMessage>,
    dispatch_handle: tokio::task::JoinHandle<()>,
    connected: Arc<AtomicBool>,
    format: WireFormat,
}

impl WebSocketSession {
    /// Connect to the relay at `url`, sending frames in `format`.
    pub async fn connect(url: &str, format: WireFormat) -> RendezvousResult<Self> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| RendezvousError::Transport(format!("WebSocket connect error: {e}")))?;

        tracing::info!("WebSocket connected to {}", url);

        let (ws_sink, ws_read) = ws_stream.split();
        let ws_sink = Arc::new(Mutex::new(ws_sink));
        let (incoming_tx, incoming_rx) = mpsc::channel::<ServerMessage>(INBOUND_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));

        let dispatch_handle = {
            let connected = connected.clone();
            let ws_sink = ws_sink.clone();
            tokio::spawn(async move {
                Self::dispatch_loop(ws_read, incoming_tx, connected, ws_sink).await;
            })
        };

        Ok(Self {
            ws_sink,
            incoming_rx,
            dispatch_handle,
            connected,
            format,
        })
    }

    /// Encode and send one message.
    pub async fn send(&self, msg: &ClientMessage) -> RendezvousResult<()> {
        let frame = match rendezvous_core::encode(msg, self.format)? {
            EncodedFrame::Text(text) => Message::Text(text.into()),
            EncodedFrame::Binary(data) => Message::Binary(data.into()),
        };
        let mut sink = self.ws_sink.lock().await;
        sink.send(frame)
            .await
            .map_err(|e| RendezvousError::Transport(format!("WS send error: {e}")))
    }

    /// Next decoded message from the relay. `None` once the socket is gone.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.incoming_rx.recv().await
    }

    /// Send a close frame and stop the dispatch loop.
    pub async fn close(&mut self) -> RendezvousResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            let mut sink = self.ws_sink.lock().await;
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        }
        self.dispatch_handle.abort();
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn dispatch_loop(
        mut ws_read: SplitStream<WsStream>,
        incoming_tx: mpsc::Sender<ServerMessage>,
        connected: Arc<AtomicBool>,
        ws_sink: WsSink,
    ) {
        while let Some(msg) = ws_read.next().await {
            let frame = match msg {
                Ok(Message::Text(text)) => EncodedFrame::Text(text.to_string()),
                Ok(Message::Binary(data)) => EncodedFrame::Binary(data.to_vec()),
                Ok(Message::Close(_)) => {
                    tracing::debug!("WebSocket close frame received");
                    break;
                }
                Ok(Message::Ping(payload)) => {
                    let mut sink = ws_sink.lock().await;
                    let _ = sink.send(Message::Pong(payload)).await;
                    continue;
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!("WebSocket read error: {}", e);
                    break;
                }
            };

            let message: ServerMessage = match rendezvous_core::decode(&frame) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("undecodable frame from relay: {}", e);
                    continue;
                }
            };

            if incoming_tx.send(message).await.is_err() {
                tracing::debug!("incoming channel closed");
                break;
            }
        }

        connected.store(false, Ordering::SeqCst);
        tracing::debug!("WebSocket dispatch loop ended");
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        self.dispatch_handle.abort();
    }
}
