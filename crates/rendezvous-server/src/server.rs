//! Core server: accepts WebSocket sessions and feeds their events to the router.
//!
//! Each connection runs its own task. Inbound frames of one session are
//! handled strictly in order; different sessions run concurrently and meet
//! only inside the `RelayRouter`.

use crate::config::ServerConfig;
use crate::relay::{RelayRouter, SessionId};
use crate::transport::websocket::{self, WebSocketConnection};
use rendezvous_core::messages::{ERR_FRAME_TOO_LARGE, ERR_MALFORMED};
use rendezvous_core::{
    codec, ClientMessage, EncodedFrame, RendezvousError, RendezvousResult, ServerMessage,
    WireFormat,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How long shutdown waits for sessions to send their close frames.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// The rendezvous server instance.
pub struct RendezvousServer {
    config: ServerConfig,
    router: Arc<RelayRouter>,
    /// Broadcast sender for server shutdown notification.
    shutdown_tx: broadcast::Sender<()>,
}

impl RendezvousServer {
    /// Create a new server instance with an empty registry.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Arc::new(RelayRouter::new()),
            shutdown_tx: broadcast::channel(1).0,
        }
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> RendezvousResult<()> {
        let (addr, conns) = websocket::start_listener(self.config.socket_addr()).await?;
        info!(
            addr = %addr,
            max_frame_size = self.config.max_frame_size,
            "rendezvous-server ready"
        );
        Arc::new(self).serve(conns, shutdown).await;
        Ok(())
    }

    /// Serve accepted connections until `shutdown` resolves or the listener stops.
    pub async fn serve(
        self: Arc<Self>,
        mut conns: mpsc::Receiver<WebSocketConnection>,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                conn = conns.recv() => {
                    let Some(conn) = conn else {
                        info!("listener closed, shutting down");
                        break;
                    };
                    let srv = self.clone();
                    tasks.spawn(async move {
                        let remote = conn.remote_addr;
                        if let Err(e) = srv.handle_websocket(conn).await {
                            warn!(remote = %remote, error = %e, "WebSocket session error");
                        }
                    });
                }
                // Reap finished session tasks so the set does not grow.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(conns);
        info!(sessions = tasks.len(), "closing live sessions");
        let _ = self.shutdown_tx.send(());
        if tokio::time::timeout(SHUTDOWN_GRACE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_err()
        {
            warn!(remaining = tasks.len(), "sessions did not close in time");
            tasks.abort_all();
        }
    }

    /// Run one WebSocket session from open to close.
    async fn handle_websocket(&self, mut conn: WebSocketConnection) -> RendezvousResult<()> {
        let remote = conn.remote_addr;
        let (outbox, inbox) = mpsc::channel::<ServerMessage>(self.config.outbound_buffer);
        let session = self.router.open_session(outbox).await;
        let live = self.router.session_count().await;
        info!(session = %session, remote = %remote, live, "session opened");

        let result = self.session_loop(&mut conn, session, inbox).await;

        // Disconnect cleanup runs whatever ended the loop.
        if self.router.close_session(session).await.is_none() {
            debug!(session = %session, "session closed without a registered identity");
        }
        info!(session = %session, remote = %remote, "session closed");
        result
    }

    /// Message loop: relay pushes out, inbound frames in.
    async fn session_loop(
        &self,
        conn: &mut WebSocketConnection,
        session: SessionId,
        mut inbox: mpsc::Receiver<ServerMessage>,
    ) -> RendezvousResult<()> {
        let mut format = WireFormat::Json;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!(session = %session, "shutdown signal received, closing WebSocket");
                    websocket::ws_close(&mut conn.ws_stream).await;
                    break;
                }

                Some(msg) = inbox.recv() => {
                    match codec::encode(&msg, format) {
                        Ok(frame) => websocket::ws_send(&mut conn.ws_stream, frame).await?,
                        Err(e) => {
                            warn!(session = %session, kind = msg.type_name(), error = %e, "message dropped, not encodable for this session");
                        }
                    }
                }

                inbound = websocket::ws_recv(&mut conn.ws_stream, self.config.max_frame_size) => {
                    match inbound {
                        Ok(Some(frame)) => {
                            format = frame.format();
                            if let Some(reply) = self.dispatch_frame(session, &frame).await {
                                websocket::ws_send(&mut conn.ws_stream, codec::encode(&reply, format)?).await?;
                            }
                        }
                        Ok(None) => {
                            debug!(session = %session, "WebSocket session ended (peer closed)");
                            break;
                        }
                        Err(RendezvousError::InvalidMessage(reason)) => {
                            warn!(session = %session, reason = %reason, "closing session");
                            let reply = ServerMessage::error(ERR_FRAME_TOO_LARGE, reason);
                            if let Ok(frame) = codec::encode(&reply, format) {
                                let _ = websocket::ws_send(&mut conn.ws_stream, frame).await;
                            }
                            websocket::ws_close(&mut conn.ws_stream).await;
                            break;
                        }
                        Err(e) => {
                            debug!(session = %session, error = %e, "WebSocket session ended");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Decode one inbound frame and act on it.
    ///
    /// Returns a reply only for frames that could not be decoded; everything
    /// else answers through the session's outbox.
    async fn dispatch_frame(&self, session: SessionId, frame: &EncodedFrame) -> Option<ServerMessage> {
        match codec::decode::<ClientMessage>(frame) {
            Ok(msg) => {
                self.dispatch_message(session, msg).await;
                None
            }
            Err(e) => {
                warn!(session = %session, error = %e, "undecodable frame");
                Some(ServerMessage::error(ERR_MALFORMED, e.to_string()))
            }
        }
    }

    /// Dispatch a single decoded message to the router.
    async fn dispatch_message(&self, session: SessionId, msg: ClientMessage) {
        debug!(session = %session, kind = msg.type_name(), "inbound message");
        match msg {
            ClientMessage::Register(p) => {
                if let Err(e) = self.router.register(session, p.identity).await {
                    debug!(session = %session, error = %e, "register ignored");
                }
            }
            ClientMessage::ListPeers(_) => {
                if let Err(e) = self.router.list_peers(session).await {
                    debug!(session = %session, error = %e, "peer list not delivered");
                }
            }
            other => {
                let Some(signal) = other.into_signal() else {
                    return;
                };
                let kind = signal.kind;
                if let Err(e) = self.router.relay(signal).await {
                    debug!(session = %session, kind = %kind, error = %e, "signal dropped");
                }
            }
        }
    }
}

#[cfg(test)]
impl RendezvousServer {
    pub fn router(&self) -> &Arc<RelayRouter> {
        &self.router
    }
}
