//! Core server: accepts WebSocket connections and bridges them to the hub.
//!
//! Each connection gets an id, a bounded outbound channel registered with
//! the engine as its [`PeerHandle`](crate::transport::PeerHandle), and a task
//! that pumps frames in both directions until the socket closes.

use crate::config::ServerConfig;
use crate::hub::{self, HubHandle};
use crate::matchmaking::MatchmakingEngine;
use crate::transport::websocket::{self, WebSocketConnection};
use futures_util::{SinkExt, StreamExt};
use pairwire_core::{PairwireError, PairwireResult, ParticipantId, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

type Outbound = mpsc::Sender<ServerMessage>;

/// The pairwire server instance.
pub struct PairwireServer {
    config: ServerConfig,
}

impl PairwireServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind, start the hub, and serve until the listener stops.
    pub async fn run(self) -> PairwireResult<()> {
        let (_addr, accept_loop) = self.spawn().await?;
        accept_loop
            .await
            .map_err(|e| PairwireError::Other(format!("accept loop failed: {e}")))
    }

    /// Bind and start serving in the background.
    ///
    /// Returns the bound address and the accept loop's task.
    pub async fn spawn(self) -> PairwireResult<(SocketAddr, JoinHandle<()>)> {
        let (local_addr, mut ws_rx) =
            websocket::start_listener(self.config.bind_addr, self.config.max_frame_bytes).await?;

        let (hub, events) = hub::channel::<Outbound>(self.config.event_buffer);
        tokio::spawn(hub::run(
            MatchmakingEngine::new(),
            events,
            self.config.stats_interval,
        ));

        info!(addr = %local_addr, "pairwire-server ready");

        let server = Arc::new(self);
        let accept_loop = tokio::spawn(async move {
            while let Some(conn) = ws_rx.recv().await {
                let srv = server.clone();
                let hub = hub.clone();
                tokio::spawn(async move {
                    let remote = conn.remote_addr;
                    if let Err(e) = srv.handle_connection(conn, hub).await {
                        warn!(remote = %remote, error = %e, "WebSocket connection error");
                    }
                });
            }
            info!("listener closed, shutting down");
        });

        Ok((local_addr, accept_loop))
    }

    /// Serve one connection. `Disconnect` is always sent exactly once.
    async fn handle_connection(
        &self,
        conn: WebSocketConnection,
        hub: HubHandle<Outbound>,
    ) -> PairwireResult<()> {
        let id = hub.next_id();
        let (peer_tx, peer_rx) = mpsc::channel::<ServerMessage>(self.config.outbound_buffer);
        info!(participant = %id, remote = %conn.remote_addr, "connection opened");

        hub.connect(id, peer_tx).await;
        let result = self.connection_loop(id, conn, &hub, peer_rx).await;
        hub.disconnect(id).await;

        debug!(participant = %id, "connection closed");
        result
    }

    async fn connection_loop(
        &self,
        id: ParticipantId,
        conn: WebSocketConnection,
        hub: &HubHandle<Outbound>,
        mut peer_rx: mpsc::Receiver<ServerMessage>,
    ) -> PairwireResult<()> {
        let (mut sink, mut stream) = conn.ws_stream.split();

        loop {
            tokio::select! {
                // Messages the engine queued for this participant
                Some(msg) = peer_rx.recv() => {
                    websocket::ws_send_message(&mut sink, &msg).await?;
                }

                frame = stream.next() => match frame {
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(msg)) => {
                        if let Some(text) = websocket::frame_text(msg, self.config.max_frame_bytes) {
                            hub.message(id, text).await;
                        }
                    }
                    Some(Err(e)) => {
                        return Err(PairwireError::Transport(format!("WS recv failed: {e}")));
                    }
                },
            }
        }

        Ok(())
    }
}
