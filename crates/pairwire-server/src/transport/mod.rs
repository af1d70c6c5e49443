//! Transport layer: WebSocket listener and the outbound peer capability.

pub mod websocket;

use pairwire_core::ServerMessage;
use tokio::sync::mpsc;
use tracing::debug;

/// Capability to push a message to one connected participant.
///
/// Delivery is best-effort: implementations must not block, and a dropped
/// message is reported only through the return value.
pub trait PeerHandle: Send + 'static {
    /// Queue `msg` for delivery. Returns `false` if it was dropped.
    fn deliver(&self, msg: ServerMessage) -> bool;
}

impl PeerHandle for mpsc::Sender<ServerMessage> {
    fn deliver(&self, msg: ServerMessage) -> bool {
        match self.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("outbound buffer full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

impl PeerHandle for mpsc::UnboundedSender<ServerMessage> {
    fn deliver(&self, msg: ServerMessage) -> bool {
        self.send(msg).is_ok()
    }
}
