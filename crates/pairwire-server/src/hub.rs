//! The hub: single owner of the matchmaking engine.
//!
//! Connection tasks send [`HubEvent`]s over one mpsc channel and the hub task
//! applies them in arrival order, so pairing (which touches two participants
//! at once) never interleaves with another event.

use crate::matchmaking::MatchmakingEngine;
use crate::transport::PeerHandle;
use pairwire_core::ParticipantId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// An event for the engine.
pub enum HubEvent<H> {
    Connect { id: ParticipantId, handle: H },
    Message { id: ParticipantId, text: String },
    Disconnect { id: ParticipantId },
}

/// Clonable sender side of the hub.
pub struct HubHandle<H> {
    tx: mpsc::Sender<HubEvent<H>>,
    ids: Arc<AtomicU64>,
}

impl<H> Clone for HubHandle<H> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            ids: self.ids.clone(),
        }
    }
}

/// Create a hub channel with room for `buffer` pending events.
pub fn channel<H: PeerHandle>(buffer: usize) -> (HubHandle<H>, mpsc::Receiver<HubEvent<H>>) {
    let (tx, rx) = mpsc::channel(buffer);
    let handle = HubHandle {
        tx,
        ids: Arc::new(AtomicU64::new(1)),
    };
    (handle, rx)
}

impl<H: PeerHandle> HubHandle<H> {
    /// Allocate a fresh participant id. Ids are never reused.
    pub fn next_id(&self) -> ParticipantId {
        ParticipantId(self.ids.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn connect(&self, id: ParticipantId, handle: H) {
        self.submit(HubEvent::Connect { id, handle }).await;
    }

    pub async fn message(&self, id: ParticipantId, text: String) {
        self.submit(HubEvent::Message { id, text }).await;
    }

    pub async fn disconnect(&self, id: ParticipantId) {
        self.submit(HubEvent::Disconnect { id }).await;
    }

    async fn submit(&self, event: HubEvent<H>) {
        if self.tx.send(event).await.is_err() {
            warn!("hub stopped, event dropped");
        }
    }
}

/// Run the hub until every [`HubHandle`] is dropped, then return the engine.
pub async fn run<H: PeerHandle>(
    mut engine: MatchmakingEngine<H>,
    mut rx: mpsc::Receiver<HubEvent<H>>,
    stats_interval: Duration,
) -> MatchmakingEngine<H> {
    let mut ticker = tokio::time::interval(stats_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    HubEvent::Connect { id, handle } => engine.connect(id, handle),
                    HubEvent::Message { id, text } => engine.handle_message(id, &text),
                    HubEvent::Disconnect { id } => engine.disconnect(id),
                }
            }
            _ = ticker.tick() => {
                let stats = engine.stats();
                debug!(
                    participants = stats.participants,
                    waiting = stats.waiting,
                    pairs = stats.pairs,
                    "matchmaking stats"
                );
            }
        }
    }

    info!("hub stopped");
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairwire_core::ServerMessage;

    type Handle = mpsc::UnboundedSender<ServerMessage>;

    #[test]
    fn ids_are_unique_across_clones() {
        let (hub, _rx) = channel::<Handle>(8);
        let other = hub.clone();
        let a = hub.next_id();
        let b = other.next_id();
        let c = hub.next_id();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn events_applied_in_order() {
        let (hub, rx) = channel::<Handle>(16);
        let task = tokio::spawn(run(MatchmakingEngine::new(), rx, Duration::from_secs(60)));

        let (x_tx, mut x_rx) = mpsc::unbounded_channel();
        let (y_tx, mut y_rx) = mpsc::unbounded_channel();
        let x = hub.next_id();
        let y = hub.next_id();

        hub.connect(x, x_tx).await;
        hub.connect(y, y_tx).await;
        hub.message(x, r#"{"type":"find_partner","nickname":"x"}"#.into()).await;
        hub.message(y, r#"{"type":"find_partner","nickname":"y"}"#.into()).await;
        hub.message(y, r#"{"type":"offer","sdp":"abc"}"#.into()).await;
        hub.disconnect(y).await;
        drop(hub);

        let engine = task.await.unwrap();

        assert_eq!(x_rx.recv().await.unwrap(), ServerMessage::waiting());
        assert_eq!(
            x_rx.recv().await.unwrap(),
            ServerMessage::matched(y, "y", false)
        );
        assert_eq!(
            x_rx.recv().await.unwrap(),
            ServerMessage::Signal(serde_json::json!({"type": "offer", "sdp": "abc"}))
        );
        assert_eq!(x_rx.recv().await.unwrap(), ServerMessage::PartnerDisconnected);
        assert_eq!(y_rx.recv().await.unwrap(), ServerMessage::matched(x, "x", true));

        assert_eq!(engine.stats().participants, 1);
        engine.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn run_returns_when_handles_dropped() {
        let (hub, rx) = channel::<Handle>(4);
        drop(hub);
        let engine = run(MatchmakingEngine::new(), rx, Duration::from_millis(10)).await;
        assert!(engine.registry().is_empty());
    }
}
