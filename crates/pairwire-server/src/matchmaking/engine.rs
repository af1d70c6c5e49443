//! Matchmaking engine: pairing state machine and disconnect protocol.
//!
//! The engine owns the registry and the waiting queue and is their only
//! writer. Every public method runs to completion synchronously, so a single
//! owner (the hub task) can apply events one at a time without interleaving.
//!
//! Lookups that miss are not errors here. A queued id whose participant is
//! gone is skipped, and a partner link to a missing participant is cleared
//! (with a `partner_disconnected` notice when the owner is actively relaying).

use super::queue::WaitingQueue;
use super::registry::{PairingState, ParticipantRegistry};
use crate::transport::PeerHandle;
use pairwire_core::{ClientMessage, ParticipantId, ServerMessage, SignalKind, DEFAULT_NICKNAME};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Point-in-time counters for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Registered participants.
    pub participants: usize,
    /// Participants in the waiting queue.
    pub waiting: usize,
    /// Linked pairs (each counted once).
    pub pairs: usize,
}

/// The matchmaking engine.
pub struct MatchmakingEngine<H> {
    registry: ParticipantRegistry<H>,
    queue: WaitingQueue,
}

impl<H: PeerHandle> Default for MatchmakingEngine<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: PeerHandle> MatchmakingEngine<H> {
    pub fn new() -> Self {
        Self {
            registry: ParticipantRegistry::new(),
            queue: WaitingQueue::new(),
        }
    }

    pub fn registry(&self) -> &ParticipantRegistry<H> {
        &self.registry
    }

    pub fn queue(&self) -> &WaitingQueue {
        &self.queue
    }

    /// A new connection arrived.
    ///
    /// Re-registering a live id first dissolves whatever the old entry held,
    /// so its queue slot and partner link do not outlive it.
    pub fn connect(&mut self, id: ParticipantId, handle: H) {
        if self.registry.contains(id) {
            debug!(participant = %id, "connect for a live id, tearing down old entry");
            self.teardown(id);
        }
        self.registry.register(id, handle);
        info!(participant = %id, "participant connected");
    }

    /// Decode and apply one inbound text frame. Malformed frames are dropped.
    pub fn handle_message(&mut self, id: ParticipantId, text: &str) {
        if !self.registry.contains(id) {
            debug!(participant = %id, "message from unknown participant dropped");
            return;
        }
        match ClientMessage::parse(text) {
            Ok(msg) => self.dispatch(id, msg),
            Err(e) => debug!(participant = %id, error = %e, "dropping malformed frame"),
        }
    }

    /// Apply one decoded client message.
    pub fn dispatch(&mut self, id: ParticipantId, msg: ClientMessage) {
        match msg {
            ClientMessage::FindPartner { nickname } => self.find_partner(id, nickname),
            ClientMessage::Next { nickname } => self.next(id, nickname),
            ClientMessage::Signal { kind, body } => self.relay(id, kind, body),
        }
    }

    /// Enter matchmaking.
    ///
    /// A participant that is already waiting or paired is treated as if it
    /// sent `next`, so a repeated request never queues it twice.
    pub fn find_partner(&mut self, id: ParticipantId, nickname: Option<String>) {
        let Some(state) = self.registry.get(id).map(|p| p.state) else {
            return;
        };
        let nickname = nickname.unwrap_or_else(|| DEFAULT_NICKNAME.to_string());
        self.registry.set_nickname(id, &nickname);

        if state != PairingState::Idle {
            debug!(participant = %id, ?state, "find_partner while not idle, tearing down first");
            self.teardown(id);
        }
        self.try_pair(id);
    }

    /// Drop the current partner (or queue slot) and look for a new one.
    ///
    /// Only the former partner is told about the break-up.
    pub fn next(&mut self, id: ParticipantId, nickname: Option<String>) {
        if !self.registry.contains(id) {
            return;
        }
        info!(participant = %id, "participant requested next partner");

        self.teardown(id);
        if let Some(nickname) = nickname {
            self.registry.set_nickname(id, &nickname);
        }
        self.try_pair(id);
    }

    /// Forward a signaling frame to the sender's partner.
    pub fn relay(&mut self, id: ParticipantId, kind: SignalKind, body: Value) {
        let Some(sender) = self.registry.get(id) else {
            return;
        };
        let Some(partner_id) = sender.partner() else {
            debug!(participant = %id, %kind, "signal from unpaired participant dropped");
            return;
        };

        match self.registry.get(partner_id) {
            Some(partner) if partner.partner() == Some(id) => {
                partner.send(ServerMessage::Signal(body));
            }
            Some(_) => {
                warn!(participant = %id, partner = %partner_id, "asymmetric partner link, clearing");
                self.drop_stale_link(id);
            }
            None => {
                debug!(participant = %id, partner = %partner_id, "partner gone, clearing stale link");
                self.drop_stale_link(id);
            }
        }
    }

    /// The connection closed. Safe to call more than once.
    pub fn disconnect(&mut self, id: ParticipantId) {
        if !self.registry.contains(id) {
            self.queue.remove(id);
            return;
        }
        self.teardown(id);
        if let Some(p) = self.registry.remove(id) {
            info!(
                participant = %id,
                nickname = %p.nickname,
                connected_secs = p.connected_at.elapsed().as_secs(),
                "participant disconnected"
            );
        }
    }

    /// Current counters.
    pub fn stats(&self) -> EngineStats {
        let paired = self
            .registry
            .iter()
            .filter(|p| p.partner().is_some())
            .count();
        EngineStats {
            participants: self.registry.len(),
            waiting: self.queue.len(),
            pairs: paired / 2,
        }
    }

    /// Check the consistency rules between registry and queue.
    pub fn check_invariants(&self) -> Result<(), String> {
        for p in self.registry.iter() {
            match p.state {
                PairingState::Paired(partner_id) => {
                    let partner = self
                        .registry
                        .get(partner_id)
                        .ok_or_else(|| format!("{} linked to absent {}", p.id, partner_id))?;
                    if partner.partner() != Some(p.id) {
                        return Err(format!("{} -> {} is not symmetric", p.id, partner_id));
                    }
                    if self.queue.contains(p.id) {
                        return Err(format!("{} is paired but queued", p.id));
                    }
                }
                PairingState::Waiting => {
                    if !self.queue.contains(p.id) {
                        return Err(format!("{} is waiting but not queued", p.id));
                    }
                }
                PairingState::Idle => {
                    if self.queue.contains(p.id) {
                        return Err(format!("{} is idle but queued", p.id));
                    }
                }
            }
        }
        for id in self.queue.iter() {
            if !self.registry.contains(id) {
                return Err(format!("queued {id} is not registered"));
            }
        }
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────────────────

    /// Leave the queue and break any pairing, keeping `id` registered.
    fn teardown(&mut self, id: ParticipantId) {
        self.queue.remove(id);
        let Some(partner_id) = self.registry.get(id).and_then(|p| p.partner()) else {
            self.registry.unlink(id);
            return;
        };
        self.registry.unlink(id);

        match self.registry.get(partner_id) {
            Some(partner) if partner.partner() == Some(id) => {
                partner.send(ServerMessage::PartnerDisconnected);
                self.registry.unlink(partner_id);
                debug!(participant = %id, partner = %partner_id, "pair dissolved");
            }
            Some(_) => {
                warn!(participant = %id, partner = %partner_id, "partner was not linked back, leaving it alone");
            }
            None => {
                debug!(participant = %id, partner = %partner_id, "partner already gone");
            }
        }
    }

    /// Clear `id`'s link to a partner that no longer answers to it.
    fn drop_stale_link(&mut self, id: ParticipantId) {
        self.registry.unlink(id);
        if let Some(p) = self.registry.get(id) {
            p.send(ServerMessage::PartnerDisconnected);
        }
    }

    /// Pair `id` with the oldest live waiting participant, or queue it.
    fn try_pair(&mut self, id: ParticipantId) {
        while let Some(candidate) = self.queue.pop_front() {
            if candidate == id {
                warn!(participant = %id, "participant found itself at queue head");
                self.enqueue(id);
                return;
            }

            match self.registry.get(candidate).map(|p| p.state) {
                Some(PairingState::Waiting) => {
                    if self.registry.link_partners(id, candidate) {
                        self.announce_match(id, candidate);
                        return;
                    }
                }
                Some(state) => {
                    warn!(participant = %candidate, ?state, "queued participant was not waiting, skipping");
                }
                None => {
                    debug!(participant = %candidate, "skipping stale queue entry");
                }
            }
        }

        self.enqueue(id);
    }

    fn enqueue(&mut self, id: ParticipantId) {
        self.queue.push_back(id);
        self.registry.mark_waiting(id);
        if let Some(p) = self.registry.get(id) {
            p.send(ServerMessage::waiting());
            debug!(participant = %id, nickname = %p.nickname, waiting = self.queue.len(), "queued");
        }
    }

    /// Tell both sides about a fresh pairing. `initiator` pulled `waiter`
    /// from the queue and starts the signaling handshake.
    fn announce_match(&self, initiator: ParticipantId, waiter: ParticipantId) {
        let (Some(a), Some(b)) = (self.registry.get(initiator), self.registry.get(waiter)) else {
            return;
        };
        a.send(ServerMessage::matched(waiter, &b.nickname, true));
        b.send(ServerMessage::matched(initiator, &a.nickname, false));
        info!(
            initiator = %initiator,
            initiator_nickname = %a.nickname,
            partner = %waiter,
            partner_nickname = %b.nickname,
            "participants matched"
        );
    }
}
