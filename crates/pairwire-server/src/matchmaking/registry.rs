//! Participant registry.
//!
//! Stores connected participants indexed by their connection id. The
//! registry is pure data: it never talks to the transport, and it only holds
//! each participant's outbound handle on the transport's behalf.

use crate::transport::PeerHandle;
use pairwire_core::{ParticipantId, ServerMessage, DEFAULT_NICKNAME};
use std::collections::HashMap;
use std::time::Instant;
use tracing::warn;

/// Where a participant is in the matchmaking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    /// Connected, not queued, not paired.
    Idle,
    /// Present in the waiting queue.
    Waiting,
    /// Linked to a partner.
    Paired(ParticipantId),
}

/// One connected client.
#[derive(Debug)]
pub struct Participant<H> {
    /// Connection id assigned by the hub.
    pub id: ParticipantId,
    /// Display name shown to partners. Starts as `"Anonymous"`.
    pub nickname: String,
    /// Where the participant is in the pairing lifecycle.
    pub state: PairingState,
    /// When the participant connected. Logged as session length on disconnect.
    pub connected_at: Instant,
    /// Outbound channel to the connection task.
    handle: H,
}

impl<H: PeerHandle> Participant<H> {
    /// Current partner, if paired.
    pub fn partner(&self) -> Option<ParticipantId> {
        match self.state {
            PairingState::Paired(partner) => Some(partner),
            _ => None,
        }
    }

    /// Push a message to this participant (best effort).
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.handle.deliver(msg)
    }
}

/// Registry of live participants.
#[derive(Debug)]
pub struct ParticipantRegistry<H> {
    participants: HashMap<ParticipantId, Participant<H>>,
}

impl<H> Default for ParticipantRegistry<H> {
    fn default() -> Self {
        Self {
            participants: HashMap::new(),
        }
    }
}

impl<H: PeerHandle> ParticipantRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new Idle participant with the default nickname.
    ///
    /// A duplicate id should never be issued by the transport; if it happens
    /// the old entry is replaced.
    pub fn register(&mut self, id: ParticipantId, handle: H) -> &Participant<H> {
        let participant = Participant {
            id,
            nickname: DEFAULT_NICKNAME.to_string(),
            state: PairingState::Idle,
            connected_at: Instant::now(),
            handle,
        };
        if self.participants.insert(id, participant).is_some() {
            warn!(participant = %id, "duplicate registration, replacing existing entry");
        }
        &self.participants[&id]
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant<H>> {
        self.participants.get(&id)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    pub fn set_nickname(&mut self, id: ParticipantId, nickname: &str) {
        if let Some(p) = self.participants.get_mut(&id) {
            p.nickname = nickname.to_string();
        }
    }

    /// Pair `a` and `b` with each other.
    ///
    /// Both must be registered and distinct; otherwise nothing changes and
    /// `false` is returned.
    pub fn link_partners(&mut self, a: ParticipantId, b: ParticipantId) -> bool {
        if a == b || !self.contains(a) || !self.contains(b) {
            return false;
        }
        if let Some(p) = self.participants.get_mut(&a) {
            p.state = PairingState::Paired(b);
        }
        if let Some(p) = self.participants.get_mut(&b) {
            p.state = PairingState::Paired(a);
        }
        true
    }

    /// Return `id` to Idle. The former partner's link is left alone.
    pub fn unlink(&mut self, id: ParticipantId) {
        if let Some(p) = self.participants.get_mut(&id) {
            p.state = PairingState::Idle;
        }
    }

    /// Mark `id` as sitting in the waiting queue.
    pub fn mark_waiting(&mut self, id: ParticipantId) {
        if let Some(p) = self.participants.get_mut(&id) {
            p.state = PairingState::Waiting;
        }
    }

    /// Remove a participant. Absent ids return `None`.
    pub fn remove(&mut self, id: ParticipantId) -> Option<Participant<H>> {
        self.participants.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant<H>> {
        self.participants.values()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    type Handle = mpsc::UnboundedSender<ServerMessage>;

    fn registry_with(ids: &[u64]) -> ParticipantRegistry<Handle> {
        let mut reg = ParticipantRegistry::new();
        for &i in ids {
            let (tx, _rx) = mpsc::unbounded_channel();
            reg.register(ParticipantId(i), tx);
        }
        reg
    }

    #[test]
    fn register_defaults() {
        let reg = registry_with(&[1]);
        let p = reg.get(ParticipantId(1)).unwrap();
        assert_eq!(p.nickname, DEFAULT_NICKNAME);
        assert_eq!(p.state, PairingState::Idle);
        assert_eq!(p.partner(), None);
    }

    #[test]
    fn duplicate_register_overwrites() {
        let mut reg = registry_with(&[1, 2]);
        reg.set_nickname(ParticipantId(1), "old");
        reg.link_partners(ParticipantId(1), ParticipantId(2));
        let (tx, _rx) = mpsc::unbounded_channel();
        reg.register(ParticipantId(1), tx);
        let p = reg.get(ParticipantId(1)).unwrap();
        assert_eq!(p.nickname, DEFAULT_NICKNAME);
        assert_eq!(p.state, PairingState::Idle);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn link_is_symmetric() {
        let mut reg = registry_with(&[1, 2]);
        assert!(reg.link_partners(ParticipantId(1), ParticipantId(2)));
        assert_eq!(reg.get(ParticipantId(1)).unwrap().partner(), Some(ParticipantId(2)));
        assert_eq!(reg.get(ParticipantId(2)).unwrap().partner(), Some(ParticipantId(1)));
    }

    #[test]
    fn link_requires_both_and_distinct() {
        let mut reg = registry_with(&[1]);
        assert!(!reg.link_partners(ParticipantId(1), ParticipantId(9)));
        assert!(!reg.link_partners(ParticipantId(1), ParticipantId(1)));
        assert_eq!(reg.get(ParticipantId(1)).unwrap().state, PairingState::Idle);
    }

    #[test]
    fn unlink_is_one_sided() {
        let mut reg = registry_with(&[1, 2]);
        reg.link_partners(ParticipantId(1), ParticipantId(2));
        reg.unlink(ParticipantId(1));
        assert_eq!(reg.get(ParticipantId(1)).unwrap().partner(), None);
        assert_eq!(reg.get(ParticipantId(2)).unwrap().partner(), Some(ParticipantId(1)));
    }

    #[test]
    fn missing_ids_are_harmless() {
        let mut reg = registry_with(&[]);
        assert!(reg.get(ParticipantId(5)).is_none());
        reg.set_nickname(ParticipantId(5), "ghost");
        reg.unlink(ParticipantId(5));
        reg.mark_waiting(ParticipantId(5));
        assert!(reg.remove(ParticipantId(5)).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut reg = registry_with(&[3]);
        assert!(reg.remove(ParticipantId(3)).is_some());
        assert!(reg.remove(ParticipantId(3)).is_none());
    }

    #[test]
    fn send_reaches_handle() {
        let mut reg = ParticipantRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.register(ParticipantId(1), tx);
        assert!(reg.get(ParticipantId(1)).unwrap().send(ServerMessage::waiting()));
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::waiting());
    }
}
