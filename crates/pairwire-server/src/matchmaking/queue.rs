//! FIFO waiting queue with O(1) removal of arbitrary members.
//!
//! Nodes live in a slab (`slots`) and are doubly linked by slot index. An
//! id -> slot map gives constant-time membership checks and lets a
//! participant leave from the middle of the queue without a scan. Freed
//! slots are recycled.

use pairwire_core::ParticipantId;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Slot {
    id: ParticipantId,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Participants awaiting a match, oldest first. Never holds duplicates.
#[derive(Debug, Default)]
pub struct WaitingQueue {
    slots: Vec<Slot>,
    index: HashMap<ParticipantId, usize>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.index.contains_key(&id)
    }

    /// Append `id` at the tail. Returns `false` (and changes nothing) if it
    /// is already queued.
    pub fn push_back(&mut self, id: ParticipantId) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }

        let slot = Slot {
            id,
            prev: self.tail,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => self.slots[tail].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.index.insert(id, idx);
        true
    }

    /// Remove and return the oldest queued id.
    pub fn pop_front(&mut self) -> Option<ParticipantId> {
        let head = self.head?;
        let id = self.slots[head].id;
        self.remove(id);
        Some(id)
    }

    /// Oldest queued id, without removing it.
    #[cfg(test)]
    pub fn peek_front(&self) -> Option<ParticipantId> {
        self.head.map(|idx| self.slots[idx].id)
    }

    /// Remove `id` from wherever it sits. Returns `false` if it was not queued.
    pub fn remove(&mut self, id: ParticipantId) -> bool {
        let Some(idx) = self.index.remove(&id) else {
            return false;
        };

        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }

        self.slots[idx].prev = None;
        self.slots[idx].next = None;
        self.free.push(idx);
        true
    }

    /// Iterate queued ids from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let idx = cursor?;
            let slot = &self.slots[idx];
            cursor = slot.next;
            Some(slot.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(q: &WaitingQueue) -> Vec<u64> {
        q.iter().map(|id| id.0).collect()
    }

    #[test]
    fn fifo_order() {
        let mut q = WaitingQueue::new();
        for i in 1..=3 {
            assert!(q.push_back(ParticipantId(i)));
        }
        assert_eq!(q.peek_front(), Some(ParticipantId(1)));
        assert_eq!(q.pop_front(), Some(ParticipantId(1)));
        assert_eq!(q.pop_front(), Some(ParticipantId(2)));
        assert_eq!(q.pop_front(), Some(ParticipantId(3)));
        assert_eq!(q.pop_front(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn duplicates_rejected() {
        let mut q = WaitingQueue::new();
        assert!(q.push_back(ParticipantId(7)));
        assert!(!q.push_back(ParticipantId(7)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn remove_middle_head_and_tail() {
        let mut q = WaitingQueue::new();
        for i in 1..=5 {
            q.push_back(ParticipantId(i));
        }
        assert!(q.remove(ParticipantId(3)));
        assert_eq!(ids(&q), vec![1, 2, 4, 5]);
        assert!(q.remove(ParticipantId(1)));
        assert_eq!(ids(&q), vec![2, 4, 5]);
        assert!(q.remove(ParticipantId(5)));
        assert_eq!(ids(&q), vec![2, 4]);
        assert!(!q.remove(ParticipantId(5)));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn removing_last_member_resets_ends() {
        let mut q = WaitingQueue::new();
        q.push_back(ParticipantId(1));
        assert!(q.remove(ParticipantId(1)));
        assert_eq!(q.peek_front(), None);
        q.push_back(ParticipantId(2));
        assert_eq!(ids(&q), vec![2]);
    }

    #[test]
    fn slots_are_recycled() {
        let mut q = WaitingQueue::new();
        for round in 0..100u64 {
            q.push_back(ParticipantId(round * 2));
            q.push_back(ParticipantId(round * 2 + 1));
            q.pop_front();
            q.remove(ParticipantId(round * 2 + 1));
        }
        assert!(q.is_empty());
        assert!(q.slots.len() <= 2);
    }

    #[test]
    fn requeue_after_removal_goes_to_tail() {
        let mut q = WaitingQueue::new();
        for i in 1..=3 {
            q.push_back(ParticipantId(i));
        }
        q.remove(ParticipantId(1));
        q.push_back(ParticipantId(1));
        assert_eq!(ids(&q), vec![2, 3, 1]);
    }
}
