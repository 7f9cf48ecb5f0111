//! Internal cluster events and the two FIFO queues that feed the dispatcher
//! (§3, §4.3, §4.5).

use std::collections::VecDeque;

use crate::roster::RosterEntry;
use crate::types::{EventKind, JoinResult, NodeId};

/// A single queued cluster event.
///
/// `callbacked` records that a "slow" upcall for this event — one whose
/// acceptance is not atomic with its invocation, namely a master's answer
/// to a `JoinRequest` and a `Block` awaiting its `Unblock` — has been
/// invoked at least once and must not be invoked again while the event
/// remains queued (§9 "Slow callbacks via `callbacked`").
#[derive(Debug, Clone)]
pub struct Event {
    /// The event's kind.
    pub kind: EventKind,
    /// The node that originated this event.
    pub sender: NodeId,
    /// Opaque application payload, when it has arrived.
    pub payload: Option<Vec<u8>>,
    /// Join result, present once a `JoinResponse` has mutated a queued
    /// `JoinRequest` event in place.
    pub join_result: Option<JoinResult>,
    /// Roster snapshot carried by a `JoinResponse`.
    pub roster_snapshot: Option<Vec<RosterEntry>>,
    /// Whether the slow upcall for this event has already fired.
    pub callbacked: bool,
}

impl Event {
    /// A freshly allocated event with no payload or result attached yet.
    #[must_use]
    pub fn new(kind: EventKind, sender: NodeId) -> Self {
        Self {
            kind,
            sender,
            payload: None,
            join_result: None,
            roster_snapshot: None,
            callbacked: false,
        }
    }
}

/// A single-producer, single-consumer FIFO event queue.
///
/// Both the producer (Event Intake, called from the GCS callback) and the
/// consumer (the Dispatcher) run on the same thread, so no internal locking
/// is required (§5).
#[derive(Debug, Default)]
pub struct EventQueue {
    entries: VecDeque<Event>,
}

impl EventQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Whether the queue holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Enqueue a new event at the tail.
    pub fn push(&mut self, event: Event) {
        self.entries.push_back(event);
    }

    /// The head event, without removing it.
    #[must_use]
    pub fn front(&self) -> Option<&Event> {
        self.entries.front()
    }

    /// The head event, mutably, without removing it.
    pub fn front_mut(&mut self) -> Option<&mut Event> {
        self.entries.front_mut()
    }

    /// Remove and return the head event.
    pub fn pop_front(&mut self) -> Option<Event> {
        self.entries.pop_front()
    }

    /// Find the first queued event of `kind` from `sender`, mutably.
    ///
    /// Used by intake to locate a placeholder `JoinRequest` event to mutate
    /// in place, and to locate an outstanding `Block` event to cancel.
    pub fn find_mut(&mut self, kind: EventKind, sender: NodeId) -> Option<&mut Event> {
        self.entries
            .iter_mut()
            .find(|e| e.kind == kind && e.sender == sender)
    }

    /// Remove the first queued event of `kind` from `sender`, if present.
    pub fn remove(&mut self, kind: EventKind, sender: NodeId) -> Option<Event> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.kind == kind && e.sender == sender)?;
        self.entries.remove(idx)
    }

    /// Remove every queued event of `kind` from `sender` (used when a
    /// sender departs before completing a handshake: a pending
    /// `JoinRequest` or `Block` is simply dropped).
    pub fn cancel_all(&mut self, kind: EventKind, sender: NodeId) {
        self.entries.retain(|e| !(e.kind == kind && e.sender == sender));
    }

    /// Iterate events currently queued, in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nid(n: u32) -> NodeId {
        NodeId::new(n, n * 10)
    }

    #[test]
    fn fifo_order_preserved() {
        let mut q = EventQueue::new();
        q.push(Event::new(EventKind::Notify, nid(1)));
        q.push(Event::new(EventKind::Notify, nid(2)));

        assert_eq!(q.pop_front().unwrap().sender, nid(1));
        assert_eq!(q.pop_front().unwrap().sender, nid(2));
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn find_mut_locates_matching_event() {
        let mut q = EventQueue::new();
        q.push(Event::new(EventKind::JoinRequest, nid(1)));

        let event = q.find_mut(EventKind::JoinRequest, nid(1)).unwrap();
        event.payload = Some(b"hi".to_vec());

        assert_eq!(q.front().unwrap().payload, Some(b"hi".to_vec()));
    }

    #[test]
    fn remove_takes_out_only_the_matching_event() {
        let mut q = EventQueue::new();
        q.push(Event::new(EventKind::Block, nid(1)));
        q.push(Event::new(EventKind::Block, nid(2)));

        let removed = q.remove(EventKind::Block, nid(1)).unwrap();
        assert_eq!(removed.sender, nid(1));
        assert_eq!(q.len(), 1);
        assert_eq!(q.front().unwrap().sender, nid(2));
    }

    #[test]
    fn remove_missing_is_a_noop() {
        let mut q = EventQueue::new();
        q.push(Event::new(EventKind::Block, nid(1)));
        assert!(q.remove(EventKind::Block, nid(9)).is_none());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn cancel_all_drops_every_matching_event() {
        let mut q = EventQueue::new();
        q.push(Event::new(EventKind::JoinRequest, nid(1)));
        q.push(Event::new(EventKind::Notify, nid(1)));
        q.push(Event::new(EventKind::JoinRequest, nid(1)));

        q.cancel_all(EventKind::JoinRequest, nid(1));

        assert_eq!(q.len(), 1);
        assert_eq!(q.front().unwrap().kind, EventKind::Notify);
    }
}
