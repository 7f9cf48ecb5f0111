//! GCS adapter boundary (§4.1): the trait a real corosync/CPG binding would
//! implement, plus a `LoopbackTransport` reference implementation used by
//! this crate's own tests and suitable for single-process demos.
//!
//! This mirrors the teacher's `NetworkTransport`, which is likewise a
//! documented stand-in for a full gRPC transport — "In a full
//! implementation: ...". Here the full implementation would bind to
//! `libcpg`/`corosync-cfg` via FFI, which is out of scope for this crate;
//! the trait boundary is what makes that swap a drop-in replacement later.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use bytes::Bytes;

use crate::types::NodeId;

/// This node's identity as learned from the GCS during `init` (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIdentity {
    /// The id the GCS assigned this process.
    pub id: NodeId,
}

/// Failure returned by [`GroupTransport::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// Transient unavailability; the caller retries with backoff.
    TryAgain,
    /// Non-transient failure; the caller gives up after exhausting its
    /// retry budget.
    Fatal(String),
}

/// Failure returned by [`GroupTransport::mcast`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Transient unavailability; the caller retries indefinitely with
    /// backoff (§4.1).
    TryAgain,
    /// Permission denied sending to this group.
    Denied(String),
    /// Any other non-transient failure.
    Other(String),
}

/// One pending item delivered by the GCS to a member of the group.
#[derive(Debug, Clone)]
pub enum GroupEvent {
    /// A multicast message delivered in total order.
    Deliver {
        /// The fixed-size envelope header segment.
        header: Bytes,
        /// The trailing opaque payload segment.
        payload: Bytes,
    },
    /// A membership (configuration) change.
    ConfigChange {
        /// The full current member list.
        member: Vec<NodeId>,
        /// Nodes that joined since the previous config-change.
        joined: Vec<NodeId>,
        /// Nodes that left since the previous config-change.
        left: Vec<NodeId>,
    },
    /// The GCS connection was lost (`HUP`-class event, §4.1): fatal.
    TransportLost,
}

/// The boundary between this driver and a real group-communication
/// service. A production implementation binds this to `libcpg`; the
/// `LoopbackTransport` below is the reference implementation used for
/// tests and in-process demos.
pub trait GroupTransport {
    /// Join the named group and learn this node's identity. Retried by the
    /// caller on [`InitError::TryAgain`] (§4.1).
    fn init(&mut self, group_name: [u8; 8]) -> Result<LocalIdentity, InitError>;

    /// Non-blocking check for whether the GCS has more input waiting.
    /// Backs the dispatcher's backpressure rule (§4.5): it must not drain
    /// its queues while this returns `true`.
    fn has_pending(&self) -> bool;

    /// Pop and return the next pending group event, if any.
    fn next_event(&mut self) -> Option<GroupEvent>;

    /// Multicast a two-segment envelope to the group. Retried by the caller
    /// indefinitely on [`SendError::TryAgain`] (§4.1).
    fn mcast(&mut self, header: Bytes, payload: Bytes) -> Result<(), SendError>;

    /// This process's local address, as 16 bytes (§4.1 `local_addr`):
    /// native for IPv6, IPv4-mapped-placement for IPv4.
    fn local_addr(&self) -> [u8; 16];
}

/// Render an IPv4 address as the 16-byte buffer `local_addr` returns:
/// a dotted quad zero-padded left into the last four bytes (§4.1).
#[must_use]
pub fn ipv4_mapped(addr: [u8; 4]) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[12..16].copy_from_slice(&addr);
    buf
}

/// In-memory group bus shared by every [`LoopbackTransport`] handle in a
/// test or demo, simulating a GCS's totally-ordered, virtually-synchronous
/// multicast and membership notifications.
#[derive(Debug, Default)]
pub struct LoopbackBus {
    member_order: Vec<NodeId>,
    inboxes: HashMap<NodeId, VecDeque<GroupEvent>>,
}

impl LoopbackBus {
    /// A bus with no members yet.
    #[must_use]
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Admit `id` to the group: registers its inbox and fans a
    /// `ConfigChange` out to every member (old and new) reflecting the join.
    pub fn join(&mut self, id: NodeId) {
        self.inboxes.entry(id).or_default();
        self.member_order.push(id);
        self.broadcast_confchg(self.member_order.clone(), vec![id], Vec::new());
    }

    /// Remove `id` from the group: fans a `ConfigChange` out to the
    /// remaining members reflecting the departure. The departing node's
    /// inbox is left intact so any events already queued for it are still
    /// deliverable (the GCS does not destroy a node's mailbox retroactively).
    pub fn leave(&mut self, id: NodeId) {
        self.member_order.retain(|&m| m != id);
        self.broadcast_confchg(self.member_order.clone(), Vec::new(), vec![id]);
    }

    /// Deliver several simultaneous departures in a single config-change,
    /// as happens during a network partition (§8 scenario 4).
    pub fn leave_many(&mut self, ids: &[NodeId]) {
        self.member_order.retain(|m| !ids.contains(m));
        self.broadcast_confchg(self.member_order.clone(), Vec::new(), ids.to_vec());
    }

    /// Multicast a message to every current member (the GCS delivers to
    /// the sender too, per virtual synchrony).
    pub fn mcast(&mut self, header: Bytes, payload: Bytes) {
        for id in self.member_order.clone() {
            self.inboxes.entry(id).or_default().push_back(GroupEvent::Deliver {
                header: header.clone(),
                payload: payload.clone(),
            });
        }
    }

    /// Simulate only a subset of the current members receiving the
    /// multicast — used to build a minority-partition view in tests.
    pub fn mcast_to(&mut self, recipients: &[NodeId], header: Bytes, payload: Bytes) {
        for id in recipients {
            self.inboxes.entry(*id).or_default().push_back(GroupEvent::Deliver {
                header: header.clone(),
                payload: payload.clone(),
            });
        }
    }

    fn broadcast_confchg(&mut self, member: Vec<NodeId>, joined: Vec<NodeId>, left: Vec<NodeId>) {
        for id in &member {
            self.inboxes.entry(*id).or_default().push_back(GroupEvent::ConfigChange {
                member: member.clone(),
                joined: joined.clone(),
                left: left.clone(),
            });
        }
    }

    fn has_pending(&self, id: NodeId) -> bool {
        self.inboxes.get(&id).is_some_and(|q| !q.is_empty())
    }

    fn next_event(&mut self, id: NodeId) -> Option<GroupEvent> {
        self.inboxes.get_mut(&id)?.pop_front()
    }
}

/// A [`GroupTransport`] backed by a shared [`LoopbackBus`]. Not a
/// production transport — it has no network I/O — but it implements the
/// exact same contract a real corosync binding would, so the driver code
/// exercising it is the same code that would run against the real thing.
#[derive(Debug)]
pub struct LoopbackTransport {
    bus: Rc<RefCell<LoopbackBus>>,
    id: NodeId,
    addr: [u8; 16],
}

impl LoopbackTransport {
    /// Build a handle for `id` on `bus`. Does not itself join the bus —
    /// call [`LoopbackBus::join`] (typically from `init`, see below).
    #[must_use]
    pub fn new(bus: Rc<RefCell<LoopbackBus>>, id: NodeId, addr: [u8; 16]) -> Self {
        Self { bus, id, addr }
    }
}

impl GroupTransport for LoopbackTransport {
    fn init(&mut self, _group_name: [u8; 8]) -> Result<LocalIdentity, InitError> {
        self.bus.borrow_mut().join(self.id);
        Ok(LocalIdentity { id: self.id })
    }

    fn has_pending(&self) -> bool {
        self.bus.borrow().has_pending(self.id)
    }

    fn next_event(&mut self) -> Option<GroupEvent> {
        self.bus.borrow_mut().next_event(self.id)
    }

    fn mcast(&mut self, header: Bytes, payload: Bytes) -> Result<(), SendError> {
        self.bus.borrow_mut().mcast(header, payload);
        Ok(())
    }

    fn local_addr(&self) -> [u8; 16] {
        self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_mapped_places_address_in_last_four_bytes() {
        let mapped = ipv4_mapped([10, 0, 0, 1]);
        assert_eq!(&mapped[..12], &[0u8; 12]);
        assert_eq!(&mapped[12..], &[10, 0, 0, 1]);
    }

    #[test]
    fn loopback_transport_delivers_confchg_on_join() {
        let bus = LoopbackBus::new();
        let a = NodeId::new(1, 100);
        let mut ta = LoopbackTransport::new(Rc::clone(&bus), a, ipv4_mapped([127, 0, 0, 1]));

        ta.init(*b"sheepdog").unwrap();

        let event = ta.next_event().unwrap();
        match event {
            GroupEvent::ConfigChange { member, joined, left } => {
                assert_eq!(member, vec![a]);
                assert_eq!(joined, vec![a]);
                assert!(left.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn loopback_transport_fans_out_mcast_to_all_members() {
        let bus = LoopbackBus::new();
        let a = NodeId::new(1, 100);
        let b = NodeId::new(2, 200);
        let mut ta = LoopbackTransport::new(Rc::clone(&bus), a, ipv4_mapped([127, 0, 0, 1]));
        let mut tb = LoopbackTransport::new(Rc::clone(&bus), b, ipv4_mapped([127, 0, 0, 2]));

        ta.init(*b"sheepdog").unwrap();
        tb.init(*b"sheepdog").unwrap();

        // Drain the confchg events from both inboxes first.
        while ta.has_pending() {
            ta.next_event();
        }
        while tb.has_pending() {
            tb.next_event();
        }

        ta.mcast(Bytes::from_static(b"hdr"), Bytes::from_static(b"payload"))
            .unwrap();

        assert!(ta.has_pending());
        assert!(tb.has_pending());
    }
}
