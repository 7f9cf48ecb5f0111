//! Local driver state shared between intake and dispatch (§3 "Local state").

use crate::event::EventQueue;
use crate::roster::Roster;
use crate::types::NodeId;

/// The mutable state a driver instance threads between Event Intake and the
/// Event Dispatcher. Both run on the same thread (§5), so no locking is
/// needed around any of this.
#[derive(Debug)]
pub struct DriverState {
    /// This node's own identity, learned from the GCS at `init` time.
    pub this_node: NodeId,
    /// The agreed roster of confirmed members.
    pub roster: Roster,
    /// Events that must be serialized one at a time cluster-wide.
    pub block_queue: EventQueue,
    /// Everything else: join handshakes, leaves, notifies.
    pub nonblock_queue: EventQueue,
    /// Monotone: once true, never resets. Gates which event kinds may
    /// advance the dispatcher (§3 invariants).
    pub join_finished: bool,
    /// Set at most once: "I have seen a `JoinRequest` event for every
    /// member the GCS currently lists" — the bootstrap self-election
    /// condition (§4.3 step 4).
    pub self_elect: bool,
    /// `floor(total/2) + 1`, armed on the first config-change with
    /// departures once the cluster had reached at least 3 nodes; `0` means
    /// not yet armed. Reset to `0` at the start of every dispatch drain
    /// (§4.5) so it re-arms per batch.
    pub majority_threshold: usize,
    /// Bound on roster length / wire node-slot count.
    pub max_nodes: usize,
}

impl DriverState {
    /// A fresh state for `this_node`, with an empty roster bounded at
    /// `max_nodes`.
    #[must_use]
    pub fn new(this_node: NodeId, max_nodes: usize) -> Self {
        Self {
            this_node,
            roster: Roster::new(max_nodes),
            block_queue: EventQueue::new(),
            nonblock_queue: EventQueue::new(),
            join_finished: false,
            self_elect: false,
            majority_threshold: 0,
            max_nodes,
        }
    }
}
