//! Upcall interface (§4.6): the five callbacks the host daemon implements.
//!
//! None of these may block indefinitely. Payload buffers are borrowed for
//! the duration of the call and must not be retained by the host. None may
//! call back into the driver's send functions synchronously except
//! `check_join`, whose response is multicast by the dispatcher itself once
//! the callback returns.

use crate::roster::Roster;
use crate::types::{JoinResult, NodeId};

/// Host-implemented cluster event handlers.
///
/// A `ClusterDriver` (see [`crate::driver`]) holds a `Box<dyn ClusterHandler>`
/// and invokes exactly one of these methods per dispatched event, in the
/// order described by §4.5's per-event processing table.
pub trait ClusterHandler {
    /// Adjudicate a join request from `sender`, carrying its opaque
    /// `payload`. Only ever invoked on the current master, and at most once
    /// per event (the dispatcher gates re-invocation via `callbacked`).
    fn check_join(&mut self, sender: NodeId, payload: &[u8]) -> JoinResult;

    /// A join has been fully processed: `roster` reflects the post-update
    /// state, `result` is the join's outcome, and `payload` is whatever the
    /// master attached to its `JoinResponse`.
    fn join_completed(&mut self, sender: NodeId, roster: &Roster, result: JoinResult, payload: &[u8]);

    /// `sender` has left the cluster; `roster` no longer contains it.
    fn leave_completed(&mut self, sender: NodeId, roster: &Roster);

    /// `sender` is requesting a cluster-wide serialized operation.
    ///
    /// Returns `true` if the host accepts the block now (the dispatcher
    /// marks the event `callbacked` and awaits the matching `Unblock`), or
    /// `false` to be retried on a later dispatch.
    fn block_requested(&mut self, sender: NodeId) -> bool;

    /// `sender` has multicast an application-level notification.
    fn notify_received(&mut self, sender: NodeId, payload: &[u8]);
}
