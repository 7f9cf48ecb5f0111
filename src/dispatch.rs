//! Event Dispatcher (§4.5): drains the two event queues in priority order,
//! gates processing on `join_finished`, and invokes the upcall interface.
//!
//! `dispatch()` is called after every intake call (§4.3 step 5) and must
//! never itself be the source of a suspension point (§5) — a failed or
//! stalled step simply stops draining and waits for the next GCS callback
//! to re-enter.

use tracing::{debug, warn};

use crate::codec::{self, WireEnvelope};
use crate::driver::FatalSink;
use crate::metrics::DriverMetrics;
use crate::state::DriverState;
use crate::transport::GroupTransport;
use crate::types::{EventKind, JoinResult, MessageKind, NodeInfo};
use crate::upcall::ClusterHandler;

/// Drain as much as the current state allows, then return.
///
/// Backpressure: if the transport still has GCS input waiting, return
/// immediately without touching either queue — the next call (once the
/// GCS has delivered everything in the current batch) sees the complete
/// picture (§4.5 "Backpressure against intake reordering").
pub fn dispatch(
    state: &mut DriverState,
    transport: &mut dyn GroupTransport,
    handler: &mut dyn ClusterHandler,
    fatal: &dyn FatalSink,
    metrics: &DriverMetrics,
) {
    if transport.has_pending() {
        return;
    }

    // Re-arm per batch: a threshold computed mid-batch by intake stays in
    // effect for the rest of that batch, but does not carry into the next.
    state.majority_threshold = 0;

    loop {
        let from_nonblock = !state.nonblock_queue.is_empty();
        if !from_nonblock && state.block_queue.is_empty() {
            break;
        }

        if !state.join_finished && !apply_pre_join_gate(state, from_nonblock) {
            break;
        }

        let progressed = if from_nonblock {
            process_nonblock_head(state, transport, handler, fatal, metrics)
        } else {
            process_block_head(state, handler, metrics)
        };

        if !progressed {
            break;
        }
    }
}

/// Pre-join gating (§4.5). Returns `false` to stop draining.
///
/// A `JoinResponse` advances regardless of sender (§3 invariant: "only
/// `JOIN_REQUEST` and `JOIN_RESPONSE` events may advance the Dispatcher" is
/// unqualified by sender) — only the *own-sender* case additionally adopts
/// the roster snapshot and flips `join_finished`; a foreign `JoinResponse`
/// falls through to the ordinary per-event processing below it.
fn apply_pre_join_gate(state: &mut DriverState, from_nonblock: bool) -> bool {
    if !from_nonblock {
        // Only a BLOCK can be head of the block queue, and BLOCK may not
        // advance before join_finished (§3 invariant); nothing to gate in.
        return false;
    }

    let Some(head) = state.nonblock_queue.front() else {
        return false;
    };
    let kind = head.kind;
    let sender = head.sender;

    match kind {
        EventKind::JoinRequest if state.self_elect => {
            debug!("self-elected: becoming seed master");
            state.roster.clear();
            state.join_finished = true;
            true
        }
        EventKind::JoinResponse if sender == state.this_node => {
            let Some(event) = state.nonblock_queue.front_mut() else {
                return false;
            };
            let snapshot = event.roster_snapshot.take().unwrap_or_default();
            debug!(count = snapshot.len(), "adopting roster snapshot from own JOIN_RESPONSE");
            state.roster.adopt_snapshot(snapshot);
            state.join_finished = true;
            true
        }
        EventKind::JoinResponse => true,
        _ => false,
    }
}

fn process_nonblock_head(
    state: &mut DriverState,
    transport: &mut dyn GroupTransport,
    handler: &mut dyn ClusterHandler,
    fatal: &dyn FatalSink,
    metrics: &DriverMetrics,
) -> bool {
    let Some(head) = state.nonblock_queue.front() else {
        return false;
    };
    match head.kind {
        EventKind::JoinRequest => process_join_request(state, transport, handler, fatal, metrics),
        EventKind::JoinResponse => process_join_response(state, handler, fatal, metrics),
        EventKind::Leave => process_leave(state, handler, metrics),
        EventKind::Notify => process_notify(state, handler, metrics),
        EventKind::Block => unreachable!("BLOCK events are queued on block_queue, not nonblock_queue"),
    }
}

/// A node's roster entry is considered "this node is master" under the
/// same rule §4.4 gives `Roster::master`/`is_master`, extended for the
/// bootstrap case: an empty roster has no master on record, but the node
/// that just self-elected treats itself as the seed (§4.4).
fn acting_as_master(state: &DriverState) -> bool {
    state.roster.is_empty() || state.roster.is_master(state.this_node).is_some()
}

fn process_join_request(
    state: &mut DriverState,
    transport: &mut dyn GroupTransport,
    handler: &mut dyn ClusterHandler,
    fatal: &dyn FatalSink,
    metrics: &DriverMetrics,
) -> bool {
    if !acting_as_master(state) {
        return false;
    }

    let Some(event) = state.nonblock_queue.front() else {
        return false;
    };
    if event.callbacked {
        return false;
    }
    let Some(payload) = event.payload.clone() else {
        return false;
    };
    let sender = event.sender;

    let result = handler.check_join(sender, &payload);
    debug!(sender = %sender, result = ?result, "check_join decided");

    if result == JoinResult::MasterTransfer {
        state.roster.clear();
    }

    let env = WireEnvelope {
        sender: NodeInfo::unresolved(sender),
        sender_gone: false,
        kind: MessageKind::JoinResponse,
        result,
        nodes: state.roster.snapshot(),
        payload,
    };
    let (header, body) = codec::encode(&env, state.max_nodes);

    // check_join already fired and must not fire again (§3 invariant), so a
    // failed reply here — transient or not — cannot be retried by redoing
    // this step; it only gets logged. A stuck handshake of this kind is the
    // operator's signal that the GCS itself is unhealthy.
    if let Err(err) = transport.mcast(header, body) {
        warn!(sender = %sender, error = ?err, "JOIN_RESPONSE multicast failed");
    }

    let Some(event) = state.nonblock_queue.front_mut() else {
        return false;
    };
    event.callbacked = true;
    metrics.record_dispatch(EventKind::JoinRequest);

    if result == JoinResult::MasterTransfer {
        metrics.record_fatal();
        fatal.fatal("master transfer: relinquishing mastership to the joining node");
    }

    false
}

fn process_join_response(
    state: &mut DriverState,
    handler: &mut dyn ClusterHandler,
    fatal: &dyn FatalSink,
    metrics: &DriverMetrics,
) -> bool {
    let Some(event) = state.nonblock_queue.pop_front() else {
        return false;
    };
    let result = event.join_result.unwrap_or(JoinResult::Fail);
    let payload = event.payload.clone().unwrap_or_default();

    if result.appends_to_roster() {
        state.roster.add(NodeInfo::unresolved(event.sender));
    }
    handler.join_completed(event.sender, &state.roster, result, &payload);
    metrics.record_dispatch(EventKind::JoinResponse);

    if event.sender == state.this_node && result == JoinResult::MasterTransfer {
        metrics.record_fatal();
        fatal.fatal("master transfer: instructed to retry once the master is back up");
    }

    true
}

fn process_leave(state: &mut DriverState, handler: &mut dyn ClusterHandler, metrics: &DriverMetrics) -> bool {
    let Some(event) = state.nonblock_queue.pop_front() else {
        return false;
    };
    state.roster.remove(event.sender);
    handler.leave_completed(event.sender, &state.roster);
    metrics.record_dispatch(EventKind::Leave);
    true
}

fn process_notify(state: &mut DriverState, handler: &mut dyn ClusterHandler, metrics: &DriverMetrics) -> bool {
    let Some(event) = state.nonblock_queue.pop_front() else {
        return false;
    };
    let payload = event.payload.unwrap_or_default();
    handler.notify_received(event.sender, &payload);
    metrics.record_dispatch(EventKind::Notify);
    true
}

fn process_block_head(state: &mut DriverState, handler: &mut dyn ClusterHandler, metrics: &DriverMetrics) -> bool {
    let Some(event) = state.block_queue.front() else {
        return false;
    };
    if event.callbacked {
        return false;
    }
    let sender = event.sender;

    if handler.block_requested(sender) {
        let Some(event) = state.block_queue.front_mut() else {
            return false;
        };
        event.callbacked = true;
        metrics.record_dispatch(EventKind::Block);
    } else {
        warn!(sender = %sender, "block_requested declined; will retry on a later dispatch");
    }

    false
}
