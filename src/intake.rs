//! Event Intake (§4.3): turns raw GCS callbacks into cluster events.
//!
//! Two entry points, matching the GCS's two callback types: [`on_deliver`]
//! for a multicast message, [`on_config_change`] for a membership change.
//! Both run on the GCS's callback thread (conceptually — in this driver,
//! the same thread that owns [`crate::driver::ClusterDriver`]) and must
//! return promptly; neither blocks.
//!
//! A note on the wire envelope's `sender` field: for `JoinRequest`, `Leave`,
//! `Block`, `Unblock`, and `Notify`, the sender is whoever multicast the
//! message. For `JoinResponse`, the *answering master* is the one who
//! calls the GCS's send primitive, but it sets the envelope's `sender`
//! field to the *joining* node's identity (echoing the request), which is
//! what lets intake locate the matching queued `JoinRequest` event purely
//! from the envelope (§4.3 "locate the matching JOIN_REQUEST event").

use tracing::{debug, warn};

use crate::codec::WireEnvelope;
use crate::driver::FatalSink;
use crate::event::Event;
use crate::metrics::DriverMetrics;
use crate::state::DriverState;
use crate::types::{EventKind, MessageKind, NodeId};

/// Handle one delivered multicast message.
pub fn on_deliver(state: &mut DriverState, env: WireEnvelope, metrics: &DriverMetrics) {
    metrics.record_intake(env.kind);

    match env.kind {
        MessageKind::JoinRequest => {
            match state.nonblock_queue.find_mut(EventKind::JoinRequest, env.sender.id) {
                Some(event) => event.payload = Some(env.payload),
                None => warn!(
                    sender = %env.sender.id,
                    "JOIN_REQUEST delivered with no placeholder event queued; dropping"
                ),
            }
        }

        MessageKind::JoinResponse => {
            match state.nonblock_queue.find_mut(EventKind::JoinRequest, env.sender.id) {
                Some(event) => {
                    event.kind = EventKind::JoinResponse;
                    event.join_result = Some(env.result);
                    event.roster_snapshot = Some(env.nodes);
                    event.payload = Some(env.payload);
                }
                None => warn!(
                    sender = %env.sender.id,
                    "JOIN_RESPONSE delivered with no matching JOIN_REQUEST queued; dropping"
                ),
            }
        }

        MessageKind::Notify => {
            let mut event = Event::new(EventKind::Notify, env.sender.id);
            event.payload = Some(env.payload);
            state.nonblock_queue.push(event);
        }

        MessageKind::Block => {
            let mut event = Event::new(EventKind::Block, env.sender.id);
            event.payload = Some(env.payload);
            state.block_queue.push(event);
        }

        MessageKind::Unblock => {
            // Idempotent: no-op if no matching BLOCK is outstanding.
            if state.block_queue.remove(EventKind::Block, env.sender.id).is_none() {
                debug!(sender = %env.sender.id, "UNBLOCK with no outstanding BLOCK; ignoring");
            }
        }

        MessageKind::Leave => {
            if state.roster.is_master(env.sender.id).is_some() {
                state.roster.mark_gone(env.sender.id);
            }
            state.nonblock_queue.push(Event::new(EventKind::Leave, env.sender.id));
        }
    }
}

/// Handle one membership (configuration) change.
pub fn on_config_change(
    state: &mut DriverState,
    member: &[NodeId],
    joined: &[NodeId],
    left: &[NodeId],
    fatal: &dyn FatalSink,
    metrics: &DriverMetrics,
) {
    metrics.record_confchg();

    // --- Partition guard (§4.3 step 1) ---
    let total = member.len() + left.len();
    if state.majority_threshold == 0 && !left.is_empty() && total > 2 {
        state.majority_threshold = total / 2 + 1;
        debug!(threshold = state.majority_threshold, total, "armed partition guard");
    }
    if state.majority_threshold > 0 {
        if member.is_empty() {
            metrics.record_fatal();
            fatal.fatal("NIC failure?");
        }
        if member.len() < state.majority_threshold {
            metrics.record_fatal();
            fatal.fatal("Network partition detected");
        }
    }

    // --- Left-list processing (§4.3 step 2) ---
    for &id in left {
        state.nonblock_queue.cancel_all(EventKind::JoinRequest, id);
        state.block_queue.cancel_all(EventKind::Block, id);
        if state.roster.is_master(id).is_some() {
            state.roster.mark_gone(id);
        }
        state.nonblock_queue.push(Event::new(EventKind::Leave, id));
    }

    // --- Joined-list processing (§4.3 step 3) ---
    for &id in joined {
        state.nonblock_queue.push(Event::new(EventKind::JoinRequest, id));
    }

    // --- Self-election (§4.3 step 4) ---
    if !state.self_elect && !state.join_finished {
        let all_have_events = member.iter().all(|id| {
            state
                .nonblock_queue
                .iter()
                .any(|e| e.sender == *id && matches!(e.kind, EventKind::JoinRequest | EventKind::JoinResponse))
        });
        if all_have_events && !member.is_empty() {
            debug!("self-election condition satisfied");
            state.self_elect = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::test_support::PanicFatalSink;
    use crate::types::JoinResult;

    fn nid(n: u32) -> NodeId {
        NodeId::new(n, n * 10)
    }

    fn new_state(this: NodeId) -> DriverState {
        DriverState::new(this, 16)
    }

    fn envelope(kind: MessageKind, sender: NodeId) -> WireEnvelope {
        WireEnvelope {
            sender: crate::types::NodeInfo::unresolved(sender),
            sender_gone: false,
            kind,
            result: JoinResult::Success,
            nodes: Vec::new(),
            payload: Vec::new(),
        }
    }

    #[test]
    fn join_request_confchg_then_multicast_fills_in_payload() {
        let mut state = new_state(nid(1));
        let metrics = DriverMetrics::new();

        on_config_change(&mut state, &[nid(1)], &[nid(1)], &[], &PanicFatalSink, &metrics);
        assert!(state.self_elect);

        let mut env = envelope(MessageKind::JoinRequest, nid(1));
        env.payload = b"payload".to_vec();
        on_deliver(&mut state, env, &metrics);

        let event = state.nonblock_queue.front().unwrap();
        assert_eq!(event.payload, Some(b"payload".to_vec()));
    }

    #[test]
    fn join_response_mutates_matching_request_in_place() {
        let mut state = new_state(nid(1));
        let metrics = DriverMetrics::new();

        state.nonblock_queue.push(Event::new(EventKind::JoinRequest, nid(2)));

        let mut env = envelope(MessageKind::JoinResponse, nid(2));
        env.result = JoinResult::Success;
        on_deliver(&mut state, env, &metrics);

        let event = state.nonblock_queue.front().unwrap();
        assert_eq!(event.kind, EventKind::JoinResponse);
        assert_eq!(event.join_result, Some(JoinResult::Success));
    }

    #[test]
    fn join_response_with_no_matching_request_is_dropped() {
        let mut state = new_state(nid(1));
        let metrics = DriverMetrics::new();

        on_deliver(&mut state, envelope(MessageKind::JoinResponse, nid(9)), &metrics);
        assert!(state.nonblock_queue.is_empty());
    }

    #[test]
    fn unblock_cancels_matching_block() {
        let mut state = new_state(nid(1));
        let metrics = DriverMetrics::new();

        on_deliver(&mut state, envelope(MessageKind::Block, nid(2)), &metrics);
        assert_eq!(state.block_queue.len(), 1);

        on_deliver(&mut state, envelope(MessageKind::Unblock, nid(2)), &metrics);
        assert!(state.block_queue.is_empty());
    }

    #[test]
    fn unblock_with_no_block_is_a_harmless_noop() {
        let mut state = new_state(nid(1));
        let metrics = DriverMetrics::new();

        on_deliver(&mut state, envelope(MessageKind::Unblock, nid(9)), &metrics);
        assert!(state.block_queue.is_empty());
    }

    #[test]
    fn leave_tombstones_master_before_leave_event_is_processed() {
        let mut state = new_state(nid(1));
        let metrics = DriverMetrics::new();
        state.roster.add(crate::types::NodeInfo::unresolved(nid(1)));

        on_deliver(&mut state, envelope(MessageKind::Leave, nid(1)), &metrics);

        assert!(state.roster.get(nid(1)).unwrap().gone);
        assert_eq!(state.nonblock_queue.front().unwrap().kind, EventKind::Leave);
    }

    #[test]
    fn left_list_cancels_pending_join_and_block_for_departed_node() {
        let mut state = new_state(nid(1));
        let metrics = DriverMetrics::new();

        state.nonblock_queue.push(Event::new(EventKind::JoinRequest, nid(4)));
        state.block_queue.push(Event::new(EventKind::Block, nid(4)));

        on_config_change(&mut state, &[nid(1)], &[], &[nid(4)], &PanicFatalSink, &metrics);

        assert!(state.block_queue.is_empty());
        // the JoinRequest placeholder for 4 was cancelled, but a Leave event was queued
        let kinds: Vec<_> = state.nonblock_queue.iter().map(|e| (e.kind, e.sender)).collect();
        assert_eq!(kinds, vec![(EventKind::Leave, nid(4))]);
    }

    #[test]
    fn two_of_two_nodes_leaving_does_not_arm_partition_guard() {
        let mut state = new_state(nid(1));
        let metrics = DriverMetrics::new();

        // member={1}, left={2}: total=2, guard requires total>2.
        on_config_change(&mut state, &[nid(1)], &[], &[nid(2)], &PanicFatalSink, &metrics);
        assert_eq!(state.majority_threshold, 0);
    }

    #[test]
    #[should_panic(expected = "Network partition detected")]
    fn three_nodes_two_leaving_triggers_partition_abort() {
        let mut state = new_state(nid(1));
        let metrics = DriverMetrics::new();

        on_config_change(
            &mut state,
            &[nid(1)],
            &[],
            &[nid(2), nid(3)],
            &PanicFatalSink,
            &metrics,
        );
    }

    #[test]
    fn self_elect_requires_every_member_to_have_a_queued_join_event() {
        let mut state = new_state(nid(1));
        let metrics = DriverMetrics::new();

        on_config_change(&mut state, &[nid(1), nid(2)], &[nid(2)], &[], &PanicFatalSink, &metrics);
        // member 1 has no queued JoinRequest event yet (only 2 does, from joined-list).
        assert!(!state.self_elect);
    }
}
