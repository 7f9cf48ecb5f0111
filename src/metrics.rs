//! Driver metrics for monitoring and observability.
//!
//! Mirrors the teacher's `ClusterMetrics`: flat `AtomicU64` counters updated
//! with `Ordering::Relaxed` (single-writer per process, readers only ever
//! want an eventually-consistent snapshot) and a hand-rolled Prometheus
//! text exporter, no metrics crate involved.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::MessageKind;

/// Driver metrics collection. One instance per [`crate::driver::ClusterDriver`].
#[derive(Debug, Default)]
pub struct DriverMetrics {
    intake_join_request: AtomicU64,
    intake_join_response: AtomicU64,
    intake_leave: AtomicU64,
    intake_notify: AtomicU64,
    intake_block: AtomicU64,
    intake_unblock: AtomicU64,
    dispatch_join_request: AtomicU64,
    dispatch_join_response: AtomicU64,
    dispatch_leave: AtomicU64,
    dispatch_block: AtomicU64,
    dispatch_notify: AtomicU64,
    confchg_total: AtomicU64,
    malformed_frames_dropped: AtomicU64,
    fatal_exits_total: AtomicU64,
    block_unblock_races: AtomicU64,
    roster_len: AtomicU64,
}

impl DriverMetrics {
    /// A fresh metrics instance with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one delivered wire message of `kind`, at intake.
    pub fn record_intake(&self, kind: MessageKind) {
        let counter = match kind {
            MessageKind::JoinRequest => &self.intake_join_request,
            MessageKind::JoinResponse => &self.intake_join_response,
            MessageKind::Leave => &self.intake_leave,
            MessageKind::Notify => &self.intake_notify,
            MessageKind::Block => &self.intake_block,
            MessageKind::Unblock => &self.intake_unblock,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one event fully processed by the dispatcher, by its
    /// (post-intake) [`crate::types::EventKind`].
    pub fn record_dispatch(&self, kind: crate::types::EventKind) {
        use crate::types::EventKind;
        let counter = match kind {
            EventKind::JoinRequest => &self.dispatch_join_request,
            EventKind::JoinResponse => &self.dispatch_join_response,
            EventKind::Leave => &self.dispatch_leave,
            EventKind::Block => &self.dispatch_block,
            EventKind::Notify => &self.dispatch_notify,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one configuration-change callback.
    pub fn record_confchg(&self) {
        self.confchg_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one malformed wire frame dropped by the codec.
    pub fn record_malformed_frame(&self) {
        self.malformed_frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fatal-exit path being triggered (partition guard, NIC
    /// failure, or an unrecoverable GCS error).
    pub fn record_fatal(&self) {
        self.fatal_exits_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an observed block/unblock race: an `Unblock` with no
    /// outstanding `Block`, or a `block_requested` callback invoked more
    /// than once for the same event before it was accepted.
    pub fn record_block_unblock_race(&self) {
        self.block_unblock_races.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the current roster length gauge.
    pub fn set_roster_len(&self, len: usize) {
        self.roster_len.store(len as u64, Ordering::Relaxed);
    }

    /// Snapshot every counter at a point in time.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            intake_join_request: self.intake_join_request.load(Ordering::Relaxed),
            intake_join_response: self.intake_join_response.load(Ordering::Relaxed),
            intake_leave: self.intake_leave.load(Ordering::Relaxed),
            intake_notify: self.intake_notify.load(Ordering::Relaxed),
            intake_block: self.intake_block.load(Ordering::Relaxed),
            intake_unblock: self.intake_unblock.load(Ordering::Relaxed),
            dispatch_join_request: self.dispatch_join_request.load(Ordering::Relaxed),
            dispatch_join_response: self.dispatch_join_response.load(Ordering::Relaxed),
            dispatch_leave: self.dispatch_leave.load(Ordering::Relaxed),
            dispatch_block: self.dispatch_block.load(Ordering::Relaxed),
            dispatch_notify: self.dispatch_notify.load(Ordering::Relaxed),
            confchg_total: self.confchg_total.load(Ordering::Relaxed),
            malformed_frames_dropped: self.malformed_frames_dropped.load(Ordering::Relaxed),
            fatal_exits_total: self.fatal_exits_total.load(Ordering::Relaxed),
            block_unblock_races: self.block_unblock_races.load(Ordering::Relaxed),
            roster_len: self.roster_len.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus text-exposition format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();

        format!(
            r#"# HELP sheepdog_cluster_intake_total Wire messages accepted at intake, by kind
# TYPE sheepdog_cluster_intake_total counter
sheepdog_cluster_intake_total{{kind="join_request"}} {intake_join_request}
sheepdog_cluster_intake_total{{kind="join_response"}} {intake_join_response}
sheepdog_cluster_intake_total{{kind="leave"}} {intake_leave}
sheepdog_cluster_intake_total{{kind="notify"}} {intake_notify}
sheepdog_cluster_intake_total{{kind="block"}} {intake_block}
sheepdog_cluster_intake_total{{kind="unblock"}} {intake_unblock}

# HELP sheepdog_cluster_dispatch_total Events fully processed by the dispatcher, by kind
# TYPE sheepdog_cluster_dispatch_total counter
sheepdog_cluster_dispatch_total{{kind="join_request"}} {dispatch_join_request}
sheepdog_cluster_dispatch_total{{kind="join_response"}} {dispatch_join_response}
sheepdog_cluster_dispatch_total{{kind="leave"}} {dispatch_leave}
sheepdog_cluster_dispatch_total{{kind="block"}} {dispatch_block}
sheepdog_cluster_dispatch_total{{kind="notify"}} {dispatch_notify}

# HELP sheepdog_cluster_confchg_total Configuration-change callbacks received
# TYPE sheepdog_cluster_confchg_total counter
sheepdog_cluster_confchg_total {confchg_total}

# HELP sheepdog_cluster_malformed_frames_dropped_total Wire frames dropped for failing to decode
# TYPE sheepdog_cluster_malformed_frames_dropped_total counter
sheepdog_cluster_malformed_frames_dropped_total {malformed_frames_dropped}

# HELP sheepdog_cluster_fatal_exits_total Fatal-exit paths triggered
# TYPE sheepdog_cluster_fatal_exits_total counter
sheepdog_cluster_fatal_exits_total {fatal_exits_total}

# HELP sheepdog_cluster_block_unblock_races_total Observed block/unblock races
# TYPE sheepdog_cluster_block_unblock_races_total counter
sheepdog_cluster_block_unblock_races_total {block_unblock_races}

# HELP sheepdog_cluster_roster_len Current roster length
# TYPE sheepdog_cluster_roster_len gauge
sheepdog_cluster_roster_len {roster_len}
"#,
            intake_join_request = s.intake_join_request,
            intake_join_response = s.intake_join_response,
            intake_leave = s.intake_leave,
            intake_notify = s.intake_notify,
            intake_block = s.intake_block,
            intake_unblock = s.intake_unblock,
            dispatch_join_request = s.dispatch_join_request,
            dispatch_join_response = s.dispatch_join_response,
            dispatch_leave = s.dispatch_leave,
            dispatch_block = s.dispatch_block,
            dispatch_notify = s.dispatch_notify,
            confchg_total = s.confchg_total,
            malformed_frames_dropped = s.malformed_frames_dropped,
            fatal_exits_total = s.fatal_exits_total,
            block_unblock_races = s.block_unblock_races,
            roster_len = s.roster_len,
        )
    }
}

/// Snapshot of driver metrics at a point in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub intake_join_request: u64,
    pub intake_join_response: u64,
    pub intake_leave: u64,
    pub intake_notify: u64,
    pub intake_block: u64,
    pub intake_unblock: u64,
    pub dispatch_join_request: u64,
    pub dispatch_join_response: u64,
    pub dispatch_leave: u64,
    pub dispatch_block: u64,
    pub dispatch_notify: u64,
    pub confchg_total: u64,
    pub malformed_frames_dropped: u64,
    pub fatal_exits_total: u64,
    pub block_unblock_races: u64,
    pub roster_len: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intake_counters_are_split_by_kind() {
        let metrics = DriverMetrics::new();
        metrics.record_intake(MessageKind::JoinRequest);
        metrics.record_intake(MessageKind::JoinRequest);
        metrics.record_intake(MessageKind::Leave);

        let snap = metrics.snapshot();
        assert_eq!(snap.intake_join_request, 2);
        assert_eq!(snap.intake_leave, 1);
        assert_eq!(snap.intake_notify, 0);
    }

    #[test]
    fn prometheus_export_contains_updated_counters() {
        let metrics = DriverMetrics::new();
        metrics.record_fatal();
        metrics.record_fatal();

        let text = metrics.to_prometheus();
        assert!(text.contains("sheepdog_cluster_fatal_exits_total 2"));
    }

    #[test]
    fn roster_len_gauge_reflects_last_set_value() {
        let metrics = DriverMetrics::new();
        metrics.set_roster_len(3);
        assert_eq!(metrics.snapshot().roster_len, 3);
    }
}
