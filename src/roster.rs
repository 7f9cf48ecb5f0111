//! Roster & master election (§4.4).
//!
//! The roster is the authoritative, ordered list of confirmed member nodes.
//! Master-of-roster is "the first entry whose `gone` flag is false" — no
//! external election protocol, just a deterministic rule over an agreed,
//! totally-ordered list.

use tracing::{debug, warn};

use crate::types::{NodeId, NodeInfo};

/// One roster entry: a node plus its tombstone flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// The node's identity and descriptor.
    pub info: NodeInfo,
    /// Tombstone: the node departed before the cluster finished promoting
    /// its successor, so its mastership must be revoked immediately even
    /// though the entry has not yet been physically removed.
    pub gone: bool,
}

/// The ordered, bounded-length list of confirmed member nodes (§3/§4.4).
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    max_nodes: usize,
}

impl Roster {
    /// Create an empty roster bounded at `max_nodes` entries.
    #[must_use]
    pub fn new(max_nodes: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_nodes,
        }
    }

    /// Number of entries currently held (including tombstoned ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the roster holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in roster (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.iter()
    }

    /// Clear the roster entirely. Used when a node seeds or is handed a
    /// `MASTER_TRANSFER` and must start from an empty agreed state.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Locate the index of an entry by node id, tombstoned or not.
    #[must_use]
    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.entries.iter().position(|e| e.info.id == id)
    }

    /// Append a node to the roster.
    ///
    /// Returns `false` (and does nothing) if `id` is already present — the
    /// roster never contains two entries with equal [`NodeId`] — or if the
    /// roster is already at `max_nodes`.
    pub fn add(&mut self, info: NodeInfo) -> bool {
        if self.position(info.id).is_some() {
            warn!(node_id = %info.id, "ignoring duplicate roster add");
            return false;
        }
        if self.entries.len() >= self.max_nodes {
            warn!(node_id = %info.id, max_nodes = self.max_nodes, "roster full, dropping add");
            return false;
        }
        debug!(node_id = %info.id, "adding node to roster");
        self.entries.push(RosterEntry {
            info,
            gone: false,
        });
        true
    }

    /// Remove a node from the roster by id, preserving the relative order
    /// of the remaining entries.
    ///
    /// This is the operation the §9 Open Question calls out: the original
    /// `del_cpg_node` decremented `nr_nodes` before sizing the shift,
    /// suggesting a possible off-by-one when deleting the last element.
    /// Here the invariant is enforced directly by `Vec::remove`, which
    /// shifts exactly the `len - idx - 1` entries after `idx` down by one —
    /// there is no separate length variable to get out of sync with the
    /// backing storage, so the bug class the open question worries about
    /// cannot recur. See DESIGN.md for the decision record.
    pub fn remove(&mut self, id: NodeId) -> Option<RosterEntry> {
        let idx = self.position(id)?;
        debug!(node_id = %id, "removing node from roster");
        Some(self.entries.remove(idx))
    }

    /// Mark a node's entry tombstoned (`gone = true`) without removing it.
    ///
    /// Applied at intake time — on a `Leave` multicast or a config-change
    /// left-list entry — *before* the corresponding `Leave` event is
    /// processed by the dispatcher, so a `JoinRequest` queued behind it is
    /// answered by the new master rather than silently dropped (§9).
    ///
    /// Returns `true` if the node was found (whether or not it was already
    /// tombstoned).
    pub fn mark_gone(&mut self, id: NodeId) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.info.id == id) {
            if !entry.gone {
                debug!(node_id = %id, "tombstoning roster entry");
            }
            entry.gone = true;
            true
        } else {
            false
        }
    }

    /// The current master: the first entry whose `gone` flag is false.
    ///
    /// An empty roster has no master; per §4.4 this is acceptable because a
    /// node that finds the roster empty treats itself as the first to form
    /// the cluster, a conclusion corroborated by `self_elect`.
    #[must_use]
    pub fn master(&self) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| !e.gone)
    }

    /// Whether `id` is the current master.
    ///
    /// Returns the roster index of `id` if it is the first non-tombstoned
    /// entry, `None` otherwise (not present, present but tombstoned, or
    /// present but not first).
    #[must_use]
    pub fn is_master(&self, id: NodeId) -> Option<usize> {
        let idx = self.entries.iter().position(|e| !e.gone)?;
        if self.entries[idx].info.id == id {
            Some(idx)
        } else {
            None
        }
    }

    /// Resolve a node's descriptor once its `JoinResponse` has populated it.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.info.id == id)
    }

    /// Replace the roster's contents wholesale — used when a joining node
    /// adopts the snapshot carried in its own `JoinResponse`, which is
    /// authoritative over anything accumulated locally from config-change
    /// callbacks (§9 "Roster source-of-truth on join").
    pub fn adopt_snapshot(&mut self, entries: Vec<RosterEntry>) {
        debug!(count = entries.len(), "adopting roster snapshot");
        self.entries = entries;
    }

    /// Snapshot the roster's current entries, for embedding in a
    /// `JoinResponse` or for adoption by another node.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RosterEntry> {
        self.entries.clone()
    }
}
