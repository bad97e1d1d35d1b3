//! Bounded, time-ordered history of received snapshots.
//!
//! [`SnapshotStore`] is a FIFO ring: once `capacity` entries are held, each
//! ingestion evicts the oldest. Entries are shared as [`Arc`]s so that
//! [`SnapshotStore::window`] can hand out a point-in-time copy without
//! cloning snapshot payloads, and without ever exposing the live buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossway_types::Snapshot;

/// A snapshot together with its local receipt time. Never mutated after
/// insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSnapshot {
    /// When the dashboard received the snapshot.
    pub received_at: DateTime<Utc>,
    /// The snapshot exactly as received.
    pub snapshot: Snapshot,
}

/// Fixed-capacity FIFO history of snapshots in arrival order.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    entries: VecDeque<Arc<RecordedSnapshot>>,
    capacity: usize,
}

impl SnapshotStore {
    /// Create an empty store holding at most `capacity` snapshots.
    ///
    /// A capacity of zero is raised to one so the latest snapshot is
    /// always retrievable.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a snapshot, evicting the oldest entry when full.
    pub fn ingest(&mut self, snapshot: Snapshot, received_at: DateTime<Utc>) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Arc::new(RecordedSnapshot {
            received_at,
            snapshot,
        }));
    }

    /// The most recently ingested snapshot, if any.
    pub fn latest(&self) -> Option<&Arc<RecordedSnapshot>> {
        self.entries.back()
    }

    /// The oldest snapshot still held, if any.
    pub fn oldest(&self) -> Option<&Arc<RecordedSnapshot>> {
        self.entries.front()
    }

    /// The last `n` entries in arrival order (fewer if history is shorter).
    pub fn window(&self, n: usize) -> Vec<Arc<RecordedSnapshot>> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Empty the buffer.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of snapshots held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no snapshot has been ingested since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of snapshots held.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
