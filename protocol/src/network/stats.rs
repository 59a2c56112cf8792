//! Lock-free counters describing what a node has done so far.
//!
//! The library only counts; the binary decides whether to export the numbers
//! (see the node's Prometheus endpoint).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running totals for one node. Every field only ever increases.
#[derive(Debug, Default)]
pub struct NodeStats {
    messages_accepted: AtomicU64,
    duplicates_dropped: AtomicU64,
    messages_originated: AtomicU64,
    frames_queued: AtomicU64,
    broadcast_failures: AtomicU64,
    streams_opened: AtomicU64,
    streams_closed: AtomicU64,
}

/// Point-in-time copy of [`NodeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Network messages seen for the first time.
    pub messages_accepted: u64,
    /// Network messages dropped as already seen.
    pub duplicates_dropped: u64,
    /// Messages created by this node.
    pub messages_originated: u64,
    /// Per-peer frames handed to outbound queues.
    pub frames_queued: u64,
    /// Sends that failed because the peer's stream was gone.
    pub broadcast_failures: u64,
    /// Streams attached to the node.
    pub streams_opened: u64,
    /// Streams torn down and removed from the registry.
    pub streams_closed: u64,
}

impl NodeStats {
    pub(crate) fn record_accepted(&self) {
        self.messages_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_originated(&self) {
        self.messages_originated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queued(&self, frames: usize) {
        self.frames_queued.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_broadcast_failure(&self) {
        self.broadcast_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stream_opened(&self) {
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stream_closed(&self) {
        self.streams_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_accepted: self.messages_accepted.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            messages_originated: self.messages_originated.load(Ordering::Relaxed),
            frames_queued: self.frames_queued.load(Ordering::Relaxed),
            broadcast_failures: self.broadcast_failures.load(Ordering::Relaxed),
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            streams_closed: self.streams_closed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let stats = NodeStats::default();
        stats.record_accepted();
        stats.record_duplicate();
        stats.record_duplicate();
        stats.record_queued(3);

        let snap = stats.snapshot();
        assert_eq!(snap.messages_accepted, 1);
        assert_eq!(snap.duplicates_dropped, 2);
        assert_eq!(snap.frames_queued, 3);
        assert_eq!(snap.broadcast_failures, 0);
    }
}
