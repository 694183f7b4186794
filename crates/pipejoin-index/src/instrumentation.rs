//! Hash-index observability counters.
//!
//! Process-local counters shared by every index instance, read through
//! [`join_index_metrics_snapshot`]. Recording is a relaxed atomic add and
//! never blocks.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Snapshot of hash-index metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JoinIndexMetricsSnapshot {
    /// Solutions added to an index.
    pub pipejoin_index_inserts_total: u64,
    /// Solutions dropped because a required join variable was unbound.
    pub pipejoin_index_rejected_total: u64,
    /// Bucket lookups (by key or by probe solution).
    pub pipejoin_index_probes_total: u64,
    /// Successful `mark_as_joined` calls.
    pub pipejoin_index_hits_marked_total: u64,
    /// Entries removed from a pipelined index.
    pub pipejoin_index_removals_total: u64,
    /// Buckets dropped because their last entry was removed.
    pub pipejoin_index_buckets_dropped_total: u64,
    /// Solutions yielded by unjoined scans.
    pub pipejoin_index_unjoined_emitted_total: u64,
}

static INSERTS_TOTAL: AtomicU64 = AtomicU64::new(0);
static REJECTED_TOTAL: AtomicU64 = AtomicU64::new(0);
static PROBES_TOTAL: AtomicU64 = AtomicU64::new(0);
static HITS_MARKED_TOTAL: AtomicU64 = AtomicU64::new(0);
static REMOVALS_TOTAL: AtomicU64 = AtomicU64::new(0);
static BUCKETS_DROPPED_TOTAL: AtomicU64 = AtomicU64::new(0);
static UNJOINED_EMITTED_TOTAL: AtomicU64 = AtomicU64::new(0);

pub(crate) fn record_inserts(count: u64) {
    INSERTS_TOTAL.fetch_add(count, Ordering::Relaxed);
}

pub(crate) fn record_rejected(count: u64) {
    REJECTED_TOTAL.fetch_add(count, Ordering::Relaxed);
}

pub(crate) fn record_probe() {
    PROBES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_hit_marked() {
    HITS_MARKED_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_removals(count: u64) {
    REMOVALS_TOTAL.fetch_add(count, Ordering::Relaxed);
}

pub(crate) fn record_bucket_dropped() {
    BUCKETS_DROPPED_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_unjoined_emitted() {
    UNJOINED_EMITTED_TOTAL.fetch_add(1, Ordering::Relaxed);
}

/// Read all counters.
#[must_use]
pub fn join_index_metrics_snapshot() -> JoinIndexMetricsSnapshot {
    JoinIndexMetricsSnapshot {
        pipejoin_index_inserts_total: INSERTS_TOTAL.load(Ordering::Relaxed),
        pipejoin_index_rejected_total: REJECTED_TOTAL.load(Ordering::Relaxed),
        pipejoin_index_probes_total: PROBES_TOTAL.load(Ordering::Relaxed),
        pipejoin_index_hits_marked_total: HITS_MARKED_TOTAL.load(Ordering::Relaxed),
        pipejoin_index_removals_total: REMOVALS_TOTAL.load(Ordering::Relaxed),
        pipejoin_index_buckets_dropped_total: BUCKETS_DROPPED_TOTAL.load(Ordering::Relaxed),
        pipejoin_index_unjoined_emitted_total: UNJOINED_EMITTED_TOTAL.load(Ordering::Relaxed),
    }
}
