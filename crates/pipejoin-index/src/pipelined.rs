//! Thread-safe hash index for pipelined joins that shrink their build side.
//!
//! Every map operation runs under one `parking_lot::Mutex`, so insert,
//! lookup, removal and scan are linearizable with respect to each other.
//! Key formation reads only immutable configuration and happens before the
//! lock is taken.
//!
//! Lookups and scans return snapshots captured under the lock:
//! - a bucket returned by [`PipelinedHashIndex::get_bucket`] is a clone of the
//!   entry handles, so later inserts and removals do not affect it;
//! - a scan started before a removal still yields the removed entry;
//! - hit counters are shared, so a snapshot sees hits recorded after it was
//!   taken;
//! - [`PipelinedHashIndex::mark_as_joined`] on a removed entry is a no-op that
//!   returns `false`.

use std::sync::Arc;

use parking_lot::Mutex;
use pipejoin_error::{JoinIndexError, Result};
use pipejoin_types::{IndexConfig, IndexConfigBuilder, JoinVars, Solution, UnboundPolicy};
use tracing::debug;

use crate::antijoin::{HitFilter, HitSnapshot, IndexStats};
use crate::bucket::Bucket;
use crate::hit::SolutionHit;
use crate::index::{ChunkOutcome, HashIndex};
use crate::key::{Key, KeyFormation, make_key};
use crate::map::{BucketMap, HashBucketMap};

/// Hash index shareable across operator threads.
#[derive(Debug)]
pub struct PipelinedHashIndex<M: BucketMap = HashBucketMap> {
    config: IndexConfig,
    inner: Mutex<HashIndex<M>>,
}

impl PipelinedHashIndex<HashBucketMap> {
    #[must_use]
    pub fn with_hash_map(config: IndexConfig) -> Self {
        Self::from_index(HashIndex::new(config))
    }
}

impl<M: BucketMap> PipelinedHashIndex<M> {
    /// Wrap `map`, which must be empty.
    pub fn new(config: IndexConfig, map: M) -> Result<Self> {
        HashIndex::with_map(config, map).map(Self::from_index)
    }

    #[must_use]
    pub fn builder() -> PipelinedHashIndexBuilder<M> {
        PipelinedHashIndexBuilder {
            config: IndexConfig::builder(),
            map: None,
        }
    }

    fn from_index(index: HashIndex<M>) -> Self {
        debug!(
            join_vars = ?index.join_vars(),
            "pipelined hash index ready"
        );
        Self {
            config: index.config().clone(),
            inner: Mutex::new(index),
        }
    }

    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[must_use]
    pub fn join_vars(&self) -> &JoinVars {
        self.config.join_vars()
    }

    #[must_use]
    pub fn unbound_policy(&self) -> UnboundPolicy {
        self.config.unbound_policy()
    }

    /// Lock-free: reads only the configuration.
    #[must_use]
    pub fn make_key(&self, solution: &Solution) -> KeyFormation {
        make_key(self.config.join_vars(), self.config.unbound_policy(), solution)
    }

    pub fn insert(&self, solution: Solution) -> Option<Arc<SolutionHit>> {
        let formed = self.make_key(&solution);
        self.inner.lock().insert_formed(formed, solution)
    }

    /// Insert a chunk under a single lock acquisition.
    pub fn insert_chunk<I>(&self, chunk: I) -> ChunkOutcome
    where
        I: IntoIterator<Item = Solution>,
    {
        let keyed: Vec<(KeyFormation, Solution)> = chunk
            .into_iter()
            .map(|solution| (self.make_key(&solution), solution))
            .collect();
        self.inner.lock().insert_keyed(keyed)
    }

    /// Check-and-insert for DISTINCT as one atomic step.
    pub fn insert_distinct(&self, solution: Solution) -> bool {
        let formed = self.make_key(&solution);
        self.inner.lock().insert_distinct_formed(formed, solution)
    }

    /// Snapshot of the bucket for `key`.
    #[must_use]
    pub fn get_bucket(&self, key: &Key) -> Option<Bucket> {
        self.inner.lock().get_bucket(key).cloned()
    }

    #[must_use]
    pub fn probe(&self, probe: &Solution) -> Option<Bucket> {
        let key = self.make_key(probe).into_key()?;
        self.get_bucket(&key)
    }

    pub fn mark_as_joined(&self, entry: &SolutionHit) -> bool {
        self.inner.lock().mark_as_joined(entry)
    }

    /// Remove one entry. Returns `false` if it was already gone.
    pub fn remove_entry(&self, key: &Key, entry: &SolutionHit) -> bool {
        self.inner.lock().remove_entry(key, entry)
    }

    /// Remove a whole bucket in one step.
    pub fn take_bucket(&self, key: &Key) -> Option<Bucket> {
        self.inner.lock().take_bucket(key)
    }

    pub fn scan_unjoined(&self) -> HitSnapshot {
        HitSnapshot::new(self.inner.lock().snapshot_entries(), HitFilter::Unjoined)
    }

    pub fn scan_joined(&self) -> HitSnapshot {
        HitSnapshot::new(self.inner.lock().snapshot_entries(), HitFilter::Joined)
    }

    pub fn reset_hits(&self) {
        self.inner.lock().reset_hits();
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.inner.lock().bucket_count()
    }

    #[must_use]
    pub fn solution_count(&self) -> usize {
        self.inner.lock().solution_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        self.inner.lock().stats()
    }

    /// Run `f` with exclusive access to the underlying index.
    pub(crate) fn with_locked<R>(&self, f: impl FnOnce(&mut HashIndex<M>) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    #[must_use]
    pub fn into_inner(self) -> HashIndex<M> {
        self.inner.into_inner()
    }
}

/// Builder for [`PipelinedHashIndex`].
///
/// Both the join-variable list and the backing map are required.
#[derive(Debug)]
pub struct PipelinedHashIndexBuilder<M> {
    config: IndexConfigBuilder,
    map: Option<M>,
}

impl<M: BucketMap> PipelinedHashIndexBuilder<M> {
    pub fn join_vars<I, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<pipejoin_types::Var>,
    {
        self.config = self.config.join_vars(vars);
        self
    }

    pub fn unbound_policy(mut self, policy: UnboundPolicy) -> Self {
        self.config = self.config.unbound_policy(policy);
        self
    }

    pub fn index_unbound(mut self, index_unbound: bool) -> Self {
        self.config = self.config.index_unbound(index_unbound);
        self
    }

    pub fn backing_map(mut self, map: M) -> Self {
        self.map = Some(map);
        self
    }

    pub fn build(self) -> Result<PipelinedHashIndex<M>> {
        let config = self.config.build()?;
        let map = self.map.ok_or(JoinIndexError::MissingBackingMap)?;
        PipelinedHashIndex::new(config, map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrumentation::join_index_metrics_snapshot;
    use crate::map::OrderedBucketMap;
    use pipejoin_types::{Term, Var};

    fn sol(x: i64, y: i64) -> Solution {
        Solution::from_bindings([
            (Var::new("x"), Term::Integer(x)),
            (Var::new("y"), Term::Integer(y)),
        ])
    }

    fn index() -> PipelinedHashIndex<OrderedBucketMap> {
        PipelinedHashIndex::builder()
            .join_vars(["x"])
            .backing_map(OrderedBucketMap::new())
            .build()
            .unwrap()
    }

    #[test]
    fn is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelinedHashIndex>();
        assert_send_sync::<PipelinedHashIndex<OrderedBucketMap>>();
    }

    #[test]
    fn builder_requires_map_and_vars() {
        let err = PipelinedHashIndex::<OrderedBucketMap>::builder()
            .join_vars(["x"])
            .build()
            .unwrap_err();
        assert_eq!(err, JoinIndexError::MissingBackingMap, "case=missing_map");

        let err = PipelinedHashIndex::builder()
            .backing_map(OrderedBucketMap::new())
            .build()
            .unwrap_err();
        assert_eq!(err, JoinIndexError::MissingJoinVars, "case=missing_vars");
    }

    #[test]
    fn snapshot_bucket_unaffected_by_removal() {
        let index = index();
        let a = index.insert(sol(1, 1)).unwrap();
        index.insert(sol(1, 2)).unwrap();
        let key = Key::bound([Term::Integer(1)]);

        let before = index.get_bucket(&key).unwrap();
        assert!(index.remove_entry(&key, &a));
        assert_eq!(before.len(), 2, "case=snapshot_stable");
        assert_eq!(index.get_bucket(&key).unwrap().len(), 1);
        assert!(!index.remove_entry(&key, &a), "case=double_remove");
        assert!(!index.mark_as_joined(&a), "case=mark_removed_entry");
    }

    #[test]
    fn scan_started_before_removal_still_yields_entry() {
        let index = index();
        let a = index.insert(sol(1, 1)).unwrap();
        index.insert(sol(2, 2)).unwrap();
        let scan = index.scan_unjoined();
        assert!(index.remove_entry(&Key::bound([Term::Integer(1)]), &a));
        let yielded: Vec<Solution> = scan.collect();
        assert_eq!(yielded, vec![sol(1, 1), sol(2, 2)]);
        assert_eq!(index.scan_unjoined().count(), 1);
    }

    #[test]
    fn last_removal_drops_bucket() {
        let index = index();
        let a = index.insert(sol(1, 1)).unwrap();
        let key = Key::bound([Term::Integer(1)]);
        assert!(index.remove_entry(&key, &a));
        assert!(index.get_bucket(&key).is_none());
        assert_eq!(index.bucket_count(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn take_bucket_removes_every_entry() {
        let index = index();
        let a = index.insert(sol(1, 1)).unwrap();
        index.insert(sol(1, 2)).unwrap();
        index.insert(sol(2, 3)).unwrap();
        let taken = index.take_bucket(&Key::bound([Term::Integer(1)])).unwrap();
        assert_eq!(taken.len(), 2);
        assert!(!a.is_live());
        assert_eq!(index.solution_count(), 1);
        assert!(index.take_bucket(&Key::bound([Term::Integer(1)])).is_none());
    }

    #[test]
    fn distinct_insert_is_atomic_check() {
        let index = PipelinedHashIndex::with_hash_map(
            IndexConfig::builder()
                .join_vars(["x"])
                .index_unbound(true)
                .build()
                .unwrap(),
        );
        assert!(index.insert_distinct(sol(1, 1)));
        assert!(!index.insert_distinct(sol(1, 1)));
        assert_eq!(index.solution_count(), 1);
    }

    #[test]
    fn populated_map_rejected() {
        let mut map = OrderedBucketMap::new();
        let _ = map.get_or_create(Key::bound([Term::Integer(9)]));
        let err = PipelinedHashIndex::new(
            IndexConfig::builder().join_vars(["x"]).build().unwrap(),
            map,
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn rejected_distinct_insert_is_counted() {
        let index = index();
        let before = join_index_metrics_snapshot();
        let no_x = Solution::from_bindings([(Var::new("y"), Term::Integer(1))]);
        assert!(!index.insert_distinct(no_x));
        let after = join_index_metrics_snapshot();
        assert!(
            after.pipejoin_index_rejected_total > before.pipejoin_index_rejected_total,
            "case=pipelined_distinct_rejection_recorded"
        );
        assert!(index.is_empty());
    }

    #[test]
    fn take_bucket_counts_every_removed_entry() {
        let index = index();
        for y in 0..3 {
            index.insert(sol(4, y)).unwrap();
        }
        let before = join_index_metrics_snapshot();
        let taken = index.take_bucket(&Key::bound([Term::Integer(4)])).unwrap();
        let after = join_index_metrics_snapshot();
        assert_eq!(taken.len(), 3);
        assert!(
            after.pipejoin_index_removals_total >= before.pipejoin_index_removals_total + 3,
            "case=take_bucket_removals_recorded"
        );
    }
}
