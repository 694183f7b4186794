//! Base hash index: build from streamed chunks, probe by key, scan by hits.
//!
//! The index maps [`Key`] to [`Bucket`]. Invariants maintained here:
//! - every entry lives in exactly one bucket;
//! - no stored bucket is empty;
//! - the join variables and unbound policy never change after construction.
//!
//! The base index is single-writer: inserts take `&mut self`, so a scan
//! (which borrows the index) can never observe a concurrent mutation. Use
//! [`crate::PipelinedHashIndex`] for shared access.

use std::sync::Arc;

use pipejoin_error::{JoinIndexError, Result};
use pipejoin_types::{IndexConfig, JoinVars, Solution, UnboundPolicy};
use tracing::{debug, trace};

use crate::antijoin::{HitFilter, HitScan, IndexStats, tally};
use crate::bucket::Bucket;
use crate::hit::{IndexId, SolutionHit};
use crate::instrumentation::{
    record_bucket_dropped, record_hit_marked, record_inserts, record_probe, record_rejected,
    record_removals,
};
use crate::key::{Key, KeyFormation, make_key};
use crate::map::{BucketMap, HashBucketMap};

/// Counts from one [`HashIndex::insert_chunk`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkOutcome {
    pub inserted: usize,
    pub rejected: usize,
}

/// Hash index over solutions, keyed by their join-variable bindings.
#[derive(Debug)]
pub struct HashIndex<M: BucketMap = HashBucketMap> {
    config: IndexConfig,
    owner: IndexId,
    next_entry: u64,
    solutions: usize,
    map: M,
}

impl HashIndex<HashBucketMap> {
    /// Index backed by the default hash map.
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        Self::build(config, HashBucketMap::new())
    }
}

impl<M: BucketMap> HashIndex<M> {
    /// Index backed by a caller-supplied map, which must be empty.
    pub fn with_map(config: IndexConfig, map: M) -> Result<Self> {
        if !map.is_empty() {
            return Err(JoinIndexError::BackingMapNotEmpty { buckets: map.len() });
        }
        Ok(Self::build(config, map))
    }

    fn build(config: IndexConfig, map: M) -> Self {
        debug!(
            join_vars = ?config.join_vars(),
            unbound = config.unbound_policy().as_str(),
            map = map.kind(),
            "hash index created"
        );
        if config.join_vars().is_cross_product() {
            debug!("no join variables: every solution shares one bucket (cross product)");
        }
        Self {
            config,
            owner: IndexId::next(),
            next_entry: 0,
            solutions: 0,
            map,
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

    /// Form the key for `solution` under this index's join variables and policy.
    #[must_use]
    pub fn make_key(&self, solution: &Solution) -> KeyFormation {
        make_key(self.config.join_vars(), self.config.unbound_policy(), solution)
    }

    /// Add a solution. Returns the new entry, or `None` if the key was
    /// rejected (the solution is dropped, not indexed).
    ///
    /// No deduplication happens here; see [`Self::insert_distinct`].
    pub fn insert(&mut self, solution: Solution) -> Option<Arc<SolutionHit>> {
        let formed = self.make_key(&solution);
        self.insert_formed(formed, solution)
    }

    pub(crate) fn insert_formed(
        &mut self,
        formed: KeyFormation,
        solution: Solution,
    ) -> Option<Arc<SolutionHit>> {
        match formed {
            KeyFormation::Formed(key) => {
                record_inserts(1);
                Some(self.insert_with_key(key, solution))
            }
            KeyFormation::Rejected { var } => {
                record_rejected(1);
                trace!(var = %var, solution = %solution, "solution dropped: join variable unbound");
                None
            }
        }
    }

    /// Add one pipelined chunk of solutions.
    pub fn insert_chunk<I>(&mut self, chunk: I) -> ChunkOutcome
    where
        I: IntoIterator<Item = Solution>,
    {
        let keyed: Vec<(KeyFormation, Solution)> = chunk
            .into_iter()
            .map(|solution| (self.make_key(&solution), solution))
            .collect();
        self.insert_keyed(keyed)
    }

    pub(crate) fn insert_keyed(&mut self, keyed: Vec<(KeyFormation, Solution)>) -> ChunkOutcome {
        let _span = tracing::debug_span!("hash_index_chunk", chunk_len = keyed.len()).entered();
        let mut outcome = ChunkOutcome::default();
        for (formed, solution) in keyed {
            match formed {
                KeyFormation::Formed(key) => {
                    let _ = self.insert_with_key(key, solution);
                    outcome.inserted += 1;
                }
                KeyFormation::Rejected { var } => {
                    trace!(var = %var, "solution dropped: join variable unbound");
                    outcome.rejected += 1;
                }
            }
        }
        record_inserts(outcome.inserted as u64);
        record_rejected(outcome.rejected as u64);
        debug!(
            inserted = outcome.inserted,
            rejected = outcome.rejected,
            buckets = self.map.len(),
            "chunk indexed"
        );
        outcome
    }

    pub(crate) fn insert_with_key(&mut self, key: Key, solution: Solution) -> Arc<SolutionHit> {
        let entry = Arc::new(SolutionHit::new(self.owner, self.next_entry, solution));
        self.next_entry += 1;
        self.map.get_or_create(key).push(Arc::clone(&entry));
        self.solutions += 1;
        entry
    }

    /// DISTINCT seen-set insert: add `solution` unless an equal solution is
    /// already indexed. Returns `true` if it was added; `false` for a
    /// duplicate, or for a rejected key under [`UnboundPolicy::Reject`].
    pub fn insert_distinct(&mut self, solution: Solution) -> bool {
        let formed = self.make_key(&solution);
        self.insert_distinct_formed(formed, solution)
    }

    pub(crate) fn insert_distinct_formed(
        &mut self,
        formed: KeyFormation,
        solution: Solution,
    ) -> bool {
        let key = match formed {
            KeyFormation::Formed(key) => key,
            KeyFormation::Rejected { var } => {
                record_rejected(1);
                trace!(var = %var, "distinct solution dropped: join variable unbound");
                return false;
            }
        };
        record_probe();
        if self
            .map
            .get(&key)
            .is_some_and(|bucket| bucket.contains_solution(&solution))
        {
            return false;
        }
        record_inserts(1);
        let _ = self.insert_with_key(key, solution);
        true
    }

    /// Collision chain for `key`, or `None` if nothing is indexed under it.
    #[must_use]
    pub fn get_bucket(&self, key: &Key) -> Option<&Bucket> {
        record_probe();
        self.map.get(key)
    }

    /// Form the probe key from `probe` and look it up. A probe whose key is
    /// rejected matches nothing.
    #[must_use]
    pub fn probe(&self, probe: &Solution) -> Option<&Bucket> {
        let key = self.make_key(probe).into_key()?;
        self.get_bucket(&key)
    }

    /// Record one successful match against `entry`.
    ///
    /// Returns `false` (and counts nothing) if the entry belongs to another
    /// index or has been removed.
    pub fn mark_as_joined(&self, entry: &SolutionHit) -> bool {
        if !entry.belongs_to(self.owner) || !entry.is_live() {
            debug!(entry = %entry.id(), "mark_as_joined ignored: entry not live in this index");
            return false;
        }
        let hits = entry.record_hit();
        record_hit_marked();
        trace!(entry = %entry.id(), hits, "entry joined");
        true
    }

    /// Zero every hit counter.
    pub fn reset_hits(&mut self) {
        for (_, bucket) in self.map.iter() {
            for entry in bucket {
                entry.reset_hits();
            }
        }
    }

    /// Every indexed solution whose hit counter is zero, in bucket order and
    /// insertion order within a bucket.
    pub fn scan_unjoined(&self) -> HitScan<'_, M::Iter<'_>> {
        HitScan::new(self.map.iter(), HitFilter::Unjoined)
    }

    /// Every indexed solution matched at least once.
    pub fn scan_joined(&self) -> HitScan<'_, M::Iter<'_>> {
        HitScan::new(self.map.iter(), HitFilter::Joined)
    }

    /// All buckets in backing-map order.
    pub fn buckets(&self) -> M::Iter<'_> {
        self.map.iter()
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn solution_count(&self) -> usize {
        self.solutions
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.solutions == 0
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        tally(self.map.iter().map(|(_, bucket)| bucket))
    }

    /// Unlink one entry; drops the bucket if it becomes empty.
    pub(crate) fn remove_entry(&mut self, key: &Key, entry: &SolutionHit) -> bool {
        if !entry.belongs_to(self.owner) {
            debug!(entry = %entry.id(), key = %key, "remove ignored: foreign entry");
            return false;
        }
        let Some(bucket) = self.map.get_mut(key) else {
            debug!(entry = %entry.id(), key = %key, "remove ignored: no bucket for key");
            return false;
        };
        let Some(removed) = bucket.remove(entry.id()) else {
            debug!(entry = %entry.id(), key = %key, "remove ignored: entry not in bucket");
            return false;
        };
        removed.retire();
        let now_empty = bucket.is_empty();
        self.solutions -= 1;
        record_removals(1);
        if now_empty {
            let _ = self.map.remove(key);
            record_bucket_dropped();
            debug!(key = %key, "bucket dropped: last entry removed");
        }
        trace!(entry = %entry.id(), key = %key, "entry removed");
        true
    }

    /// Unlink a whole bucket.
    pub(crate) fn take_bucket(&mut self, key: &Key) -> Option<Bucket> {
        let bucket = self.map.remove(key)?;
        for entry in &bucket {
            entry.retire();
        }
        self.solutions -= bucket.len();
        record_removals(bucket.len() as u64);
        record_bucket_dropped();
        debug!(key = %key, entries = bucket.len(), "bucket taken");
        Some(bucket)
    }

    /// Handles to every entry, in scan order.
    pub(crate) fn snapshot_entries(&self) -> Vec<Arc<SolutionHit>> {
        let mut entries = Vec::with_capacity(self.solutions);
        for (_, bucket) in self.map.iter() {
            entries.extend(bucket.iter().cloned());
        }
        entries
    }
}
