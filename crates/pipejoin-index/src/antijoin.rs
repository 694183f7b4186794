//! Hit-count classification and the end-of-stream scans used by OPTIONAL,
//! EXISTS, NOT EXISTS and MINUS.
//!
//! An entry is *joined* once its hit counter is non-zero and *unjoined*
//! while it is exactly zero. The base index scans borrowed buckets lazily;
//! the pipelined index hands out an owned snapshot of entry handles taken
//! under its lock, and the filter reads each counter only when the element
//! is reached.

use std::sync::Arc;

use pipejoin_types::Solution;
use serde::Serialize;

use crate::bucket::Bucket;
use crate::hit::SolutionHit;
use crate::instrumentation::record_unjoined_emitted;
use crate::key::Key;

/// Which side of the hit classification a scan yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitFilter {
    /// Entries whose hit counter is zero.
    Unjoined,
    /// Entries matched at least once.
    Joined,
}

impl HitFilter {
    #[must_use]
    pub fn accepts(self, entry: &SolutionHit) -> bool {
        match self {
            Self::Unjoined => !entry.is_joined(),
            Self::Joined => entry.is_joined(),
        }
    }
}

/// Lazy scan over the buckets of a base index, in bucket-then-insertion order.
pub struct HitScan<'a, I> {
    buckets: I,
    current: std::slice::Iter<'a, Arc<SolutionHit>>,
    filter: HitFilter,
}

impl<'a, I> HitScan<'a, I>
where
    I: Iterator<Item = (&'a Key, &'a Bucket)>,
{
    pub(crate) fn new(buckets: I, filter: HitFilter) -> Self {
        Self {
            buckets,
            current: Default::default(),
            filter,
        }
    }
}

impl<'a, I> Iterator for HitScan<'a, I>
where
    I: Iterator<Item = (&'a Key, &'a Bucket)>,
{
    type Item = &'a Solution;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            for entry in self.current.by_ref() {
                if self.filter.accepts(entry) {
                    if self.filter == HitFilter::Unjoined {
                        record_unjoined_emitted();
                    }
                    return Some(entry.solution());
                }
            }
            let (_, bucket) = self.buckets.next()?;
            self.current = bucket.iter();
        }
    }
}

/// Owned scan over entry handles captured from a pipelined index.
///
/// Membership is fixed when the snapshot is taken: an entry removed
/// afterwards is still yielded if it passes the filter. Hit counters are read
/// live as the scan advances.
#[derive(Debug)]
pub struct HitSnapshot {
    entries: std::vec::IntoIter<Arc<SolutionHit>>,
    filter: HitFilter,
}

impl HitSnapshot {
    pub(crate) fn new(entries: Vec<Arc<SolutionHit>>, filter: HitFilter) -> Self {
        Self {
            entries: entries.into_iter(),
            filter,
        }
    }

    /// Entries still to be examined (an upper bound on what remains).
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl Iterator for HitSnapshot {
    type Item = Solution;

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter;
        let entry = self.entries.find(|entry| filter.accepts(entry))?;
        if filter == HitFilter::Unjoined {
            record_unjoined_emitted();
        }
        Some(entry.solution().clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entries.len()))
    }
}

/// Point-in-time summary of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IndexStats {
    pub buckets: usize,
    pub solutions: usize,
    pub joined: usize,
    pub unjoined: usize,
    pub max_bucket_len: usize,
}

pub(crate) fn tally<'a>(buckets: impl Iterator<Item = &'a Bucket>) -> IndexStats {
    let mut stats = IndexStats::default();
    for bucket in buckets {
        stats.buckets += 1;
        stats.solutions += bucket.len();
        stats.max_bucket_len = stats.max_bucket_len.max(bucket.len());
        let unjoined = bucket.unjoined_count();
        stats.unjoined += unjoined;
        stats.joined += bucket.len() - unjoined;
    }
    stats
}
