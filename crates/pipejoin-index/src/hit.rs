//! Indexed entries and their hit counters.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use pipejoin_types::Solution;

static NEXT_INDEX_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one index instance. Entries remember which index created them
/// so an index never counts a hit on a foreign entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct IndexId(u64);

impl IndexId {
    pub(crate) fn next() -> Self {
        Self(NEXT_INDEX_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of one entry within its index, assigned in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A solution held by the index together with its hit counter.
///
/// The counter and the liveness flag are atomics so that a handle returned
/// by `insert` can be read from any thread. Mutation goes through the owning
/// index (`mark_as_joined`, `reset_hits`, removal), which checks ownership
/// and liveness first.
pub struct SolutionHit {
    id: EntryId,
    owner: IndexId,
    solution: Solution,
    hits: AtomicU64,
    live: AtomicBool,
}

impl SolutionHit {
    pub(crate) fn new(owner: IndexId, id: u64, solution: Solution) -> Self {
        Self {
            id: EntryId(id),
            owner,
            solution,
            hits: AtomicU64::new(0),
            live: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub const fn id(&self) -> EntryId {
        self.id
    }

    #[must_use]
    pub const fn solution(&self) -> &Solution {
        &self.solution
    }

    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Acquire)
    }

    /// Whether at least one probe matched this entry.
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.hit_count() > 0
    }

    /// Whether the entry is still reachable from its index.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn belongs_to(&self, owner: IndexId) -> bool {
        self.owner == owner
    }

    pub(crate) fn record_hit(&self) -> u64 {
        self.hits.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset_hits(&self) {
        self.hits.store(0, Ordering::Release);
    }

    pub(crate) fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl fmt::Debug for SolutionHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolutionHit")
            .field("id", &self.id)
            .field("solution", &self.solution)
            .field("hits", &self.hit_count())
            .field("live", &self.is_live())
            .finish()
    }
}
