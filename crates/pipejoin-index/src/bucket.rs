//! Collision chains: every entry in a bucket shares one key.

use std::sync::Arc;

use pipejoin_types::Solution;

use crate::hit::{EntryId, SolutionHit};

/// Ordered list of entries sharing one key.
///
/// Entries are kept in insertion order; removal shifts the tail down so the
/// relative order of the survivors never changes. Cloning a bucket clones the
/// entry handles, not the solutions, and the clone shares hit counters with
/// the original.
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    entries: Vec<Arc<SolutionHit>>,
}

impl Bucket {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<SolutionHit>> {
        self.entries.iter()
    }

    #[must_use]
    pub fn entries(&self) -> &[Arc<SolutionHit>] {
        &self.entries
    }

    pub fn solutions(&self) -> impl Iterator<Item = &Solution> + '_ {
        self.entries.iter().map(|entry| entry.solution())
    }

    /// Whether an equal solution is already present (DISTINCT check).
    #[must_use]
    pub fn contains_solution(&self, solution: &Solution) -> bool {
        self.entries.iter().any(|entry| entry.solution() == solution)
    }

    #[must_use]
    pub fn find(&self, id: EntryId) -> Option<&Arc<SolutionHit>> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    /// Entries whose hit counter is zero.
    #[must_use]
    pub fn unjoined_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.is_joined()).count()
    }

    pub(crate) fn push(&mut self, entry: Arc<SolutionHit>) {
        self.entries.push(entry);
    }

    /// Remove the entry with `id`, keeping the order of the rest.
    pub(crate) fn remove(&mut self, id: EntryId) -> Option<Arc<SolutionHit>> {
        let pos = self.entries.iter().position(|entry| entry.id() == id)?;
        Some(self.entries.remove(pos))
    }
}

impl<'a> IntoIterator for &'a Bucket {
    type Item = &'a Arc<SolutionHit>;
    type IntoIter = std::slice::Iter<'a, Arc<SolutionHit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
