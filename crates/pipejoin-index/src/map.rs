//! Backing maps from [`Key`] to [`Bucket`].
//!
//! The caller picks the container. A hash map is fastest for insert and
//! probe. A key-ordered map makes full scans deterministic across runs, and
//! an insertion-ordered map scans buckets in the order their first solution
//! arrived, so OPTIONAL/MINUS output follows the build side.

use std::collections::BTreeMap;
use std::hash::BuildHasher;

use crate::bucket::Bucket;
use crate::key::Key;

/// Default backing map.
pub type HashBucketMap = hashbrown::HashMap<Key, Bucket>;

/// Backing map with key-ordered scans.
pub type OrderedBucketMap = BTreeMap<Key, Bucket>;

/// Backing map that scans buckets in first-insertion order.
pub type InsertionOrderedBucketMap = indexmap::IndexMap<Key, Bucket>;

/// Key → bucket container used by the indices.
///
/// Implementations only store buckets; the index maintains the invariant
/// that no stored bucket is empty.
pub trait BucketMap: Send {
    type Iter<'a>: Iterator<Item = (&'a Key, &'a Bucket)>
    where
        Self: 'a;

    /// Label used in logs.
    fn kind(&self) -> &'static str;

    fn get(&self, key: &Key) -> Option<&Bucket>;

    fn get_mut(&mut self, key: &Key) -> Option<&mut Bucket>;

    /// Bucket for `key`, created empty if absent.
    fn get_or_create(&mut self, key: Key) -> &mut Bucket;

    fn remove(&mut self, key: &Key) -> Option<Bucket>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Self::Iter<'_>;
}

impl<S> BucketMap for hashbrown::HashMap<Key, Bucket, S>
where
    S: BuildHasher + Send,
{
    type Iter<'a>
        = hashbrown::hash_map::Iter<'a, Key, Bucket>
    where
        Self: 'a;

    fn kind(&self) -> &'static str {
        "hash"
    }

    fn get(&self, key: &Key) -> Option<&Bucket> {
        Self::get(self, key)
    }

    fn get_mut(&mut self, key: &Key) -> Option<&mut Bucket> {
        Self::get_mut(self, key)
    }

    fn get_or_create(&mut self, key: Key) -> &mut Bucket {
        self.entry(key).or_default()
    }

    fn remove(&mut self, key: &Key) -> Option<Bucket> {
        Self::remove(self, key)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn iter(&self) -> Self::Iter<'_> {
        Self::iter(self)
    }
}

impl<S> BucketMap for indexmap::IndexMap<Key, Bucket, S>
where
    S: BuildHasher + Send,
{
    type Iter<'a>
        = indexmap::map::Iter<'a, Key, Bucket>
    where
        Self: 'a;

    fn kind(&self) -> &'static str {
        "insertion-ordered"
    }

    fn get(&self, key: &Key) -> Option<&Bucket> {
        Self::get(self, key)
    }

    fn get_mut(&mut self, key: &Key) -> Option<&mut Bucket> {
        Self::get_mut(self, key)
    }

    fn get_or_create(&mut self, key: Key) -> &mut Bucket {
        self.entry(key).or_default()
    }

    /// Shifts later buckets down so the surviving scan order is unchanged.
    fn remove(&mut self, key: &Key) -> Option<Bucket> {
        self.shift_remove(key)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn iter(&self) -> Self::Iter<'_> {
        Self::iter(self)
    }
}

impl BucketMap for BTreeMap<Key, Bucket> {
    type Iter<'a> = std::collections::btree_map::Iter<'a, Key, Bucket>;

    fn kind(&self) -> &'static str {
        "ordered"
    }

    fn get(&self, key: &Key) -> Option<&Bucket> {
        Self::get(self, key)
    }

    fn get_mut(&mut self, key: &Key) -> Option<&mut Bucket> {
        Self::get_mut(self, key)
    }

    fn get_or_create(&mut self, key: Key) -> &mut Bucket {
        self.entry(key).or_default()
    }

    fn remove(&mut self, key: &Key) -> Option<Bucket> {
        Self::remove(self, key)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn iter(&self) -> Self::Iter<'_> {
        Self::iter(self)
    }
}
