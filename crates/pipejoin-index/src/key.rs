//! As-bound keys formed from a solution's join-variable bindings.
//!
//! A key holds one slot per join variable, in declared order. A missing
//! binding either rejects the solution ([`UnboundPolicy::Reject`]) or becomes
//! an explicit [`KeySlot::Unbound`] slot ([`UnboundPolicy::Index`]). Rejection
//! is reported as its own variant, never as a sentinel key.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use pipejoin_types::{JoinVars, Solution, Term, UnboundPolicy, Var};
use smallvec::SmallVec;
use xxhash_rust::xxh3::Xxh3;

/// Join keys rarely exceed this many variables.
const INLINE_SLOTS: usize = 4;

/// One position of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySlot {
    /// The join variable had no binding (only under `UnboundPolicy::Index`).
    Unbound,
    Bound(Term),
}

impl KeySlot {
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    #[must_use]
    pub const fn term(&self) -> Option<&Term> {
        match self {
            Self::Bound(term) => Some(term),
            Self::Unbound => None,
        }
    }
}

/// Hash-index key.
///
/// The 64-bit XXH3 hash of the slots is computed once at construction;
/// `Hash` writes only that value, so rehashing during map growth never walks
/// the terms again.
#[derive(Clone)]
pub struct Key {
    hash: u64,
    slots: SmallVec<[KeySlot; INLINE_SLOTS]>,
}

impl Key {
    pub fn from_slots(slots: impl IntoIterator<Item = KeySlot>) -> Self {
        let slots: SmallVec<[KeySlot; INLINE_SLOTS]> = slots.into_iter().collect();
        let mut hasher = Xxh3::new();
        slots.len().hash(&mut hasher);
        for slot in &slots {
            slot.hash(&mut hasher);
        }
        Self {
            hash: hasher.finish(),
            slots,
        }
    }

    /// Key for a fully bound tuple of terms.
    pub fn bound(terms: impl IntoIterator<Item = Term>) -> Self {
        Self::from_slots(terms.into_iter().map(KeySlot::Bound))
    }

    /// The single key used when there are no join variables.
    #[must_use]
    pub fn cross_product() -> Self {
        Self::from_slots(std::iter::empty())
    }

    #[inline]
    #[must_use]
    pub const fn hash_code(&self) -> u64 {
        self.hash
    }

    #[must_use]
    pub fn slots(&self) -> &[KeySlot] {
        &self.slots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether every join variable was bound.
    #[must_use]
    pub fn is_fully_bound(&self) -> bool {
        self.slots.iter().all(KeySlot::is_bound)
    }

    #[must_use]
    pub fn unbound_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_bound()).count()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.slots == other.slots
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.slots.cmp(&other.slots)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self} #{:016x})", self.hash)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, slot) in self.slots.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match slot {
                KeySlot::Bound(term) => write!(f, "{term}")?,
                KeySlot::Unbound => f.write_str("UNDEF")?,
            }
        }
        f.write_str(")")
    }
}

/// Outcome of key formation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFormation {
    Formed(Key),
    /// A required join variable was unbound under `UnboundPolicy::Reject`.
    /// The solution must be neither indexed nor used as a probe.
    Rejected { var: Var },
}

impl KeyFormation {
    #[must_use]
    pub fn into_key(self) -> Option<Key> {
        match self {
            Self::Formed(key) => Some(key),
            Self::Rejected { .. } => None,
        }
    }

    #[must_use]
    pub const fn as_key(&self) -> Option<&Key> {
        match self {
            Self::Formed(key) => Some(key),
            Self::Rejected { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Form the key for `solution` over `join_vars`.
pub fn make_key(join_vars: &JoinVars, policy: UnboundPolicy, solution: &Solution) -> KeyFormation {
    let mut slots: SmallVec<[KeySlot; INLINE_SLOTS]> = SmallVec::with_capacity(join_vars.len());
    for var in join_vars {
        match solution.get(var) {
            Some(term) => slots.push(KeySlot::Bound(term.clone())),
            None if policy.indexes_unbound() => slots.push(KeySlot::Unbound),
            None => return KeyFormation::Rejected { var: var.clone() },
        }
    }
    KeyFormation::Formed(Key::from_slots(slots))
}
