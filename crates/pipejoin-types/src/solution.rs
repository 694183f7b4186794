//! Binding sets (solutions) flowing through the operator pipeline.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Term, Var};

/// Inline capacity for bindings; most solutions bind only a handful of vars.
const INLINE_BINDINGS: usize = 8;

type Bindings = SmallVec<[(Var, Term); INLINE_BINDINGS]>;

/// An immutable set of variable bindings.
///
/// Bindings are kept sorted by variable so that lookups are a binary search
/// and equality/hashing are independent of insertion order. The set is
/// shared behind an `Arc`: cloning a `Solution` never copies its bindings.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<(Var, Term)>", into = "Vec<(Var, Term)>")]
pub struct Solution {
    bindings: Arc<Bindings>,
}

impl Solution {
    /// The empty solution (binds nothing).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a solution from bindings. If a variable is bound more than once,
    /// the last binding wins.
    #[must_use]
    pub fn from_bindings(bindings: impl IntoIterator<Item = (Var, Term)>) -> Self {
        let mut sorted: Bindings = SmallVec::new();
        for (var, term) in bindings {
            match sorted.binary_search_by(|(v, _)| v.cmp(&var)) {
                Ok(pos) => sorted[pos].1 = term,
                Err(pos) => sorted.insert(pos, (var, term)),
            }
        }
        Self {
            bindings: Arc::new(sorted),
        }
    }

    /// Return a copy with `var` bound to `term`.
    #[must_use]
    pub fn with(&self, var: Var, term: Term) -> Self {
        let mut bindings: Bindings = (*self.bindings).clone();
        match bindings.binary_search_by(|(v, _)| v.cmp(&var)) {
            Ok(pos) => bindings[pos].1 = term,
            Err(pos) => bindings.insert(pos, (var, term)),
        }
        Self {
            bindings: Arc::new(bindings),
        }
    }

    #[must_use]
    pub fn get(&self, var: &Var) -> Option<&Term> {
        self.bindings
            .binary_search_by(|(v, _)| v.cmp(var))
            .ok()
            .map(|pos| &self.bindings[pos].1)
    }

    #[must_use]
    pub fn is_bound(&self, var: &Var) -> bool {
        self.get(var).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, &Term)> + '_ {
        self.bindings.iter().map(|(v, t)| (v, t))
    }

    /// Whether two handles share the same underlying binding set.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bindings, &other.bindings)
    }

    /// SPARQL compatibility: every variable bound in both solutions is bound
    /// to the same term.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.walk_shared(other, |a, b| a == b).0
    }

    /// Whether at least one variable is bound in both solutions.
    #[must_use]
    pub fn shares_bound_var(&self, other: &Self) -> bool {
        self.walk_shared(other, |_, _| true).1 > 0
    }

    /// Merge two compatible solutions into their union, or `None` if they
    /// disagree on a shared variable.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Option<Self> {
        if !self.is_compatible(other) {
            return None;
        }
        if other.bindings.iter().all(|(v, _)| self.is_bound(v)) {
            return Some(self.clone());
        }
        let mut merged: Bindings = SmallVec::with_capacity(self.len() + other.len());
        let (mut i, mut j) = (0, 0);
        let (a, b) = (&self.bindings, &other.bindings);
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => {
                    merged.push(a[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(b[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    merged.push(a[i].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend(a[i..].iter().cloned());
        merged.extend(b[j..].iter().cloned());
        Some(Self {
            bindings: Arc::new(merged),
        })
    }

    /// Walk the variables bound in both solutions in sorted order. Returns
    /// whether `same` held for every shared pair, and how many pairs were seen.
    fn walk_shared(&self, other: &Self, same: impl Fn(&Term, &Term) -> bool) -> (bool, usize) {
        let (a, b) = (&self.bindings, &other.bindings);
        let (mut i, mut j, mut shared) = (0, 0, 0);
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    if !same(&a[i].1, &b[j].1) {
                        return (false, shared + 1);
                    }
                    shared += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        (true, shared)
    }
}

impl FromIterator<(Var, Term)> for Solution {
    fn from_iter<I: IntoIterator<Item = (Var, Term)>>(iter: I) -> Self {
        Self::from_bindings(iter)
    }
}

impl From<Vec<(Var, Term)>> for Solution {
    fn from(bindings: Vec<(Var, Term)>) -> Self {
        Self::from_bindings(bindings)
    }
}

impl From<Solution> for Vec<(Var, Term)> {
    fn from(solution: Solution) -> Self {
        solution.bindings.iter().cloned().collect()
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (var, term)) in self.bindings.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{var}={term}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
