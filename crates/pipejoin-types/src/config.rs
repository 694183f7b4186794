//! Immutable index configuration.
//!
//! The join-variable list and the unbound-variable policy are fixed when the
//! index is built and never change afterwards. Both validate on construction
//! and on deserialization.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use pipejoin_error::{JoinIndexError, Result};
use serde::{Deserialize, Serialize};

use crate::Var;

// ── Join variables ─────────────────────────────────────────────────────────

/// Ordered, duplicate-free list of join variables.
///
/// The order is significant: keys are formed by reading the bindings in this
/// order. An empty list is valid and puts every solution in a single bucket
/// (a cross-product join, which is expensive).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Var>", into = "Vec<Var>")]
pub struct JoinVars {
    vars: Arc<[Var]>,
}

impl JoinVars {
    /// Validate and build a join-variable list.
    pub fn new(vars: impl IntoIterator<Item = Var>) -> Result<Self> {
        let vars: Vec<Var> = vars.into_iter().collect();
        let mut seen = HashSet::with_capacity(vars.len());
        for var in &vars {
            if var.is_empty() {
                return Err(JoinIndexError::EmptyJoinVarName);
            }
            if !seen.insert(var) {
                return Err(JoinIndexError::duplicate_join_var(var.name()));
            }
        }
        Ok(Self {
            vars: Arc::from(vars),
        })
    }

    /// The empty list (cross-product join).
    #[must_use]
    pub fn cross_product() -> Self {
        Self {
            vars: Arc::from(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_cross_product(&self) -> bool {
        self.vars.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Var] {
        &self.vars
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Var> {
        self.vars.iter()
    }
}

impl TryFrom<Vec<Var>> for JoinVars {
    type Error = JoinIndexError;

    fn try_from(vars: Vec<Var>) -> Result<Self> {
        Self::new(vars)
    }
}

impl From<JoinVars> for Vec<Var> {
    fn from(vars: JoinVars) -> Self {
        vars.vars.to_vec()
    }
}

impl<'a> IntoIterator for &'a JoinVars {
    type Item = &'a Var;
    type IntoIter = std::slice::Iter<'a, Var>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for JoinVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.vars.iter()).finish()
    }
}

// ── Unbound policy ─────────────────────────────────────────────────────────

/// What to do with a solution that lacks a binding for some join variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnboundPolicy {
    /// Drop the solution: it is neither indexed nor usable as a probe.
    #[default]
    Reject,
    /// Index it under a key with an explicit unbound slot per missing var.
    Index,
}

impl UnboundPolicy {
    #[must_use]
    pub const fn indexes_unbound(self) -> bool {
        matches!(self, Self::Index)
    }

    #[must_use]
    pub const fn from_flag(index_unbound: bool) -> Self {
        if index_unbound {
            Self::Index
        } else {
            Self::Reject
        }
    }

    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Index => "index",
        }
    }
}

// ── Operator kinds ─────────────────────────────────────────────────────────

/// Operators that build a hash index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Plain hash join: emit merged pairs.
    Inner,
    /// OPTIONAL: emit merged pairs, then every build solution that never joined.
    Optional,
    /// EXISTS: emit build solutions that joined at least once.
    Exists,
    /// NOT EXISTS: emit build solutions that never joined.
    NotExists,
    /// MINUS: like NOT EXISTS, but a pair only counts if it shares a variable.
    Minus,
    /// DISTINCT projection: the index is a seen-set, no hit accounting.
    Distinct,
}

impl JoinKind {
    /// The unbound policy this operator requires.
    ///
    /// DISTINCT must keep every solution; OPTIONAL, NOT EXISTS and MINUS must
    /// index every build solution so the zero-hit scan can find it later.
    #[must_use]
    pub const fn unbound_policy(self) -> UnboundPolicy {
        match self {
            Self::Inner | Self::Exists => UnboundPolicy::Reject,
            Self::Optional | Self::NotExists | Self::Minus | Self::Distinct => UnboundPolicy::Index,
        }
    }

    /// Whether this operator reads hit counters after the probe phase.
    #[must_use]
    pub const fn uses_hit_accounting(self) -> bool {
        !matches!(self, Self::Inner | Self::Distinct)
    }

    /// Whether matches produce merged output rows during probing.
    #[must_use]
    pub const fn emits_merged(self) -> bool {
        matches!(self, Self::Inner | Self::Optional)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Optional => "optional",
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
            Self::Minus => "minus",
            Self::Distinct => "distinct",
        }
    }
}

// ── Index configuration ────────────────────────────────────────────────────

/// Construction-time configuration of a hash index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    join_vars: JoinVars,
    #[serde(default)]
    unbound: UnboundPolicy,
}

impl IndexConfig {
    #[must_use]
    pub fn new(join_vars: JoinVars, unbound: UnboundPolicy) -> Self {
        Self { join_vars, unbound }
    }

    /// Configuration for the given operator, with its mandatory policy.
    #[must_use]
    pub fn for_join(kind: JoinKind, join_vars: JoinVars) -> Self {
        Self::new(join_vars, kind.unbound_policy())
    }

    #[must_use]
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    #[must_use]
    pub fn join_vars(&self) -> &JoinVars {
        &self.join_vars
    }

    #[must_use]
    pub const fn unbound_policy(&self) -> UnboundPolicy {
        self.unbound
    }
}

/// Builder for [`IndexConfig`].
///
/// `build` fails with [`JoinIndexError::MissingJoinVars`] when no list was
/// given; call `join_vars([])` to ask for a cross-product join explicitly.
#[derive(Debug, Clone, Default)]
pub struct IndexConfigBuilder {
    join_vars: Option<Vec<Var>>,
    unbound: UnboundPolicy,
}

impl IndexConfigBuilder {
    pub fn join_vars<I, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Var>,
    {
        self.join_vars = Some(vars.into_iter().map(Into::into).collect());
        self
    }

    pub fn unbound_policy(mut self, policy: UnboundPolicy) -> Self {
        self.unbound = policy;
        self
    }

    pub fn index_unbound(self, index_unbound: bool) -> Self {
        self.unbound_policy(UnboundPolicy::from_flag(index_unbound))
    }

    pub fn build(self) -> Result<IndexConfig> {
        let vars = self.join_vars.ok_or(JoinIndexError::MissingJoinVars)?;
        Ok(IndexConfig::new(JoinVars::new(vars)?, self.unbound))
    }
}
