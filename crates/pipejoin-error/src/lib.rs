//! Error taxonomy for the pipejoin hash-index engine.
//!
//! Only construction can fail. A solution that lacks a required join-variable
//! binding is not an error: key formation reports it as a tagged rejection and
//! the caller drops the solution.

use thiserror::Error;

/// Errors surfaced by index construction and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinIndexError {
    /// No join-variable list was supplied. An empty list is allowed (it
    /// selects a cross-product join); an absent one is not.
    #[error("join variable list is required (use an empty list for a cross-product join)")]
    MissingJoinVars,

    /// The same variable appears twice in the join-variable list.
    #[error("duplicate join variable: ?{name}")]
    DuplicateJoinVar { name: String },

    /// A join variable with an empty name.
    #[error("join variable name must not be empty")]
    EmptyJoinVarName,

    /// No backing map was supplied to the pipelined index builder.
    #[error("backing map is required")]
    MissingBackingMap,

    /// The supplied backing map already holds buckets.
    #[error("backing map must be empty, found {buckets} bucket(s)")]
    BackingMapNotEmpty { buckets: usize },
}

impl JoinIndexError {
    /// Whether this error was raised while validating configuration.
    ///
    /// Configuration errors are fatal: the index is never usable after one.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        match self {
            Self::MissingJoinVars
            | Self::DuplicateJoinVar { .. }
            | Self::EmptyJoinVarName
            | Self::MissingBackingMap
            | Self::BackingMapNotEmpty { .. } => true,
        }
    }

    pub fn duplicate_join_var(name: impl Into<String>) -> Self {
        Self::DuplicateJoinVar { name: name.into() }
    }
}

/// Result alias used across the pipejoin crates.
pub type Result<T, E = JoinIndexError> = std::result::Result<T, E>;
