use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A query variable, e.g. `?x`.
///
/// The name is stored without the leading `?`. Cloning is a reference-count
/// bump, so variables can be copied freely into keys and binding sets.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Var(Arc<str>);

impl Var {
    /// Create a variable. A single leading `?` or `$` is stripped.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let trimmed = name
            .strip_prefix('?')
            .or_else(|| name.strip_prefix('$'))
            .unwrap_or(name);
        Self(Arc::from(trimmed))
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Var {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
