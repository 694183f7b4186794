//! RDF terms bound to query variables.
//!
//! Terms compare by identity of their lexical/numeric form (RDF term
//! equality), not by value-space equivalence: `"1"^^xsd:int` and the integer
//! `1` are different terms. Doubles compare by bit pattern so that `Eq`,
//! `Hash` and `Ord` agree with each other.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A literal with an optional datatype IRI or language tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: Arc<str>,
    pub datatype: Option<Arc<str>>,
    pub language: Option<Arc<str>>,
}

/// A bound value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Iri(Arc<str>),
    BlankNode(Arc<str>),
    Literal(Literal),
    Integer(i64),
    Double(f64),
    Boolean(bool),
}

impl Term {
    #[must_use]
    pub fn iri(iri: &str) -> Self {
        Self::Iri(Arc::from(iri))
    }

    #[must_use]
    pub fn blank(label: &str) -> Self {
        Self::BlankNode(Arc::from(label))
    }

    /// Plain string literal.
    #[must_use]
    pub fn literal(lexical: &str) -> Self {
        Self::Literal(Literal {
            lexical: Arc::from(lexical),
            datatype: None,
            language: None,
        })
    }

    #[must_use]
    pub fn typed_literal(lexical: &str, datatype: &str) -> Self {
        Self::Literal(Literal {
            lexical: Arc::from(lexical),
            datatype: Some(Arc::from(datatype)),
            language: None,
        })
    }

    #[must_use]
    pub fn lang_literal(lexical: &str, language: &str) -> Self {
        Self::Literal(Literal {
            lexical: Arc::from(lexical),
            datatype: None,
            language: Some(Arc::from(language)),
        })
    }

    /// Stable rank of the variant, used for hashing and cross-variant ordering.
    const fn rank(&self) -> u8 {
        match self {
            Self::Iri(_) => 0,
            Self::BlankNode(_) => 1,
            Self::Literal(_) => 2,
            Self::Integer(_) => 3,
            Self::Double(_) => 4,
            Self::Boolean(_) => 5,
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Iri(a), Self::Iri(b)) | (Self::BlankNode(a), Self::BlankNode(b)) => a == b,
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.rank());
        match self {
            Self::Iri(s) | Self::BlankNode(s) => s.hash(state),
            Self::Literal(lit) => lit.hash(state),
            Self::Integer(v) => v.hash(state),
            Self::Double(v) => v.to_bits().hash(state),
            Self::Boolean(v) => v.hash(state),
        }
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Iri(a), Self::Iri(b)) | (Self::BlankNode(a), Self::BlankNode(b)) => a.cmp(b),
            (Self::Literal(a), Self::Literal(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b),
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for Term {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for Term {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => write!(f, "<{iri}>"),
            Self::BlankNode(label) => write!(f, "_:{label}"),
            Self::Literal(lit) => {
                write!(f, "\"{}\"", lit.lexical)?;
                if let Some(lang) = &lit.language {
                    write!(f, "@{lang}")
                } else if let Some(dt) = &lit.datatype {
                    write!(f, "^^<{dt}>")
                } else {
                    Ok(())
                }
            }
            Self::Integer(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v:e}"),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}
