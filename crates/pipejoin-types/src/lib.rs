//! Core value types shared by the pipejoin crates.

pub mod config;
pub mod solution;
pub mod term;
pub mod var;

pub use config::{IndexConfig, IndexConfigBuilder, JoinKind, JoinVars, UnboundPolicy};
pub use solution::Solution;
pub use term::{Literal, Term};
pub use var::Var;
