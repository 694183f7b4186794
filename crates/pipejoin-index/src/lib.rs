//! Hash indices for pipelined join evaluation over SPARQL solutions.
//!
//! A [`HashIndex`] maps the bindings of a fixed list of join variables to a
//! [`Bucket`] of solutions. Join, DISTINCT and anti-join operators build it
//! from streamed chunks, probe it by key, and use per-entry hit counters to
//! find build solutions that never matched.
//!
//! [`PipelinedHashIndex`] wraps the same structure behind one lock so that
//! probers running on several threads can insert, look up and remove
//! entries while the index is live.

pub mod antijoin;
pub mod bucket;
pub mod hit;
pub mod index;
pub mod instrumentation;
pub mod join;
pub mod key;
pub mod map;
pub mod pipelined;

pub use antijoin::{HitFilter, HitScan, HitSnapshot, IndexStats};
pub use bucket::Bucket;
pub use hit::{EntryId, SolutionHit};
pub use index::{ChunkOutcome, HashIndex};
pub use instrumentation::{JoinIndexMetricsSnapshot, join_index_metrics_snapshot};
pub use join::{ProbeOutcome, evaluate, probe_join, probe_join_consuming, probe_join_shared};
pub use key::{Key, KeyFormation, KeySlot, make_key};
pub use map::{BucketMap, HashBucketMap, InsertionOrderedBucketMap, OrderedBucketMap};
pub use pipelined::{PipelinedHashIndex, PipelinedHashIndexBuilder};

pub use pipejoin_error::{JoinIndexError, Result};
pub use pipejoin_types::{
    IndexConfig, IndexConfigBuilder, JoinKind, JoinVars, Solution, Term, UnboundPolicy, Var,
};
