//! Operator-level probe helpers.
//!
//! The build side (the pipeline's left input) is indexed first; each probe
//! solution is then matched against the bucket for its key. Candidates in a
//! bucket share the join-key values but may still disagree on other shared
//! variables, so every candidate is re-checked with [`Solution::merge`].
//!
//! | kind        | match marks hit | merged output | emitted at end      |
//! |-------------|-----------------|---------------|--------------------|
//! | `Inner`     | no              | yes           | nothing            |
//! | `Optional`  | yes             | yes           | unjoined build     |
//! | `Exists`    | yes             | no            | joined build       |
//! | `NotExists` | yes             | no            | unjoined build     |
//! | `Minus`     | yes             | no            | unjoined build     |
//!
//! MINUS only counts a match when the two solutions share a bound variable.
//! `Distinct` does not probe; it deduplicates through
//! [`HashIndex::insert_distinct`].

use std::sync::Arc;

use pipejoin_types::{IndexConfig, JoinKind, Solution, UnboundPolicy};
use tracing::{debug, trace};

use crate::hit::SolutionHit;
use crate::index::HashIndex;
use crate::map::{BucketMap, HashBucketMap};
use crate::pipelined::PipelinedHashIndex;

/// Result of probing one solution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Merged solutions, for kinds that emit them.
    pub merged: Vec<Solution>,
    /// Build entries that matched the probe.
    pub matched: usize,
}

impl ProbeOutcome {
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.matched > 0
    }
}

/// Whether `candidate` from the build side matches `probe` under `kind`.
/// Returns the merge when one exists.
fn matches(candidate: &Solution, probe: &Solution, kind: JoinKind) -> Option<Solution> {
    match kind {
        JoinKind::Distinct => (candidate == probe).then(|| candidate.clone()),
        JoinKind::Minus if !candidate.shares_bound_var(probe) => None,
        _ => candidate.merge(probe),
    }
}

fn scan_bucket<'a>(
    entries: impl Iterator<Item = &'a Arc<SolutionHit>>,
    probe: &Solution,
    kind: JoinKind,
    mut on_match: impl FnMut(&Arc<SolutionHit>),
) -> ProbeOutcome {
    let mut outcome = ProbeOutcome::default();
    for entry in entries {
        let Some(merged) = matches(entry.solution(), probe, kind) else {
            continue;
        };
        outcome.matched += 1;
        on_match(entry);
        if kind.emits_merged() {
            outcome.merged.push(merged);
        }
    }
    outcome
}

/// Probe a base index with one solution.
pub fn probe_join<M: BucketMap>(
    index: &HashIndex<M>,
    probe: &Solution,
    kind: JoinKind,
) -> ProbeOutcome {
    let Some(bucket) = index.probe(probe) else {
        return ProbeOutcome::default();
    };
    scan_bucket(bucket.iter(), probe, kind, |entry| {
        if kind.uses_hit_accounting() {
            index.mark_as_joined(entry);
        }
    })
}

/// Probe a shared index with one solution. Candidates come from a bucket
/// snapshot; hits are recorded through the index lock.
pub fn probe_join_shared<M: BucketMap>(
    index: &PipelinedHashIndex<M>,
    probe: &Solution,
    kind: JoinKind,
) -> ProbeOutcome {
    let Some(bucket) = index.probe(probe) else {
        return ProbeOutcome::default();
    };
    scan_bucket(bucket.iter(), probe, kind, |entry| {
        if kind.uses_hit_accounting() {
            index.mark_as_joined(entry);
        }
    })
}

/// Probe a shared index and remove every matched build entry in the same
/// critical section, so each build entry joins at most once across all
/// concurrent probers.
pub fn probe_join_consuming<M: BucketMap>(
    index: &PipelinedHashIndex<M>,
    probe: &Solution,
    kind: JoinKind,
) -> ProbeOutcome {
    let Some(key) = index.make_key(probe).into_key() else {
        return ProbeOutcome::default();
    };
    index.with_locked(|inner| {
        let Some(bucket) = inner.get_bucket(&key).cloned() else {
            return ProbeOutcome::default();
        };
        let mut consumed = Vec::new();
        let outcome = scan_bucket(bucket.iter(), probe, kind, |entry| {
            inner.mark_as_joined(entry);
            consumed.push(Arc::clone(entry));
        });
        for entry in &consumed {
            inner.remove_entry(&key, entry);
        }
        trace!(key = %key, consumed = consumed.len(), "probe consumed build entries");
        outcome
    })
}

/// Upgrade `config` to [`UnboundPolicy::Index`] when `kind` requires it.
fn policy_for(kind: JoinKind, config: IndexConfig) -> IndexConfig {
    if kind.unbound_policy().indexes_unbound() && !config.unbound_policy().indexes_unbound() {
        debug!(
            kind = kind.as_str(),
            "strict unbound policy overridden: operator must index every build solution"
        );
        return IndexConfig::new(config.join_vars().clone(), UnboundPolicy::Index);
    }
    config
}

/// Build an index over `build`, probe it with `probe`, and produce the
/// operator's full output.
///
/// Inner and Optional emit merges in probe order; Optional then appends the
/// unjoined build solutions. The filter kinds emit build solutions only.
/// `Distinct` treats `build` followed by `probe` as one stream.
///
/// Kinds that must keep every build solution (Optional, NotExists, Minus and
/// Distinct) always index unbound join variables, whatever policy `config`
/// carries.
pub fn evaluate<B, P>(kind: JoinKind, config: IndexConfig, build: B, probe: P) -> Vec<Solution>
where
    B: IntoIterator<Item = Solution>,
    P: IntoIterator<Item = Solution>,
{
    let _span = tracing::debug_span!("join_evaluate", kind = kind.as_str()).entered();
    let config = policy_for(kind, config);
    let mut index: HashIndex<HashBucketMap> = HashIndex::new(config);

    if kind == JoinKind::Distinct {
        let out: Vec<Solution> = build
            .into_iter()
            .chain(probe)
            .filter(|solution| index.insert_distinct(solution.clone()))
            .collect();
        debug!(emitted = out.len(), "distinct complete");
        return out;
    }

    let built = index.insert_chunk(build);
    let mut out = Vec::new();
    let mut probes = 0_usize;
    for solution in probe {
        probes += 1;
        let outcome = probe_join(&index, &solution, kind);
        out.extend(outcome.merged);
    }

    match kind {
        JoinKind::Optional | JoinKind::NotExists | JoinKind::Minus => {
            out.extend(index.scan_unjoined().cloned());
        }
        JoinKind::Exists => out.extend(index.scan_joined().cloned()),
        JoinKind::Inner | JoinKind::Distinct => {}
    }
    debug!(
        built = built.inserted,
        dropped = built.rejected,
        probes,
        emitted = out.len(),
        "join complete"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipejoin_types::{JoinVars, Term, Var};

    fn sol(pairs: &[(&str, i64)]) -> Solution {
        pairs
            .iter()
            .map(|&(v, t)| (Var::new(v), Term::Integer(t)))
            .collect()
    }

    fn on(kind: JoinKind, vars: &[&str]) -> IndexConfig {
        IndexConfig::for_join(
            kind,
            JoinVars::new(vars.iter().map(|v| Var::new(v))).unwrap(),
        )
    }

    #[test]
    fn inner_join_merges_compatible_candidates() {
        let out = evaluate(
            JoinKind::Inner,
            on(JoinKind::Inner, &["x"]),
            [sol(&[("x", 1), ("y", 1)]), sol(&[("x", 1), ("y", 2)]), sol(&[("x", 2)])],
            [sol(&[("x", 1), ("y", 2), ("z", 9)]), sol(&[("x", 3)])],
        );
        assert_eq!(out, vec![sol(&[("x", 1), ("y", 2), ("z", 9)])]);
    }

    #[test]
    fn optional_appends_unjoined_build_side() {
        let out = evaluate(
            JoinKind::Optional,
            on(JoinKind::Optional, &["x"]),
            [sol(&[("x", 1)]), sol(&[("x", 2)])],
            [sol(&[("x", 1), ("z", 5)])],
        );
        assert_eq!(out, vec![sol(&[("x", 1), ("z", 5)]), sol(&[("x", 2)])]);
    }

    #[test]
    fn exists_and_not_exists_partition_build_side() {
        let build = [sol(&[("x", 1)]), sol(&[("x", 2)])];
        let probe = [sol(&[("x", 1)])];
        let exists = evaluate(
            JoinKind::Exists,
            on(JoinKind::Exists, &["x"]),
            build.clone(),
            probe.clone(),
        );
        let not_exists = evaluate(
            JoinKind::NotExists,
            on(JoinKind::NotExists, &["x"]),
            build,
            probe,
        );
        assert_eq!(exists, vec![sol(&[("x", 1)])]);
        assert_eq!(not_exists, vec![sol(&[("x", 2)])]);
    }

    #[test]
    fn minus_requires_shared_bound_variable() {
        // Cross-product MINUS: disjoint domains never remove anything.
        let out = evaluate(
            JoinKind::Minus,
            on(JoinKind::Minus, &[]),
            [sol(&[("a", 1)]), sol(&[("b", 2)])],
            [sol(&[("c", 3)]), sol(&[("b", 2)])],
        );
        assert_eq!(out, vec![sol(&[("a", 1)])]);
    }

    #[test]
    fn distinct_drops_repeats_across_inputs() {
        let out = evaluate(
            JoinKind::Distinct,
            on(JoinKind::Distinct, &["x"]),
            [sol(&[("x", 1)]), sol(&[("x", 1)])],
            [sol(&[("x", 1)]), sol(&[("y", 1)])],
        );
        assert_eq!(out, vec![sol(&[("x", 1)]), sol(&[("y", 1)])]);
    }

    fn strict(vars: &[&str]) -> IndexConfig {
        IndexConfig::new(
            JoinVars::new(vars.iter().map(|v| Var::new(v))).unwrap(),
            UnboundPolicy::Reject,
        )
    }

    #[test]
    fn optional_keeps_build_rows_despite_strict_config() {
        let out = evaluate(
            JoinKind::Optional,
            strict(&["x"]),
            [sol(&[("y", 1)])],
            [sol(&[("x", 1)])],
        );
        assert_eq!(out, vec![sol(&[("y", 1)])], "case=unbound_build_row_kept");
    }

    #[test]
    fn distinct_keeps_unbound_rows_despite_strict_config() {
        let out = evaluate(
            JoinKind::Distinct,
            strict(&["x"]),
            [sol(&[("y", 1)]), sol(&[("y", 1)])],
            Vec::new(),
        );
        assert_eq!(out, vec![sol(&[("y", 1)])], "case=unbound_row_not_a_duplicate");
    }

    #[test]
    fn not_exists_and_minus_keep_unbound_build_rows() {
        for kind in [JoinKind::NotExists, JoinKind::Minus] {
            let out = evaluate(kind, strict(&["x"]), [sol(&[("y", 1)])], [sol(&[("x", 1)])]);
            assert_eq!(out, vec![sol(&[("y", 1)])], "case=kind_{}", kind.as_str());
        }
    }

    #[test]
    fn inner_join_keeps_strict_policy() {
        let out = evaluate(
            JoinKind::Inner,
            strict(&["x"]),
            [sol(&[("y", 1)]), sol(&[("x", 1)])],
            [sol(&[("x", 1), ("z", 2)])],
        );
        assert_eq!(out, vec![sol(&[("x", 1), ("z", 2)])]);
    }

    #[test]
    fn incompatible_candidate_is_not_marked() {
        let mut index = HashIndex::new(on(JoinKind::NotExists, &["x"]));
        let entry = index.insert(sol(&[("x", 1), ("y", 1)])).unwrap();
        let outcome = probe_join(&index, &sol(&[("x", 1), ("y", 2)]), JoinKind::NotExists);
        assert!(!outcome.is_match());
        assert_eq!(entry.hit_count(), 0);
    }

    #[test]
    fn consuming_probe_removes_matches_once() {
        let index = PipelinedHashIndex::with_hash_map(on(JoinKind::Inner, &["x"]));
        index.insert(sol(&[("x", 1), ("y", 1)])).unwrap();
        index.insert(sol(&[("x", 1), ("y", 2)])).unwrap();

        let first = probe_join_consuming(&index, &sol(&[("x", 1), ("y", 2)]), JoinKind::Inner);
        assert_eq!(first.matched, 1);
        assert_eq!(index.solution_count(), 1);

        let again = probe_join_consuming(&index, &sol(&[("x", 1), ("y", 2)]), JoinKind::Inner);
        assert!(!again.is_match(), "case=consumed_entry_gone");

        let rest = probe_join_consuming(&index, &sol(&[("x", 1)]), JoinKind::Inner);
        assert_eq!(rest.merged, vec![sol(&[("x", 1), ("y", 1)])]);
        assert!(index.is_empty());
    }

    #[test]
    fn shared_probe_marks_through_lock() {
        let index = PipelinedHashIndex::with_hash_map(on(JoinKind::Optional, &["x"]));
        index.insert(sol(&[("x", 1)])).unwrap();
        index.insert(sol(&[("x", 2)])).unwrap();
        let outcome = probe_join_shared(&index, &sol(&[("x", 2), ("z", 0)]), JoinKind::Optional);
        assert_eq!(outcome.merged, vec![sol(&[("x", 2), ("z", 0)])]);
        let unjoined: Vec<Solution> = index.scan_unjoined().collect();
        assert_eq!(unjoined, vec![sol(&[("x", 1)])]);
    }
}
