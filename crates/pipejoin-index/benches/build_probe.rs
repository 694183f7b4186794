use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pipejoin_index::{
    HashIndex, IndexConfig, JoinKind, JoinVars, OrderedBucketMap, Solution, Term, Var,
    probe_join,
};

/// Distinct join-key values; solutions cycle through them so buckets grow.
const KEY_CARDINALITY: i64 = 1_024;

fn solution(row: i64) -> Solution {
    Solution::from_bindings([
        (Var::new("s"), Term::Integer(row % KEY_CARDINALITY)),
        (Var::new("p"), Term::iri("http://example.org/p")),
        (Var::new("o"), Term::literal(&format!("row-{row:06}"))),
    ])
}

fn probe_row(row: i64) -> Solution {
    Solution::from_bindings([
        (Var::new("s"), Term::Integer(row % KEY_CARDINALITY)),
        (Var::new("q"), Term::Integer(row)),
    ])
}

fn config(kind: JoinKind) -> IndexConfig {
    IndexConfig::for_join(kind, JoinVars::new([Var::new("s")]).expect("valid join vars"))
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_index_build");
    for rows in [4_096_u32, 16_384_u32] {
        let input: Vec<Solution> = (0..i64::from(rows)).map(solution).collect();
        group.throughput(Throughput::Elements(u64::from(rows)));
        group.bench_with_input(BenchmarkId::new("hash", rows), &input, |b, input| {
            b.iter(|| {
                let mut index = HashIndex::new(config(JoinKind::Inner));
                let outcome = index.insert_chunk(input.iter().cloned());
                criterion::black_box(outcome.inserted);
            });
        });
        group.bench_with_input(BenchmarkId::new("ordered", rows), &input, |b, input| {
            b.iter(|| {
                let mut index =
                    HashIndex::with_map(config(JoinKind::Inner), OrderedBucketMap::new())
                        .expect("empty map");
                let outcome = index.insert_chunk(input.iter().cloned());
                criterion::black_box(outcome.inserted);
            });
        });
    }
    group.finish();
}

fn bench_probe(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_index_probe");
    for kind in [JoinKind::Inner, JoinKind::NotExists] {
        let mut index = HashIndex::new(config(kind));
        let _ = index.insert_chunk((0..16_384).map(solution));
        let probes: Vec<Solution> = (0..2_048).map(probe_row).collect();
        group.throughput(Throughput::Elements(probes.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(kind.as_str()),
            &probes,
            |b, probes| {
                b.iter(|| {
                    let mut matched = 0_usize;
                    for probe in probes {
                        matched += probe_join(&index, probe, kind).matched;
                    }
                    criterion::black_box(matched);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_probe);
criterion_main!(benches);
