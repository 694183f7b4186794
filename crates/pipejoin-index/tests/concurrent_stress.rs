//! Threaded stress tests for the pipelined index.
//!
//! Run with:
//! ```sh
//! cargo test -p pipejoin-index --test concurrent_stress
//! ```

use std::sync::{Arc, Barrier};
use std::thread;

use pipejoin_index::{
    HashBucketMap, JoinKind, Key, PipelinedHashIndex, Solution, Term, Var, probe_join_consuming,
};

const WORKERS: u16 = 8;
const ROWS_PER_WORKER: u16 = 200;

fn row_key(worker: u16, n: u16) -> i64 {
    i64::from(worker) * 10_000 + i64::from(n)
}

fn row(worker: u16, n: u16) -> Solution {
    Solution::from_bindings([
        (Var::new("x"), Term::Integer(row_key(worker, n))),
        (Var::new("w"), Term::Integer(i64::from(worker))),
    ])
}

fn shared_index() -> Arc<PipelinedHashIndex<HashBucketMap>> {
    Arc::new(
        PipelinedHashIndex::builder()
            .join_vars(["x"])
            .backing_map(HashBucketMap::new())
            .build()
            .expect("valid index"),
    )
}

#[test]
fn concurrent_inserts_with_distinct_keys_are_isolated() {
    let index = shared_index();
    let barrier = Arc::new(Barrier::new(usize::from(WORKERS)));

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let index = Arc::clone(&index);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for n in 0..ROWS_PER_WORKER {
                    index.insert(row(worker, n)).expect("key formed");
                }
                barrier.wait();
                // Every lookup sees exactly this worker's own solution.
                for n in 0..ROWS_PER_WORKER {
                    let key = Key::bound([Term::Integer(row_key(worker, n))]);
                    let bucket = index.get_bucket(&key).expect("bucket present");
                    assert_eq!(bucket.len(), 1, "worker={worker} n={n}");
                    assert_eq!(
                        bucket.entries()[0].solution(),
                        &row(worker, n),
                        "worker={worker} n={n}"
                    );
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let expected = usize::from(WORKERS) * usize::from(ROWS_PER_WORKER);
    assert_eq!(index.solution_count(), expected);
    assert_eq!(index.bucket_count(), expected);
}

#[test]
fn concurrent_remove_and_lookup_on_one_key() {
    let index = shared_index();
    let key = Key::bound([Term::Integer(7)]);
    let entries: Vec<_> = (0..ROWS_PER_WORKER)
        .map(|n| {
            index
                .insert(Solution::from_bindings([
                    (Var::new("x"), Term::Integer(7)),
                    (Var::new("n"), Term::Integer(i64::from(n))),
                ]))
                .expect("key formed")
        })
        .collect();
    let entries = Arc::new(entries);

    let remover = {
        let index = Arc::clone(&index);
        let entries = Arc::clone(&entries);
        let key = key.clone();
        thread::spawn(move || {
            entries
                .iter()
                .filter(|entry| index.remove_entry(&key, entry))
                .count()
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            let key = key.clone();
            thread::spawn(move || {
                let mut last = usize::MAX;
                loop {
                    let Some(bucket) = index.get_bucket(&key) else {
                        break;
                    };
                    // A snapshot is never empty and only ever shrinks.
                    assert!(!bucket.is_empty());
                    assert!(bucket.len() <= last);
                    last = bucket.len();
                    // Survivors keep their relative insertion order.
                    let ids: Vec<_> = bucket.iter().map(|entry| entry.id()).collect();
                    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
                }
            })
        })
        .collect();

    let removed = remover.join().expect("remover panicked");
    for reader in readers {
        reader.join().expect("reader panicked");
    }

    assert_eq!(removed, usize::from(ROWS_PER_WORKER));
    assert!(index.get_bucket(&key).is_none());
    assert!(index.is_empty());
    assert!(entries.iter().all(|entry| !entry.is_live()));
}

#[test]
fn concurrent_marks_are_all_counted() {
    let index = shared_index();
    let entry = index
        .insert(Solution::from_bindings([(Var::new("x"), Term::Integer(1))]))
        .expect("key formed");

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let index = Arc::clone(&index);
            let entry = Arc::clone(&entry);
            thread::spawn(move || {
                for _ in 0..100 {
                    assert!(index.mark_as_joined(&entry));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(entry.hit_count(), u64::from(WORKERS) * 100);
    assert_eq!(index.scan_unjoined().count(), 0);
}

#[test]
fn consuming_probes_join_each_build_entry_once() {
    let index = shared_index();
    for n in 0..ROWS_PER_WORKER {
        index
            .insert(Solution::from_bindings([
                (Var::new("x"), Term::Integer(i64::from(n % 4))),
                (Var::new("n"), Term::Integer(i64::from(n))),
            ]))
            .expect("key formed");
    }

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                let mut matched = 0;
                for x in 0..4 {
                    let probe = Solution::from_bindings([(Var::new("x"), Term::Integer(x))]);
                    matched += probe_join_consuming(&index, &probe, JoinKind::Inner).matched;
                }
                matched
            })
        })
        .collect();

    let total: usize = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker panicked"))
        .sum();
    assert_eq!(total, usize::from(ROWS_PER_WORKER));
    assert!(index.is_empty());
}
