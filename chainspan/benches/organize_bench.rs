// Organizer and query benchmarks for chainspan.
//
// Covers linking a straight chain, settling a forest with many forks,
// the same workload on sled, and the O(1) ancestry check.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use chainspan::{forest, BlockHash, ForestDb, MemoryStore, Organizer, RecordStore};

fn hash(n: u64) -> BlockHash {
    BlockHash::digest(&n.to_be_bytes())
}

/// Headers for a random tree of `size` blocks under root 0, as
/// (hash, prev_hash) pairs in creation order.
fn random_tree(size: u64, seed: u64) -> Vec<(BlockHash, BlockHash)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (1..=size)
        .map(|n| {
            // Bias towards recent blocks so the tree has long chains.
            let back = rng.gen_range(1..=n.min(4));
            (hash(n), hash(n - back))
        })
        .collect()
}

fn settle<S: RecordStore>(store: S, headers: &[(BlockHash, BlockHash)]) -> Organizer<S> {
    let mut organizer = Organizer::new(store);
    organizer.add_root(hash(0)).unwrap();
    for (h, prev) in headers {
        organizer.ingest(*h, *prev).unwrap();
    }
    organizer.organize_until_settled().unwrap();
    organizer
}

fn bench_linear_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("organize/linear");

    for size in [100u64, 500, 1_000] {
        let headers: Vec<_> = (1..=size).map(|n| (hash(n), hash(n - 1))).collect();

        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &headers, |b, headers| {
            b.iter(|| settle(MemoryStore::new(), headers));
        });
    }

    group.finish();
}

fn bench_forked_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("organize/forked");
    group.sample_size(20);

    for size in [50u64, 200, 500] {
        let headers = random_tree(size, 7);

        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &headers, |b, headers| {
            b.iter(|| settle(MemoryStore::new(), headers));
        });
    }

    group.finish();
}

fn bench_forked_tree_sled(c: &mut Criterion) {
    let headers = random_tree(200, 7);
    let mut group = c.benchmark_group("organize/sled");
    group.sample_size(10);

    group.bench_function("forked_200", |b| {
        b.iter(|| settle(ForestDb::open_temporary().unwrap(), &headers));
    });

    group.finish();
}

fn bench_is_ancestor(c: &mut Criterion) {
    let organizer = settle(MemoryStore::new(), &random_tree(500, 11));
    let linked = organizer.store().linked_records().unwrap();
    let a = linked[0].linkage.unwrap();
    let b = linked[linked.len() - 1].linkage.unwrap();

    c.bench_function("query/is_ancestor", |bench| {
        bench.iter(|| forest::is_ancestor(&a, &b));
    });

    let view = organizer.forest();
    c.bench_function("query/relation_by_hash", |bench| {
        bench.iter(|| view.relation(&linked[0].hash, &linked[1].hash).unwrap());
    });
}

criterion_group!(
    benches,
    bench_linear_chain,
    bench_forked_tree,
    bench_forked_tree_sled,
    bench_is_ancestor,
);
criterion_main!(benches);
