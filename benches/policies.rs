//! Per-request cost of each eviction policy.
//!
//! Run with: `cargo bench --bench policies`
//!
//! Every policy replays the same pre-generated request stream, so the
//! numbers compare lookup, promotion and eviction work only.

use std::hint::black_box;

use cachesim::builder::{CommonCacheParams, create_cache};
use cachesim::request::Request;
use cachesim::trace::workload::{ObjectSize, Workload, WorkloadSpec};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

const CAPACITY: u64 = 4096;
const UNIVERSE: u64 = 16_384;
const OPS: usize = 100_000;
const SEED: u64 = 42;

const POLICIES: [&str; 6] = ["lru", "mru", "fifo", "random", "slru", "arc"];

// ============================================================================
// Workload definitions
// ============================================================================

fn workloads() -> Vec<(&'static str, Workload)> {
    vec![
        ("uniform", Workload::Uniform),
        (
            "hotset_90_10",
            Workload::Hotset {
                hot_fraction: 0.1,
                hot_prob: 0.9,
            },
        ),
        ("scan", Workload::Scan),
        ("zipfian_0.99", Workload::Zipfian { theta: 0.99 }),
    ]
}

fn requests(workload: Workload) -> Vec<Request> {
    WorkloadSpec {
        universe: UNIVERSE,
        workload,
        seed: SEED,
        size: ObjectSize::Fixed(1),
    }
    .generator()
    .take(OPS)
    .collect()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_get(c: &mut Criterion) {
    for (workload_name, workload) in workloads() {
        let reqs = requests(workload);
        let mut group = c.benchmark_group(format!("get/{workload_name}"));
        group.throughput(Throughput::Elements(OPS as u64));

        for policy in POLICIES {
            group.bench_with_input(BenchmarkId::from_parameter(policy), &reqs, |b, reqs| {
                b.iter(|| {
                    let params = CommonCacheParams::new(CAPACITY).with_hash_power(14);
                    let mut cache = create_cache(policy, params, None).unwrap();
                    let mut hits = 0u64;
                    for req in reqs {
                        hits += u64::from(cache.get(req).unwrap().is_hit());
                    }
                    black_box(hits)
                })
            });
        }
        group.finish();
    }
}

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit");
    group.throughput(Throughput::Elements(OPS as u64));

    for policy in POLICIES {
        group.bench_function(policy, |b| {
            let params = CommonCacheParams::new(CAPACITY).with_hash_power(14);
            let mut cache = create_cache(policy, params, None).unwrap();
            for id in 0..CAPACITY / 2 {
                cache.get(&Request::new(id, 1)).unwrap();
            }
            b.iter(|| {
                for i in 0..OPS as u64 {
                    black_box(cache.get(&Request::new(i % (CAPACITY / 2), 1)).unwrap());
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_get, bench_get_hit);
criterion_main!(benches);
