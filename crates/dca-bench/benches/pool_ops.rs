//! Criterion micro-benchmarks for job submission and fork-join on both
//! worker-pool backends.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use dca_parallel::{Executor, TaskPool, Threading, WorkerPool};

const JOBS: u64 = 1_000;

fn submit_and_wait<E: Executor>(pool: &E) -> u64 {
    let hits = Arc::new(AtomicU64::new(0));
    let handles: Vec<_> = (0..JOBS)
        .map(|_| {
            let hits = Arc::clone(&hits);
            pool.enqueue(move || hits.fetch_add(1, Ordering::Relaxed))
                .unwrap()
        })
        .collect();
    for handle in handles {
        handle.wait().unwrap();
    }
    hits.load(Ordering::Relaxed)
}

fn bench_submit(c: &mut Criterion) {
    let native = WorkerPool::with_workers(4).unwrap();
    c.bench_function("worker_pool_submit_1k", |b| {
        b.iter(|| black_box(submit_and_wait(&native)));
    });

    let task = TaskPool::with_workers(4).unwrap();
    c.bench_function("task_pool_submit_1k", |b| {
        b.iter(|| black_box(submit_and_wait(&task)));
    });
}

fn bench_sum_reduction(c: &mut Criterion) {
    let pool = WorkerPool::with_workers(8).unwrap();
    c.bench_function("sum_reduction_8x100k", |b| {
        b.iter(|| {
            let threading = Threading::new(&pool);
            let total: u64 = threading
                .sum_reduction(8, |id, n| {
                    let chunk = 100_000 / n as u64;
                    (id as u64 * chunk..(id as u64 + 1) * chunk).sum::<u64>()
                })
                .unwrap();
            black_box(total)
        });
    });
}

criterion_group!(benches, bench_submit, bench_sum_reduction);
criterion_main!(benches);
