use affinity_executor::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STRATEGIES: [AffinityStrategy; 2] = [AffinityStrategy::Hash, AffinityStrategy::RoundRobin];

fn benchmark_router_creation(c: &mut Criterion) {
    c.bench_function("router_creation", |b| {
        b.iter(|| {
            let router = AffinityRouter::<u64>::new(AffinityStrategy::Hash, 4)
                .expect("Failed to create router");
            router.shutdown(0);
        });
    });
}

fn benchmark_key_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_resolution");

    for strategy in STRATEGIES {
        // Keys already mapped: the lookup fast path
        group.bench_function(format!("{}_known_keys_100", strategy.name()), |b| {
            b.iter_batched(
                || {
                    let router =
                        AffinityRouter::new(strategy, 4).expect("Failed to create router");
                    for key in 0..100u64 {
                        router.execute(key, || Ok(()));
                    }
                    router
                },
                |router| {
                    for key in 0..100u64 {
                        router.execute(black_box(key), || Ok(()));
                    }
                    router.shutdown(0);
                },
                BatchSize::SmallInput,
            );
        });

        // Every key is new: insertion (and round advance) on each submit
        group.bench_function(format!("{}_new_keys_100", strategy.name()), |b| {
            b.iter_batched(
                || AffinityRouter::new(strategy, 4).expect("Failed to create router"),
                |router| {
                    for key in 0..100u64 {
                        router.execute(black_box(key), || Ok(()));
                    }
                    router.shutdown(0);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_concurrent_submission(c: &mut Criterion) {
    c.bench_function("concurrent_submission_4_threads", |b| {
        b.iter_batched(
            || {
                Arc::new(
                    AffinityRouter::new(AffinityStrategy::RoundRobin, 4)
                        .expect("Failed to create router"),
                )
            },
            |router| {
                let handles: Vec<_> = (0..4u64)
                    .map(|thread| {
                        let router = Arc::clone(&router);
                        std::thread::spawn(move || {
                            for i in 0..25u64 {
                                router.execute(thread * 1_000 + i % 8, || Ok(()));
                            }
                        })
                    })
                    .collect();

                for handle in handles {
                    handle.join().expect("Thread panicked");
                }

                router.shutdown(0);
            },
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("tasks_per_second", |b| {
        b.iter_batched(
            || {
                let router = AffinityRouter::new(AffinityStrategy::Hash, 8)
                    .expect("Failed to create router");
                let counter = Arc::new(AtomicU64::new(0));
                (router, counter)
            },
            |(router, counter)| {
                for i in 0..1000u64 {
                    let counter = Arc::clone(&counter);
                    router.execute(i % 64, move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    });
                }

                router.shutdown(0);

                let total = counter.load(Ordering::Relaxed);
                assert_eq!(total, 1000, "Not all tasks completed");
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_cancel_with_backlog(c: &mut Criterion) {
    c.bench_function("cancel_with_backlog", |b| {
        b.iter_batched(
            || {
                let router = AffinityRouter::new(AffinityStrategy::Hash, 4)
                    .expect("Failed to create router");
                for i in 0..400u64 {
                    router.execute(i % 4, || {
                        std::thread::sleep(Duration::from_micros(100));
                        Ok(())
                    });
                }
                router
            },
            |router| {
                black_box(router.shutdown(-1));
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    benchmark_router_creation,
    benchmark_key_resolution,
    benchmark_concurrent_submission,
    benchmark_throughput,
    benchmark_cancel_with_backlog
);
criterion_main!(benches);
