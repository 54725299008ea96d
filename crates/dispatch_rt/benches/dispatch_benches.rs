// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(
    clippy::arithmetic_side_effects,
    reason = "it is fine to let our guard down in benchmark/test code"
)]

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dispatch_rt::{Dispatcher, FakeReactor, Options, Resolver, Task, Value};

fn criterion_benchmark(c: &mut Criterion) {
    submit_to_settle(c);
    pool_scale_churn(c);
}

struct Noop;

impl Task for Noop {
    fn execute(self: Box<Self>, resolver: &Resolver) {
        resolver.succeed(Value::Unit);
    }
}

/// Measures submit-to-settle latency for trivial tasks across a few pool widths.
fn submit_to_settle(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_to_settle");

    for pool_size in [1_usize, 4, 8] {
        group.throughput(criterion::Throughput::Elements(pool_size as u64));
        group.bench_with_input(
            BenchmarkId::new("pool_size", pool_size),
            &pool_size,
            |b, &pool_size| {
                let reactor = FakeReactor::new();
                let options = Options::builder()
                    .with_pool_size_min(pool_size)
                    .with_pool_size_max(pool_size)
                    .build();
                let dispatcher = Dispatcher::with_options(reactor, options);
                drain(&dispatcher);

                b.iter(|| {
                    let promises: Vec<_> = (0..pool_size)
                        .map(|_| dispatcher.execute(Box::new(Noop)))
                        .collect();
                    drain(&dispatcher);
                    for promise in promises {
                        let _ = promise.recv();
                    }
                });
            },
        );
    }

    group.finish();
}

/// Measures the cost of growing the pool from zero to `OPT_POOL_SIZE_MAX` under load and letting
/// it shrink back down via the idle sweep.
fn pool_scale_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_scale_churn");

    group.bench_function("grow_to_8_then_idle_sweep", |b| {
        b.iter(|| {
            let reactor = FakeReactor::new();
            let options = Options::builder()
                .with_pool_size_min(0)
                .with_pool_size_max(8)
                .with_idle_worker_timeout(Duration::from_millis(1))
                .build();
            let dispatcher = Dispatcher::with_options(reactor, options);

            let promises: Vec<_> = (0..8).map(|_| dispatcher.execute(Box::new(Noop))).collect();
            drain(&dispatcher);
            for promise in promises {
                let _ = promise.recv();
            }

            dispatcher.reactor().advance(Duration::from_secs(2));
            drain(&dispatcher);
        });
    });

    group.finish();
}

/// Drains the dispatcher's result channel until no task is in flight or queued.
fn drain(dispatcher: &Dispatcher<FakeReactor>) {
    for _ in 0..10_000 {
        dispatcher.run_once(Duration::from_millis(5));
        if dispatcher.is_quiescent() {
            return;
        }
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = criterion_benchmark
}

criterion_main!(benches);
