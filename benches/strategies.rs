use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use axiom_arbiter::{Arbiter, CancelSignal, Config, Ring, StrategyKind, WorkerId};

const CYCLES: u64 = 2_000;

/// Every worker acquires and releases its pair `CYCLES` times with no think
/// or eat time, so the strategy itself is the only cost.
fn hammer(arbiter: Arc<dyn Arbiter>, ring: Ring) {
    let cancel = CancelSignal::new();
    let handles: Vec<_> = ring
        .workers()
        .map(|id: WorkerId| {
            let arbiter = Arc::clone(&arbiter);
            let cancel = cancel.clone();
            thread::spawn(move || {
                for _ in 0..CYCLES {
                    if arbiter.acquire(id, &cancel) {
                        arbiter.release(id);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        let _ = h.join();
    }
}

fn bench_strategies(c: &mut Criterion) {
    let config = Config::default().with_poll_interval(Duration::from_micros(50));

    let mut group = c.benchmark_group("pair_arbitration");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for workers in [2usize, 6, 12] {
        let ring = Ring::new(workers).unwrap();
        group.throughput(Throughput::Elements(CYCLES * workers as u64));
        for kind in StrategyKind::ALL {
            group.bench_with_input(BenchmarkId::new(kind.name(), workers), &ring, |b, &ring| {
                b.iter(|| hammer(kind.build(ring, &config), ring));
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_strategies);
criterion_main!(benches);
