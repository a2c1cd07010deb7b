use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scheduler::{Continuation, Scheduler, SchedulerConfig};

fn spawn_complete(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_complete");
    for workers in [1usize, 4] {
        let sched = Scheduler::new(SchedulerConfig::with_workers(workers)).unwrap();
        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| {
                for i in 0..1_000u64 {
                    black_box(sched.spawn(async move { i * 2 }));
                }
                sched.wait_quiescent();
            })
        });
        sched.shutdown();
    }
    group.finish();
}

fn suspend_resume(c: &mut Criterion) {
    let sched = Scheduler::new(SchedulerConfig::with_workers(4)).unwrap();
    c.bench_function("suspend_resume_1000", |b| {
        b.iter(|| {
            let gate: Continuation<u64> = Continuation::new();
            for _ in 0..1_000 {
                let reader = gate.clone();
                black_box(sched.spawn(async move { reader.await }));
            }
            gate.set_value(1).unwrap();
            sched.wait_quiescent();
        })
    });
    sched.shutdown();
}

criterion_group!(benches, spawn_complete, suspend_resume);
criterion_main!(benches);
