use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use taskctl::{BatchTaskRunner, EngineError, ExecutionController, SingleTaskRunner};
use tokio::runtime::Runtime;

fn benchmark_controller_transitions(c: &mut Criterion) {
    c.bench_function("controller_start_pause_cancel", |b| {
        b.iter(|| {
            let controller = ExecutionController::new();
            controller.start();
            controller.pause();
            controller.start();
            black_box(controller.cancel())
        })
    });
}

fn benchmark_single_task(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("single_task_foreground", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = SingleTaskRunner::from_fn(|| Ok::<_, EngineError>(black_box(42u64)))
                    .with_background(false)
                    .run()
                    .await;
                black_box(result.into_result())
            })
        })
    });

    c.bench_function("single_task_background", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = SingleTaskRunner::from_fn(|| Ok::<_, EngineError>(black_box(42u64)))
                    .run()
                    .await;
                black_box(result.into_result())
            })
        })
    });
}

fn benchmark_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("batch_1000_items");

    for max_concurrency in [1usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::new("parallel_async", max_concurrency),
            &max_concurrency,
            |b, &max_concurrency| {
                b.iter(|| {
                    rt.block_on(async {
                        let result = BatchTaskRunner::from_async(0..1000u64, |n| async move {
                            Ok::<_, EngineError>(n.wrapping_mul(31))
                        })
                        .with_max_concurrency(max_concurrency)
                        .unwrap()
                        .run()
                        .await;
                        black_box(result.into_results())
                    })
                })
            },
        );
    }

    group.bench_function("sequential_foreground", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = BatchTaskRunner::from_fn(0..1000u64, |n| Ok::<_, EngineError>(n.wrapping_mul(31)))
                    .sequential()
                    .with_background(false)
                    .run()
                    .await;
                black_box(result.into_results())
            })
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_controller_transitions,
    benchmark_single_task,
    benchmark_batch
);
criterion_main!(benches);
