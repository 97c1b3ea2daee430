//! Basic usage: a single task with delay and timeout, then a parallel batch
//! with progress reporting.

use std::error::Error;
use std::time::Duration;

use taskctl::telemetry::init_tracing;
use taskctl::{BatchTaskRunner, EngineError, SingleTaskRunner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing("taskctl=info");

    println!("Single task with a 100ms delay and a 1s timeout");
    let result = SingleTaskRunner::from_async(|| async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, EngineError>("hello from the worker pool")
    })
    .with_delay(Duration::from_millis(100))
    .with_timeout(Duration::from_secs(1), |elapsed| {
        println!("  timed out after {elapsed:?}");
    })?
    .with_completion_callback(|value| println!("  completed: {value}"))
    .run()
    .await;
    println!("  final state: {} in {:?}\n", result.final_state(), result.elapsed());

    println!("Single task that outlives its timeout");
    let result = SingleTaskRunner::from_async(|| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok::<_, EngineError>(())
    })
    .with_timeout(Duration::from_millis(200), |elapsed| {
        println!("  timeout handler fired after {elapsed:?}");
    })?
    .run()
    .await;
    println!("  final state: {}\n", result.final_state());

    println!("Parallel batch of 12 items, 4 at a time");
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel::<f64>();
    let printer = tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            println!("  progress: {:>3.0}%", progress * 100.0);
        }
    });

    let result = BatchTaskRunner::from_async(1..=12u64, |n| async move {
        tokio::time::sleep(Duration::from_millis(20 * (n % 4 + 1))).await;
        Ok::<_, EngineError>(n * n)
    })
    .with_max_concurrency(4)?
    .with_progress(progress_tx)
    .run()
    .await;
    printer.await?;

    let mut squares = result.into_results().unwrap_or_default();
    squares.sort_unstable();
    println!("  squares: {squares:?}");

    Ok(())
}
