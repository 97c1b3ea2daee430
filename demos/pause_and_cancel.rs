//! Drive a running batch from the outside, the way a UI's pause, resume and
//! cancel buttons would.

use std::error::Error;
use std::time::Duration;

use taskctl::telemetry::init_tracing;
use taskctl::{BatchTaskRunner, CancelSignal, EngineError, ExecutionController};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing("taskctl=debug");

    let controller = ExecutionController::new();
    let batch = BatchTaskRunner::from_cancellable_fn(0..20u32, |n, signal: CancelSignal| {
        for _ in 0..5 {
            signal.check()?;
            std::thread::sleep(Duration::from_millis(10));
        }
        println!("  item {n} done");
        Ok::<_, EngineError>(n)
    })
    .sequential()
    .with_controller(controller.clone())
    .with_progress(|progress: f64| println!("  progress: {:>3.0}%", progress * 100.0));

    let run = tokio::spawn(batch.run());

    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("pause -> {}", controller.pause());
    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("state while paused: {}", controller.state());

    println!("resume -> {}", controller.start());
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("cancel -> {}", controller.cancel());
    let result = run.await?;

    println!(
        "final state: {} after {:?}, results kept: {}",
        result.final_state(),
        result.elapsed(),
        result.results().is_some()
    );
    Ok(())
}
