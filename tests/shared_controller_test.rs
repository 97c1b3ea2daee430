use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use taskctl::{
    BatchTaskRunner, CancelSignal, EngineError, ExecutionController, ExecutionState,
    SingleTaskRunner,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_external_cancel_stops_sequential_batch_and_sibling_runner() {
    let controller = ExecutionController::new();
    let processed = Arc::new(AtomicUsize::new(0));

    let batch = BatchTaskRunner::from_async(0..40u32, {
        let processed = processed.clone();
        move |n| {
            let processed = processed.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                processed.fetch_add(1, Ordering::SeqCst);
                Ok::<_, EngineError>(n)
            }
        }
    })
    .sequential()
    .with_controller(controller.clone());

    let watcher = SingleTaskRunner::from_cancellable_async(|signal: CancelSignal| async move {
        signal.cancelled().await;
        Err::<(), _>(EngineError::Cancelled)
    })
    .with_controller(controller.clone());

    let canceller = {
        let controller = controller.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(60));
            controller.cancel();
        })
    };

    let (batch_result, watcher_result) = tokio::join!(batch.run(), watcher.run());
    canceller.join().expect("canceller thread panicked");

    assert_eq!(batch_result.final_state(), ExecutionState::Cancelled);
    assert!(batch_result.results().is_none());
    assert_eq!(watcher_result.final_state(), ExecutionState::Cancelled);
    assert_eq!(controller.state(), ExecutionState::Cancelled);

    // An item already in flight may still finish; nothing new is admitted.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let seen = processed.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(seen < 40, "batch kept going after cancel ({seen} items)");
    assert_eq!(processed.load(Ordering::SeqCst), seen, "items admitted after cancel");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pause_holds_batch_until_resumed() {
    let controller = ExecutionController::new();
    let processed = Arc::new(AtomicUsize::new(0));

    let run = tokio::spawn(
        BatchTaskRunner::from_fn(0..6u32, {
            let processed = processed.clone();
            move |n| {
                std::thread::sleep(Duration::from_millis(20));
                processed.fetch_add(1, Ordering::SeqCst);
                Ok::<_, EngineError>(n)
            }
        })
        .sequential()
        .with_controller(controller.clone())
        .run(),
    );

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(controller.pause());
    assert!(controller.is_paused());

    // Let the item in flight finish, then nothing else may start.
    tokio::time::sleep(Duration::from_millis(40)).await;
    let while_paused = processed.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(processed.load(Ordering::SeqCst), while_paused);
    assert!(while_paused < 6);

    assert!(controller.start());
    let result = run.await.expect("batch task panicked");

    assert!(result.is_success());
    assert_eq!(result.into_results(), Some(vec![0, 1, 2, 3, 4, 5]));
    assert_eq!(controller.state(), ExecutionState::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_while_paused_releases_parallel_batch() {
    let controller = ExecutionController::new();

    let run = tokio::spawn(
        BatchTaskRunner::from_async(0..30u32, |n| async move {
            tokio::time::sleep(Duration::from_millis(15)).await;
            Ok::<_, EngineError>(n)
        })
        .with_max_concurrency(2)
        .unwrap()
        .with_controller(controller.clone())
        .run(),
    );

    tokio::time::sleep(Duration::from_millis(25)).await;
    controller.pause();
    tokio::time::sleep(Duration::from_millis(30)).await;
    controller.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), run)
        .await
        .expect("paused batch must observe cancellation")
        .expect("batch task panicked");
    assert!(result.is_cancelled());
}

#[tokio::test]
async fn test_reset_controller_drives_second_run() {
    let controller = ExecutionController::new();
    controller.cancel();

    let first = SingleTaskRunner::from_fn(|| Ok::<_, EngineError>(1))
        .with_controller(controller.clone())
        .run()
        .await;
    assert!(first.is_cancelled());

    assert!(controller.reset());
    let second = SingleTaskRunner::from_fn(|| Ok::<_, EngineError>(2))
        .with_controller(controller.clone())
        .run()
        .await;
    assert_eq!(second.into_result(), Some(2));
    assert!(controller.is_completed());
}
