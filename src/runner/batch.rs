//! Runner for the same unit of work over a collection of items
//!
//! Parallel mode admits at most `max_concurrency` item invocations at once
//! through a semaphore; sequential mode walks the items in source order. Both
//! honor pause and cancellation before every item. The first failing item
//! aborts the whole batch and already collected values are dropped.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, Instrument};
use uuid::Uuid;

use crate::config::RunnerSettings;
use crate::control::{CancelSignal, ExecutionController, TaskPriority};
use crate::metrics::MetricsCollector;
use crate::result::ExecutionResult;
use crate::runner::driver::{complete_immediately, drive, RunContext, RunnerKind};
use crate::runner::options::{
    delay_from_millis, timeout_from_millis, validate_concurrency_limit, validate_max_concurrency,
    RunOptions,
};
use crate::runner::progress::ProgressSink;
use crate::runner::work::{join_error, ItemWork};
use crate::{EngineError, Result};

/// How a batch schedules its items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Bounded-parallel execution; results arrive in completion order
    #[default]
    Parallel,
    /// One item at a time; results keep the source order
    Sequential,
}

/// Runs one item-work function over every item of a batch.
///
/// # Example
///
/// ```rust
/// use taskctl::{BatchTaskRunner, EngineError};
///
/// # async fn example() -> Result<(), EngineError> {
/// let result = BatchTaskRunner::from_fn(1..=4, |n: u32| Ok::<_, EngineError>(n * n))
///     .sequential()
///     .run()
///     .await;
///
/// assert_eq!(result.results(), Some(&[1, 4, 9, 16][..]));
/// # Ok(())
/// # }
/// ```
pub struct BatchTaskRunner<I, T> {
    items: Vec<I>,
    work: ItemWork<I, T>,
    options: RunOptions<Vec<T>>,
    max_concurrency: usize,
    mode: ExecutionMode,
}

impl<I, T> BatchTaskRunner<I, T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    fn with_work(items: impl IntoIterator<Item = I>, work: ItemWork<I, T>) -> Self {
        Self {
            items: items.into_iter().collect(),
            work,
            options: RunOptions::new(true),
            max_concurrency: num_cpus::get().max(1),
            mode: ExecutionMode::default(),
        }
    }

    /// Batch runner for synchronous item work
    pub fn from_fn<F, E>(items: impl IntoIterator<Item = I>, work: F) -> Self
    where
        F: Fn(I) -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<EngineError>,
    {
        Self::with_work(items, ItemWork::blocking(move |item, _signal| work(item)))
    }

    /// Batch runner for synchronous item work that observes the cancellation signal
    pub fn from_cancellable_fn<F, E>(items: impl IntoIterator<Item = I>, work: F) -> Self
    where
        F: Fn(I, CancelSignal) -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<EngineError>,
    {
        Self::with_work(items, ItemWork::blocking(work))
    }

    /// Batch runner for asynchronous item work
    pub fn from_async<F, Fut, E>(items: impl IntoIterator<Item = I>, work: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<EngineError>,
    {
        Self::with_work(items, ItemWork::asynchronous(move |item, _signal| work(item)))
    }

    /// Batch runner for asynchronous item work that observes the cancellation signal
    pub fn from_cancellable_async<F, Fut, E>(items: impl IntoIterator<Item = I>, work: F) -> Self
    where
        F: Fn(I, CancelSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<EngineError>,
    {
        Self::with_work(items, ItemWork::asynchronous(work))
    }

    /// Cap the number of concurrently executing items in parallel mode.
    ///
    /// Defaults to the number of CPUs. Zero and values beyond
    /// [`Semaphore::MAX_PERMITS`] are rejected.
    pub fn with_max_concurrency(mut self, max: usize) -> Result<Self> {
        self.max_concurrency = validate_concurrency_limit(max)?;
        Ok(self)
    }

    /// Select the execution mode
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `with_mode(ExecutionMode::Parallel)`
    pub fn parallel(self) -> Self {
        self.with_mode(ExecutionMode::Parallel)
    }

    /// Shorthand for `with_mode(ExecutionMode::Sequential)`
    pub fn sequential(self) -> Self {
        self.with_mode(ExecutionMode::Sequential)
    }

    /// Wait `delay` before starting the batch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.options = self.options.delay(delay);
        self
    }

    /// Wait `delay_ms` milliseconds before starting; negative values are rejected.
    pub fn with_delay_millis(mut self, delay_ms: i64) -> Result<Self> {
        self.options = self.options.delay(delay_from_millis(delay_ms)?);
        Ok(self)
    }

    /// Abandon the whole batch after `timeout`, calling `handler` with the elapsed time.
    ///
    /// Inline sequential items cannot be preempted; a batch that returns after
    /// the limit still ends as timed out.
    pub fn with_timeout<F>(mut self, timeout: Duration, handler: F) -> Result<Self>
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.options = self.options.timeout(timeout, Some(Box::new(handler)))?;
        Ok(self)
    }

    /// Millisecond variant of [`with_timeout`](Self::with_timeout)
    pub fn with_timeout_millis<F>(mut self, timeout_ms: i64, handler: F) -> Result<Self>
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.options = self
            .options
            .timeout(timeout_from_millis(timeout_ms)?, Some(Box::new(handler)))?;
        Ok(self)
    }

    /// Drive the batch through a caller-owned controller
    pub fn with_controller(mut self, controller: ExecutionController) -> Self {
        self.options = self.options.controller(controller);
        self
    }

    /// Called with the first item error that aborts the batch
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&EngineError) + Send + Sync + 'static,
    {
        self.options = self.options.error_handler(Box::new(handler));
        self
    }

    /// Called with the collected values when every item completed
    pub fn with_completion_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Vec<T>) + Send + Sync + 'static,
    {
        self.options = self.options.completion_callback(Box::new(callback));
        self
    }

    /// Report `completed / total` progress to `sink`
    pub fn with_progress<S>(mut self, sink: S) -> Self
    where
        S: ProgressSink + 'static,
    {
        self.options = self.options.progress(Arc::new(sink));
        self
    }

    /// Scheduling hint for the batch
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.options = self.options.priority(priority);
        self
    }

    /// Where sequential items run: worker pool (`true`, the default) or inline.
    /// Parallel items always run on the worker pool.
    pub fn with_background(mut self, background: bool) -> Self {
        self.options = self.options.background(background);
        self
    }

    /// Apply serialized settings on top of the current configuration
    pub fn with_settings(mut self, settings: &RunnerSettings) -> Result<Self> {
        settings.validate()?;
        self.options = self.options.apply_settings(settings)?;
        if let Some(max) = settings.max_concurrency {
            self.max_concurrency = validate_max_concurrency(max)?;
        }
        if let Some(mode) = settings.mode {
            self.mode = mode;
        }
        Ok(self)
    }

    /// Execute the batch and report how it ended.
    ///
    /// A completed batch carries every item's value in
    /// [`ExecutionResult::results`]; any other outcome carries none.
    #[instrument(
        skip(self),
        fields(
            run_id = %Uuid::new_v4(),
            runner = "batch",
            items = self.items.len(),
            mode = ?self.mode,
            max_concurrency = self.max_concurrency,
            priority = %self.options.priority,
        )
    )]
    pub async fn run(self) -> ExecutionResult<T> {
        let Self {
            items,
            work,
            options,
            max_concurrency,
            mode,
        } = self;

        if items.is_empty() {
            return complete_immediately(
                options,
                RunnerKind::Batch,
                Vec::new(),
                ExecutionResult::success_many,
            );
        }

        drive(
            options,
            RunnerKind::Batch,
            move |ctx| async move {
                match mode {
                    ExecutionMode::Parallel => run_parallel(items, work, max_concurrency, ctx).await,
                    ExecutionMode::Sequential => run_sequential(items, work, ctx).await,
                }
            },
            ExecutionResult::success_many,
        )
        .await
    }
}

async fn run_sequential<I, T>(items: Vec<I>, work: ItemWork<I, T>, ctx: RunContext) -> Result<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
{
    let total = items.len();
    let mut results = Vec::with_capacity(total);

    for (index, item) in items.into_iter().enumerate() {
        ctx.checkpoint().await?;
        let outcome = work.invoke(item, ctx.signal.clone(), ctx.background).await;
        record_item(&outcome);
        results.push(outcome?);
        ctx.progress.report((index + 1) as f64 / total as f64);
    }

    Ok(results)
}

async fn run_parallel<I, T>(
    items: Vec<I>,
    work: ItemWork<I, T>,
    max_concurrency: usize,
    ctx: RunContext,
) -> Result<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
{
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(max_concurrency.min(total)));
    let completed = Arc::new(AtomicUsize::new(0));
    let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
    // Dropping the set on an early return aborts the items still in flight.
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        ctx.signal.check()?;

        // Reap finished items while waiting for a slot so a failure aborts
        // the batch before the remaining items are admitted.
        let permit = loop {
            tokio::select! {
                biased;
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    settle(joined)?;
                }
                permit = semaphore.clone().acquire_owned() => {
                    break permit.map_err(|_| EngineError::Cancelled)?;
                }
            }
        };
        debug!(index, "Acquired execution slot");

        let ctx = ctx.clone();
        let work = work.clone();
        let completed = completed.clone();
        let results = results.clone();
        tasks.spawn(
            async move {
                ctx.checkpoint().await?;
                let outcome = work.invoke_in_worker(item, ctx.signal.clone()).await;
                record_item(&outcome);
                results.lock().push(outcome?);
                drop(permit);

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                ctx.progress.report(done as f64 / total as f64);
                Ok::<(), EngineError>(())
            }
            .in_current_span(),
        );
    }

    while let Some(joined) = tasks.join_next().await {
        settle(joined)?;
    }

    let values = std::mem::take(&mut *results.lock());
    Ok(values)
}

fn settle(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(join_error)?
}

fn record_item<T>(outcome: &Result<T>) {
    let status = match outcome {
        Ok(_) => "completed",
        Err(err) if err.is_cancellation() => "cancelled",
        Err(_) => "failed",
    };
    MetricsCollector::record_batch_item(status);
}
