//! Run lifecycle shared by both runner kinds
//!
//! Resolves the controller, honors the start delay, starts the controller,
//! races the work against the timeout and the cancellation signal, and turns
//! whatever happened into an [`ExecutionResult`] plus the matching callback.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::control::{CancelSignal, ExecutionController, ExecutionState};
use crate::metrics::MetricsCollector;
use crate::result::ExecutionResult;
use crate::runner::options::RunOptions;
use crate::runner::progress::ProgressReporter;
use crate::Result;

/// Which runner is driving the lifecycle, used as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunnerKind {
    Single,
    Batch,
}

impl RunnerKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Batch => "batch",
        }
    }
}

/// What the work body gets to see of the run
#[derive(Clone)]
pub(crate) struct RunContext {
    pub(crate) controller: ExecutionController,
    pub(crate) signal: CancelSignal,
    pub(crate) progress: Arc<ProgressReporter>,
    pub(crate) background: bool,
}

impl RunContext {
    /// Suspend while paused, then bail out if cancellation was requested.
    pub(crate) async fn checkpoint(&self) -> Result<()> {
        if self.controller.is_paused() {
            debug!("Waiting at pause gate");
            self.controller.gate().wait(&self.signal).await?;
        }
        self.signal.check()
    }
}

enum Race<O> {
    Finished(Result<O>),
    Cancelled,
    TimedOut,
}

/// Drive one run to its [`ExecutionResult`].
///
/// `body` performs the actual work once the controller is running; `wrap`
/// builds the success result from its payload.
pub(crate) async fn drive<O, T, F, Fut>(
    options: RunOptions<O>,
    kind: RunnerKind,
    body: F,
    wrap: fn(O, Duration) -> ExecutionResult<T>,
) -> ExecutionResult<T>
where
    F: FnOnce(RunContext) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    let started = Instant::now();
    let implicit = options.controller.is_none();
    let controller = options.controller.clone().unwrap_or_default();
    controller.set_priority(options.priority);

    let metrics = MetricsCollector::new(kind.as_str());
    metrics.record_run_start();

    let result = execute(&options, &controller, started, body, wrap).await;

    if implicit {
        controller.dispose();
    }
    metrics.record_run_end(result.final_state(), result.elapsed().as_secs_f64());
    result
}

async fn execute<O, T, F, Fut>(
    options: &RunOptions<O>,
    controller: &ExecutionController,
    started: Instant,
    body: F,
    wrap: fn(O, Duration) -> ExecutionResult<T>,
) -> ExecutionResult<T>
where
    F: FnOnce(RunContext) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    let signal = controller.signal();

    if let Some(delay) = options.delay {
        debug!(delay_ms = delay.as_millis() as u64, "Delaying start");
        tokio::select! {
            biased;
            _ = signal.cancelled() => {
                info!("Cancelled during start delay");
                return interrupted(controller, started.elapsed());
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    controller.start();
    let progress = Arc::new(ProgressReporter::new(options.progress.clone()));
    progress.report(0.0);

    let context = RunContext {
        controller: controller.clone(),
        signal: signal.clone(),
        progress: progress.clone(),
        background: options.background,
    };
    let work_started = Instant::now();
    let work = body(context);
    tokio::pin!(work);

    let race = match options.timeout {
        Some(timeout) => tokio::select! {
            biased;
            outcome = &mut work => Race::Finished(outcome),
            _ = signal.cancelled() => Race::Cancelled,
            _ = tokio::time::sleep(timeout) => Race::TimedOut,
        },
        None => tokio::select! {
            biased;
            outcome = &mut work => Race::Finished(outcome),
            _ = signal.cancelled() => Race::Cancelled,
        },
    };

    // Inline work can hold the task past the timer; judge it by the clock.
    let race = match race {
        Race::Finished(_)
            if !signal.is_cancelled()
                && options
                    .timeout
                    .is_some_and(|timeout| work_started.elapsed() >= timeout) =>
        {
            Race::TimedOut
        }
        race => race,
    };

    match race {
        Race::Finished(Ok(payload)) => {
            let elapsed = started.elapsed();
            controller.complete();
            progress.report(1.0);
            info!(elapsed_ms = elapsed.as_millis() as u64, "Run completed");
            if let Some(callback) = &options.completion_callback {
                callback(&payload);
            }
            wrap(payload, elapsed)
        }
        Race::Finished(Err(err)) if err.is_cancellation() && signal.is_cancelled() => {
            interrupted(controller, started.elapsed())
        }
        Race::Cancelled => interrupted(controller, started.elapsed()),
        Race::TimedOut => {
            controller.time_out();
            let elapsed = started.elapsed();
            let limit = options.timeout.unwrap_or(elapsed);
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = limit.as_millis() as u64,
                "Run timed out, abandoning work"
            );
            if let Some(handler) = &options.timeout_handler {
                handler(elapsed);
            }
            ExecutionResult::timeout(limit, elapsed)
        }
        Race::Finished(Err(err)) => {
            controller.fail();
            let elapsed = started.elapsed();
            error!(error = %err, elapsed_ms = elapsed.as_millis() as u64, "Run failed");
            if let Some(handler) = &options.error_handler {
                handler(&err);
            }
            ExecutionResult::errored(err, elapsed)
        }
    }
}

/// A run interrupted through the signal ends as stopped or cancelled,
/// depending on which request raised it. No callback fires.
fn interrupted<T>(controller: &ExecutionController, elapsed: Duration) -> ExecutionResult<T> {
    match controller.state() {
        ExecutionState::Stopped => {
            info!(elapsed_ms = elapsed.as_millis() as u64, "Run stopped");
            ExecutionResult::stopped(elapsed)
        }
        state => {
            info!(elapsed_ms = elapsed.as_millis() as u64, state = %state, "Run cancelled");
            ExecutionResult::cancelled(elapsed)
        }
    }
}

/// Complete a run that has nothing to do without engaging delay or timeout.
pub(crate) fn complete_immediately<O, T>(
    options: RunOptions<O>,
    kind: RunnerKind,
    payload: O,
    wrap: fn(O, Duration) -> ExecutionResult<T>,
) -> ExecutionResult<T> {
    let metrics = MetricsCollector::new(kind.as_str());
    metrics.record_run_start();
    let progress = ProgressReporter::new(options.progress.clone());
    progress.report(0.0);
    if let Some(controller) = &options.controller {
        controller.start();
        controller.complete();
    }
    progress.report(1.0);
    debug!("Nothing to run, completing immediately");
    if let Some(callback) = &options.completion_callback {
        callback(&payload);
    }
    let result = wrap(payload, Duration::ZERO);
    metrics.record_run_end(result.final_state(), 0.0);
    result
}
