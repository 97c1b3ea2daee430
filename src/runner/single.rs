//! Runner for one unit of work

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;
use uuid::Uuid;

use crate::config::RunnerSettings;
use crate::control::{CancelSignal, ExecutionController, TaskPriority};
use crate::result::ExecutionResult;
use crate::runner::driver::{drive, RunnerKind};
use crate::runner::options::{delay_from_millis, timeout_from_millis, RunOptions};
use crate::runner::progress::ProgressSink;
use crate::runner::work::SingleWork;
use crate::{EngineError, Result};

/// Runs one unit of work under an [`ExecutionController`].
///
/// Built from a work function, configured with the `with_*` methods and
/// consumed by [`run`](Self::run). Work runs in the background (on the
/// runtime's worker pool) unless [`with_background(false)`](Self::with_background)
/// asks for inline execution.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use taskctl::{CancelSignal, EngineError, SingleTaskRunner};
///
/// # async fn example() -> Result<(), EngineError> {
/// let result = SingleTaskRunner::from_cancellable_async(|signal: CancelSignal| async move {
///     for _ in 0..10 {
///         signal.check()?;
///         tokio::time::sleep(Duration::from_millis(5)).await;
///     }
///     Ok::<_, EngineError>("done")
/// })
/// .with_timeout(Duration::from_secs(5), |_| {})?
/// .run()
/// .await;
///
/// assert_eq!(result.into_result(), Some("done"));
/// # Ok(())
/// # }
/// ```
pub struct SingleTaskRunner<T> {
    work: SingleWork<T>,
    options: RunOptions<T>,
}

impl<T: Send + 'static> SingleTaskRunner<T> {
    fn with_work(work: SingleWork<T>) -> Self {
        Self {
            work,
            options: RunOptions::new(true),
        }
    }

    /// Runner for synchronous work
    pub fn from_fn<F, E>(work: F) -> Self
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        E: Into<EngineError>,
    {
        Self::with_work(SingleWork::blocking(move |_signal| work()))
    }

    /// Runner for synchronous work that observes the cancellation signal
    pub fn from_cancellable_fn<F, E>(work: F) -> Self
    where
        F: FnOnce(CancelSignal) -> std::result::Result<T, E> + Send + 'static,
        E: Into<EngineError>,
    {
        Self::with_work(SingleWork::blocking(work))
    }

    /// Runner for asynchronous work
    pub fn from_async<F, Fut, E>(work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<EngineError>,
    {
        Self::with_work(SingleWork::asynchronous(move |_signal| work()))
    }

    /// Runner for asynchronous work that observes the cancellation signal
    pub fn from_cancellable_async<F, Fut, E>(work: F) -> Self
    where
        F: FnOnce(CancelSignal) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<EngineError>,
    {
        Self::with_work(SingleWork::asynchronous(work))
    }

    /// Wait `delay` before starting the work
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.options = self.options.delay(delay);
        self
    }

    /// Wait `delay_ms` milliseconds before starting; negative values are rejected.
    pub fn with_delay_millis(mut self, delay_ms: i64) -> Result<Self> {
        self.options = self.options.delay(delay_from_millis(delay_ms)?);
        Ok(self)
    }

    /// Abandon the work after `timeout`, calling `handler` with the elapsed time.
    ///
    /// The timeout raises the controller's cancellation signal, so cooperative
    /// work can exit promptly. Inline work (see [`with_background`](Self::with_background))
    /// cannot be preempted: it runs to its end, and a run that returns after
    /// the limit is reported as timed out, without the completion callback.
    /// A zero timeout is rejected.
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

    /// Drive the run through a caller-owned controller
    pub fn with_controller(mut self, controller: ExecutionController) -> Self {
        self.options = self.options.controller(controller);
        self
    }

    /// Called with the error when the work fails
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&EngineError) + Send + Sync + 'static,
    {
        self.options = self.options.error_handler(Box::new(handler));
        self
    }

    /// Called with the value when the work completes
    pub fn with_completion_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.options = self.options.completion_callback(Box::new(callback));
        self
    }

    /// Report progress to `sink`
    pub fn with_progress<S>(mut self, sink: S) -> Self
    where
        S: ProgressSink + 'static,
    {
        self.options = self.options.progress(Arc::new(sink));
        self
    }

    /// Scheduling hint for the run
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.options = self.options.priority(priority);
        self
    }

    /// Run on the worker pool (`true`, the default) or inline in the caller's task
    pub fn with_background(mut self, background: bool) -> Self {
        self.options = self.options.background(background);
        self
    }

    /// Apply serialized settings on top of the current configuration
    pub fn with_settings(mut self, settings: &RunnerSettings) -> Result<Self> {
        settings.validate()?;
        self.options = self.options.apply_settings(settings)?;
        Ok(self)
    }

    /// Execute the work and report how it ended.
    ///
    /// Never fails: work errors, cancellation and timeouts all come back as
    /// an [`ExecutionResult`].
    #[instrument(
        skip(self),
        fields(
            run_id = %Uuid::new_v4(),
            runner = "single",
            priority = %self.options.priority,
            background = self.options.background,
        )
    )]
    pub async fn run(self) -> ExecutionResult<T> {
        let Self { work, options } = self;
        drive(
            options,
            RunnerKind::Single,
            move |ctx| async move {
                ctx.checkpoint().await?;
                work.invoke(ctx.signal.clone(), ctx.background).await
            },
            ExecutionResult::success,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ExecutionState;

    #[tokio::test]
    async fn test_negative_delay_millis_rejected() {
        let outcome = SingleTaskRunner::from_fn(|| Ok::<_, EngineError>(())).with_delay_millis(-10);
        assert!(matches!(
            outcome,
            Err(EngineError::InvalidArgument { name: "delay", .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected() {
        let outcome =
            SingleTaskRunner::from_fn(|| Ok::<_, EngineError>(())).with_timeout(Duration::ZERO, |_| {});
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn test_foreground_run_completes() {
        let result = SingleTaskRunner::from_fn(|| Ok::<_, EngineError>(7))
            .with_background(false)
            .run()
            .await;
        assert_eq!(result.final_state(), ExecutionState::Completed);
        assert_eq!(result.into_result(), Some(7));
    }

    #[tokio::test]
    async fn test_cancelled_before_run_never_invokes_work() {
        let controller = ExecutionController::new();
        controller.cancel();

        let result = SingleTaskRunner::from_fn(|| -> anyhow::Result<u32> { panic!("must not run") })
            .with_controller(controller)
            .run()
            .await;
        assert!(result.is_cancelled());
    }
}
