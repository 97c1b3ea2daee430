//! Configuration shared by both runner kinds

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::config::RunnerSettings;
use crate::control::{ExecutionController, TaskPriority};
use crate::runner::progress::ProgressSink;
use crate::{EngineError, Result};

/// Invoked with the elapsed time when a run times out
pub type TimeoutHandler = Box<dyn Fn(Duration) + Send + Sync>;

/// Invoked with the error when the work fails
pub type ErrorHandler = Box<dyn Fn(&EngineError) + Send + Sync>;

/// Invoked with the payload when the work completes
pub type CompletionCallback<O> = Box<dyn Fn(&O) + Send + Sync>;

/// Options common to single-task and batch runs.
///
/// `O` is the payload handed to the completion callback: the work's value for
/// single-task runs, the collected values for batch runs. Every setter
/// consumes the options and returns the updated value.
pub(crate) struct RunOptions<O> {
    pub(crate) delay: Option<Duration>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) timeout_handler: Option<TimeoutHandler>,
    pub(crate) controller: Option<ExecutionController>,
    pub(crate) error_handler: Option<ErrorHandler>,
    pub(crate) completion_callback: Option<CompletionCallback<O>>,
    pub(crate) progress: Option<Arc<dyn ProgressSink>>,
    pub(crate) priority: TaskPriority,
    pub(crate) background: bool,
}

impl<O> RunOptions<O> {
    pub(crate) fn new(background: bool) -> Self {
        Self {
            delay: None,
            timeout: None,
            timeout_handler: None,
            controller: None,
            error_handler: None,
            completion_callback: None,
            progress: None,
            priority: TaskPriority::Normal,
            background,
        }
    }

    pub(crate) fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn timeout(mut self, timeout: Duration, handler: Option<TimeoutHandler>) -> Result<Self> {
        self.timeout = Some(validate_timeout(timeout)?);
        self.timeout_handler = handler;
        Ok(self)
    }

    pub(crate) fn controller(mut self, controller: ExecutionController) -> Self {
        self.controller = Some(controller);
        self
    }

    pub(crate) fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub(crate) fn completion_callback(mut self, callback: CompletionCallback<O>) -> Self {
        self.completion_callback = Some(callback);
        self
    }

    pub(crate) fn progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub(crate) fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub(crate) fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Apply the runner-independent part of `settings`. A timeout from the
    /// settings keeps any handler configured before.
    pub(crate) fn apply_settings(mut self, settings: &RunnerSettings) -> Result<Self> {
        if let Some(delay_ms) = settings.delay_ms {
            self.delay = Some(delay_from_millis(delay_ms)?);
        }
        if let Some(timeout_ms) = settings.timeout_ms {
            self.timeout = Some(timeout_from_millis(timeout_ms)?);
        }
        if let Some(background) = settings.background {
            self.background = background;
        }
        if let Some(priority) = settings.priority {
            self.priority = priority;
        }
        Ok(self)
    }
}

pub(crate) fn validate_timeout(timeout: Duration) -> Result<Duration> {
    if timeout.is_zero() {
        return Err(EngineError::invalid_argument(
            "timeout",
            "must be greater than zero",
        ));
    }
    Ok(timeout)
}

pub(crate) fn delay_from_millis(delay_ms: i64) -> Result<Duration> {
    u64::try_from(delay_ms)
        .map(Duration::from_millis)
        .map_err(|_| EngineError::invalid_argument("delay", format!("cannot be negative (got {delay_ms} ms)")))
}

pub(crate) fn timeout_from_millis(timeout_ms: i64) -> Result<Duration> {
    if timeout_ms <= 0 {
        return Err(EngineError::invalid_argument(
            "timeout",
            format!("must be greater than zero (got {timeout_ms} ms)"),
        ));
    }
    Ok(Duration::from_millis(timeout_ms as u64))
}

pub(crate) fn validate_max_concurrency(max: i64) -> Result<usize> {
    if max < 1 {
        return Err(EngineError::invalid_argument(
            "max_concurrency",
            format!("must be at least 1 (got {max})"),
        ));
    }
    let max = usize::try_from(max)
        .map_err(|_| EngineError::invalid_argument("max_concurrency", "does not fit in usize"))?;
    validate_concurrency_limit(max)
}

/// The admission limit must fit in a tokio semaphore.
pub(crate) fn validate_concurrency_limit(max: usize) -> Result<usize> {
    if max == 0 {
        return Err(EngineError::invalid_argument(
            "max_concurrency",
            "must be at least 1 (got 0)",
        ));
    }
    if max > Semaphore::MAX_PERMITS {
        return Err(EngineError::invalid_argument(
            "max_concurrency",
            format!("must be at most {} (got {max})", Semaphore::MAX_PERMITS),
        ));
    }
    Ok(max)
}
