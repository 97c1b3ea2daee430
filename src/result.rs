//! Immutable execution outcome

use std::time::Duration;

use crate::control::ExecutionState;
use crate::{EngineError, Result};

/// Outcome of one runner execution.
///
/// Built only through the named constructors so the final state and the
/// payload always agree: a `Completed` result carries a value (single-task
/// runs) or a value sequence (batch runs), a failed one may carry the error.
#[derive(Debug)]
pub struct ExecutionResult<T> {
    final_state: ExecutionState,
    result: Option<T>,
    results: Option<Vec<T>>,
    error: Option<EngineError>,
    elapsed: Duration,
}

impl<T> ExecutionResult<T> {
    fn with_state(final_state: ExecutionState, elapsed: Duration) -> Self {
        Self {
            final_state,
            result: None,
            results: None,
            error: None,
            elapsed,
        }
    }

    /// Successful single-value result
    pub fn success(result: T, elapsed: Duration) -> Self {
        Self {
            result: Some(result),
            ..Self::with_state(ExecutionState::Completed, elapsed)
        }
    }

    /// Successful multi-value result
    pub fn success_many(results: Vec<T>, elapsed: Duration) -> Self {
        Self {
            results: Some(results),
            ..Self::with_state(ExecutionState::Completed, elapsed)
        }
    }

    /// Failed result carrying `error`.
    ///
    /// `state` must be one of `Error`, `Cancelled`, `Timeout` or `Stopped`.
    pub fn failure(error: EngineError, state: ExecutionState, elapsed: Duration) -> Result<Self> {
        if !state.is_failure() {
            return Err(EngineError::invalid_argument(
                "state",
                format!("{state} is not a failure state (expected error, cancelled, timeout or stopped)"),
            ));
        }
        Ok(Self {
            error: Some(error),
            ..Self::with_state(state, elapsed)
        })
    }

    /// Work-failure result; `Error` needs no state validation.
    pub(crate) fn errored(error: EngineError, elapsed: Duration) -> Self {
        Self {
            error: Some(error),
            ..Self::with_state(ExecutionState::Error, elapsed)
        }
    }

    /// Cancelled result
    pub fn cancelled(elapsed: Duration) -> Self {
        Self::with_state(ExecutionState::Cancelled, elapsed)
    }

    /// Timed-out result carrying [`EngineError::Timeout`] with the exceeded `limit`
    pub fn timeout(limit: Duration, elapsed: Duration) -> Self {
        Self {
            error: Some(EngineError::Timeout(limit)),
            ..Self::with_state(ExecutionState::Timeout, elapsed)
        }
    }

    /// Stopped result
    pub fn stopped(elapsed: Duration) -> Self {
        Self::with_state(ExecutionState::Stopped, elapsed)
    }

    /// Final state of the execution
    pub fn final_state(&self) -> ExecutionState {
        self.final_state
    }

    /// Value of a successful single-task run
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// Values of a successful batch run
    pub fn results(&self) -> Option<&[T]> {
        self.results.as_deref()
    }

    /// Error attached to a failed run
    pub fn error(&self) -> Option<&EngineError> {
        self.error.as_ref()
    }

    /// Wall-clock time of the run
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// `true` iff the final state is `Completed`
    pub fn is_success(&self) -> bool {
        self.final_state == ExecutionState::Completed
    }

    /// Whether the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.final_state == ExecutionState::Cancelled
    }

    /// Whether the run timed out
    pub fn is_timeout(&self) -> bool {
        self.final_state == ExecutionState::Timeout
    }

    /// Whether the work failed
    pub fn is_error(&self) -> bool {
        self.final_state == ExecutionState::Error
    }

    /// Whether the run was stopped
    pub fn is_stopped(&self) -> bool {
        self.final_state == ExecutionState::Stopped
    }

    /// Take the single value out of the result
    pub fn into_result(self) -> Option<T> {
        self.result
    }

    /// Take the value sequence out of the result
    pub fn into_results(self) -> Option<Vec<T>> {
        self.results
    }

    /// Take the error out of the result
    pub fn into_error(self) -> Option<EngineError> {
        self.error
    }
}
