//! # taskctl
//!
//! A controllable task execution engine. It runs one unit of work, or the same
//! unit of work over a collection of items, with uniform support for delayed
//! start, timeout, cooperative pause/resume, cancellation, progress reporting and
//! post-execution callbacks. Every run produces an [`ExecutionResult`] instead of
//! propagating the work's error.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use taskctl::{EngineError, SingleTaskRunner};
//!
//! # async fn example() -> Result<(), EngineError> {
//! let result = SingleTaskRunner::from_fn(|| Ok::<_, EngineError>(42))
//!     .with_delay(Duration::from_millis(10))
//!     .with_timeout(Duration::from_secs(1), |elapsed| eprintln!("timed out after {elapsed:?}"))?
//!     .with_completion_callback(|value| println!("finished with {value}"))
//!     .run()
//!     .await;
//!
//! assert!(result.is_success());
//! assert_eq!(result.result(), Some(&42));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`control`]: the execution controller, its state machine, cancellation signal and pause gate
//! - [`result`]: the immutable execution outcome record
//! - [`runner`]: single-task and batch runners
//! - [`config`]: serializable runner settings
//! - [`metrics`]: Prometheus metrics for runs and controller transitions
//! - [`telemetry`]: tracing subscriber setup

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use std::time::Duration;

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the execution engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration value rejected at configuration time
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Name of the rejected argument
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Caller-supplied work returned an error
    #[error("Work failed: {0}")]
    Work(anyhow::Error),

    /// Caller-supplied work panicked
    #[error("Work panicked: {0}")]
    Panicked(String),

    /// Cancellation was requested through the shared signal
    #[error("Execution cancelled")]
    Cancelled,

    /// The configured timeout elapsed before the work completed
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    /// Join error from a worker task
    #[error("Async join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl EngineError {
    /// Build an invalid-argument error
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// Whether this error represents a cooperative cancellation
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        // A signal check bubbled up through an anyhow-returning closure keeps its identity.
        match err.downcast::<EngineError>() {
            Ok(engine) => engine,
            Err(other) => Self::Work(other),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Work(err.into())
    }
}

/// Execution controller, state machine and synchronization primitives
pub mod control;

/// Immutable execution outcome
pub mod result;

/// Single-task and batch runners
pub mod runner;

/// Serializable runner settings
pub mod config;

/// Prometheus metrics
pub mod metrics;

/// Tracing subscriber setup
pub mod telemetry;

pub use config::RunnerSettings;
pub use control::{CancelSignal, ExecutionController, ExecutionState, PauseGate, TaskPriority};
pub use result::ExecutionResult;
pub use runner::{BatchTaskRunner, ExecutionMode, ProgressSink, SingleTaskRunner};
