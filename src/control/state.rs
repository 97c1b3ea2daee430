//! Execution states and the transition table

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a controlled execution
///
/// Transitions:
/// - `NotStarted | Paused -> Running` via [`start`](super::ExecutionController::start)
/// - `Running -> Paused` via [`pause`](super::ExecutionController::pause)
/// - `Running | Paused -> Stopped` via [`stop`](super::ExecutionController::stop)
/// - anything but `Completed | Cancelled` -> `Cancelled` via [`cancel`](super::ExecutionController::cancel)
/// - `Running | Paused -> Completed | Error | Timeout`, set by the runners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Created but not started yet
    #[default]
    NotStarted,

    /// Currently executing
    Running,

    /// Suspended at the pause gate, can be resumed
    Paused,

    /// Stopped on request by the caller
    Stopped,

    /// Cancelled before or during execution
    Cancelled,

    /// Finished successfully
    Completed,

    /// Work failed
    Error,

    /// Timer elapsed before the work finished
    Timeout,
}

impl ExecutionState {
    /// Whether no further transition can leave this state (except [`reset`](super::ExecutionController::reset))
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Stopped | Self::Cancelled | Self::Completed | Self::Error | Self::Timeout
        )
    }

    /// Whether the state is one a failed result may carry
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Error | Self::Cancelled | Self::Timeout | Self::Stopped
        )
    }

    pub(crate) fn can_start(self) -> bool {
        matches!(self, Self::NotStarted | Self::Paused)
    }

    pub(crate) fn can_pause(self) -> bool {
        self == Self::Running
    }

    pub(crate) fn can_stop(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    pub(crate) fn can_cancel(self) -> bool {
        !matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Runner-driven terminal transitions only apply to a live execution.
    pub(crate) fn can_finish(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Lowercase label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority hint for worker contexts
///
/// Best-effort only: it is recorded on the controller and attached to the
/// tracing spans of the work it drives. No behavior depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Background / best-effort
    Lowest,
    /// Below the default
    BelowNormal,
    /// Default scheduling priority
    #[default]
    Normal,
    /// Above the default
    AboveNormal,
    /// Latency-sensitive work
    Highest,
}

impl TaskPriority {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Lowest => 0,
            Self::BelowNormal => 1,
            Self::Normal => 2,
            Self::AboveNormal => 3,
            Self::Highest => 4,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Lowest,
            1 => Self::BelowNormal,
            2 => Self::Normal,
            3 => Self::AboveNormal,
            _ => Self::Highest,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lowest => write!(f, "Lowest"),
            Self::BelowNormal => write!(f, "BelowNormal"),
            Self::Normal => write!(f, "Normal"),
            Self::AboveNormal => write!(f, "AboveNormal"),
            Self::Highest => write!(f, "Highest"),
        }
    }
}
