//! Serializable runner settings
//!
//! Lets runner configuration come from a config file or a request body
//! instead of code. Every field is optional; only present fields override
//! what the runner was built with.

use serde::{Deserialize, Serialize};

use crate::control::TaskPriority;
use crate::runner::ExecutionMode;
use crate::runner::options::{delay_from_millis, timeout_from_millis, validate_max_concurrency};
use crate::Result;

/// Runner configuration in serializable form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerSettings {
    /// Start delay in milliseconds; must not be negative
    pub delay_ms: Option<i64>,
    /// Timeout in milliseconds; must be positive
    pub timeout_ms: Option<i64>,
    /// Parallel admission limit for batches; must be positive
    pub max_concurrency: Option<i64>,
    /// Batch execution mode
    pub mode: Option<ExecutionMode>,
    /// Run on the worker pool instead of inline
    pub background: Option<bool>,
    /// Scheduling hint
    pub priority: Option<TaskPriority>,
}

impl RunnerSettings {
    /// Parse settings from JSON and validate them
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the runners would refuse at configuration time
    pub fn validate(&self) -> Result<()> {
        if let Some(delay_ms) = self.delay_ms {
            delay_from_millis(delay_ms)?;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            timeout_from_millis(timeout_ms)?;
        }
        if let Some(max) = self.max_concurrency {
            validate_max_concurrency(max)?;
        }
        Ok(())
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
