//! Cooperative cancellation signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::{EngineError, Result};

/// Cooperative cancellation signal shared by a controller and the work it drives.
///
/// Cloning shares the underlying flag. The owning
/// [`ExecutionController`](super::ExecutionController) raises it on stop, cancel
/// and timeout, and every clone observes it. Work is expected to check it at
/// its own safe points; nothing is ever terminated forcibly.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    raised: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    /// Create a new, non-raised signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Raising twice is harmless.
    ///
    /// Only the owning controller raises it, so the pause gate is always
    /// reopened alongside.
    pub(crate) fn raise(&self) {
        if !self.inner.raised.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.raised.load(Ordering::Acquire)
    }

    /// Return [`EngineError::Cancelled`] if cancellation has been requested.
    ///
    /// Meant to be used with `?` at the checkpoints of long-running work.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Wait until the signal is raised
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking the flag so a concurrent raise is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
