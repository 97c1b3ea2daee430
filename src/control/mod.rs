//! Execution control
//!
//! The [`ExecutionController`] is the single source of truth for the pause and
//! cancel state of a run. It is shared by the runners and by any external
//! actor (a UI layer, another task, a signal handler) steering the run.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics::MetricsCollector;
use crate::Result;

pub mod gate;
pub mod signal;
pub mod state;

pub use gate::PauseGate;
pub use signal::CancelSignal;
pub use state::{ExecutionState, TaskPriority};

/// Handle to a controllable execution.
///
/// Cloning yields another handle to the same controller, so a caller can keep
/// one clone for steering while handing another to a runner. Every state
/// transition is serialized through one exclusive lock.
#[derive(Clone)]
pub struct ExecutionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    id: Uuid,
    core: Mutex<ControllerCore>,
    gate: PauseGate,
    priority: AtomicU8,
}

struct ControllerCore {
    state: ExecutionState,
    signal: CancelSignal,
    disposed: bool,
}

impl ExecutionController {
    /// Create a controller in the `NotStarted` state with an open gate
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                id: Uuid::new_v4(),
                core: Mutex::new(ControllerCore {
                    state: ExecutionState::NotStarted,
                    signal: CancelSignal::new(),
                    disposed: false,
                }),
                gate: PauseGate::new(),
                priority: AtomicU8::new(TaskPriority::Normal.as_u8()),
            }),
        }
    }

    /// Unique identifier of this controller
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Start or resume: `NotStarted | Paused -> Running`, opens the gate.
    ///
    /// Returns whether the state changed.
    pub fn start(&self) -> bool {
        self.transition("start", ExecutionState::can_start, ExecutionState::Running, |inner, _| {
            inner.gate.open();
        })
    }

    /// Pause: `Running -> Paused`, closes the gate.
    pub fn pause(&self) -> bool {
        self.transition("pause", ExecutionState::can_pause, ExecutionState::Paused, |inner, _| {
            inner.gate.close();
        })
    }

    /// Stop: `Running | Paused -> Stopped`, opens the gate and raises the signal.
    pub fn stop(&self) -> bool {
        self.transition("stop", ExecutionState::can_stop, ExecutionState::Stopped, |inner, signal| {
            signal.raise();
            inner.gate.open();
        })
    }

    /// Cancel: any state except `Completed | Cancelled -> Cancelled`, opens the
    /// gate and raises the signal.
    pub fn cancel(&self) -> bool {
        self.transition("cancel", ExecutionState::can_cancel, ExecutionState::Cancelled, |inner, signal| {
            signal.raise();
            inner.gate.open();
        })
    }

    pub(crate) fn complete(&self) -> bool {
        self.transition("complete", ExecutionState::can_finish, ExecutionState::Completed, |_, _| {})
    }

    pub(crate) fn fail(&self) -> bool {
        self.transition("fail", ExecutionState::can_finish, ExecutionState::Error, |_, _| {})
    }

    /// A timed-out run is abandoned cooperatively, so its work sees the signal.
    pub(crate) fn time_out(&self) -> bool {
        self.transition("time_out", ExecutionState::can_finish, ExecutionState::Timeout, |inner, signal| {
            signal.raise();
            inner.gate.open();
        })
    }

    fn transition<F>(
        &self,
        operation: &'static str,
        allowed: fn(ExecutionState) -> bool,
        target: ExecutionState,
        effect: F,
    ) -> bool
    where
        F: FnOnce(&ControllerInner, &CancelSignal),
    {
        let mut core = self.inner.core.lock();
        if core.disposed {
            warn!(controller_id = %self.inner.id, operation, "Ignoring transition on disposed controller");
            return false;
        }

        let from = core.state;
        if !allowed(from) {
            debug!(controller_id = %self.inner.id, operation, state = %from, "Transition not permitted, ignoring");
            return false;
        }

        core.state = target;
        effect(&self.inner, &core.signal);
        drop(core);

        debug!(controller_id = %self.inner.id, operation, from = %from, to = %target, "Controller transition");
        MetricsCollector::record_transition(from, target);
        true
    }

    /// Return a terminal controller to `NotStarted` with a fresh signal so it
    /// can drive another run. Work still holding the previous signal keeps
    /// observing it as raised.
    pub fn reset(&self) -> bool {
        let mut core = self.inner.core.lock();
        if core.disposed || !core.state.is_terminal() {
            return false;
        }
        let from = core.state;
        core.state = ExecutionState::NotStarted;
        core.signal = CancelSignal::new();
        self.inner.gate.open();
        drop(core);

        debug!(controller_id = %self.inner.id, from = %from, "Controller reset");
        MetricsCollector::record_transition(from, ExecutionState::NotStarted);
        true
    }

    /// Release the controller: the gate is opened for good and later
    /// transitions are ignored. Calling it again is a no-op.
    ///
    /// Disposing a caller-owned controller while a run is still using it is a
    /// misuse; the run then finishes with whatever state it last observed.
    pub fn dispose(&self) {
        let mut core = self.inner.core.lock();
        if core.disposed {
            return;
        }
        core.disposed = true;
        self.inner.gate.open();
        debug!(controller_id = %self.inner.id, state = %core.state, "Controller disposed");
    }

    /// Whether [`dispose`](Self::dispose) has been called
    pub fn is_disposed(&self) -> bool {
        self.inner.core.lock().disposed
    }

    /// Current state
    pub fn state(&self) -> ExecutionState {
        self.inner.core.lock().state
    }

    /// Whether the state is `Running`
    pub fn is_running(&self) -> bool {
        self.state() == ExecutionState::Running
    }

    /// Whether the state is `Paused`
    pub fn is_paused(&self) -> bool {
        self.state() == ExecutionState::Paused
    }

    /// Whether the state is `Cancelled`
    pub fn is_cancelled(&self) -> bool {
        self.state() == ExecutionState::Cancelled
    }

    /// Whether the state is `Completed`
    pub fn is_completed(&self) -> bool {
        self.state() == ExecutionState::Completed
    }

    /// Whether the state is `Stopped`
    pub fn is_stopped(&self) -> bool {
        self.state() == ExecutionState::Stopped
    }

    /// The cancellation signal handed to work invocations
    pub fn signal(&self) -> CancelSignal {
        self.inner.core.lock().signal.clone()
    }

    /// The pause gate
    pub fn gate(&self) -> &PauseGate {
        &self.inner.gate
    }

    /// Scheduling priority hint
    pub fn priority(&self) -> TaskPriority {
        TaskPriority::from_u8(self.inner.priority.load(Ordering::Relaxed))
    }

    /// Set the scheduling priority hint
    pub fn set_priority(&self, priority: TaskPriority) {
        self.inner.priority.store(priority.as_u8(), Ordering::Relaxed);
    }

    /// Suspend while the controller is paused, then fail with
    /// [`EngineError::Cancelled`](crate::EngineError::Cancelled) if the run was
    /// cancelled meanwhile.
    ///
    /// Long-running async work calls this at its checkpoints to honor pause.
    pub async fn wait_if_paused(&self) -> Result<()> {
        let signal = self.signal();
        if self.is_paused() {
            self.inner.gate.wait(&signal).await?;
        }
        signal.check()
    }

    /// Blocking counterpart of [`wait_if_paused`](Self::wait_if_paused) for
    /// synchronous work running on a blocking thread.
    pub fn wait_if_paused_blocking(&self) -> Result<()> {
        let signal = self.signal();
        if self.is_paused() {
            self.inner.gate.wait_blocking(&signal)?;
        }
        signal.check()
    }
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("ExecutionController")
            .field("id", &self.inner.id)
            .field("state", &core.state)
            .field("cancelled", &core.signal.is_cancelled())
            .field("gate_open", &self.inner.gate.is_open())
            .field("priority", &self.priority())
            .field("disposed", &core.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_start_from_not_started_and_paused() {
        let controller = ExecutionController::new();
        assert_eq!(controller.state(), ExecutionState::NotStarted);

        assert!(controller.start());
        assert!(controller.is_running());
        assert!(!controller.start(), "start while running is a no-op");

        assert!(controller.pause());
        assert!(controller.is_paused());
        assert!(!controller.gate().is_open());

        assert!(controller.start());
        assert!(controller.is_running());
        assert!(controller.gate().is_open());
    }

    #[test]
    fn test_pause_only_from_running() {
        let controller = ExecutionController::new();
        assert!(!controller.pause());
        assert_eq!(controller.state(), ExecutionState::NotStarted);
        assert!(controller.gate().is_open());
    }

    #[test]
    fn test_stop_raises_signal_and_opens_gate() {
        let controller = ExecutionController::new();
        assert!(!controller.stop(), "stop is not permitted before start");

        controller.start();
        controller.pause();
        let signal = controller.signal();

        assert!(controller.stop());
        assert!(controller.is_stopped());
        assert!(signal.is_cancelled());
        assert!(controller.gate().is_open());
        assert!(!controller.stop());
    }

    #[test]
    fn test_cancel_from_not_started() {
        let controller = ExecutionController::new();
        assert!(controller.cancel());
        assert!(controller.is_cancelled());
        assert!(controller.signal().is_cancelled());
        assert!(!controller.cancel(), "cancel is idempotent");
        assert!(!controller.start(), "cancelled is terminal");
    }

    #[test]
    fn test_cancel_not_permitted_after_completion() {
        let controller = ExecutionController::new();
        controller.start();
        assert!(controller.complete());
        assert!(!controller.cancel());
        assert!(controller.is_completed());
        assert!(!controller.signal().is_cancelled());
    }

    #[test]
    fn test_cancel_permitted_after_stop() {
        let controller = ExecutionController::new();
        controller.start();
        controller.stop();
        assert!(controller.cancel());
        assert!(controller.is_cancelled());
    }

    #[test]
    fn test_time_out_raises_signal() {
        let controller = ExecutionController::new();
        controller.start();
        assert!(controller.time_out());
        assert_eq!(controller.state(), ExecutionState::Timeout);
        assert!(controller.signal().is_cancelled());
    }

    #[test]
    fn test_reset_gives_fresh_signal() {
        let controller = ExecutionController::new();
        controller.cancel();
        let old_signal = controller.signal();

        assert!(controller.reset());
        assert_eq!(controller.state(), ExecutionState::NotStarted);
        assert!(old_signal.is_cancelled());
        assert!(!controller.signal().is_cancelled());
        assert!(!controller.reset(), "reset only applies to terminal states");
    }

    #[test]
    fn test_dispose_ignores_later_transitions() {
        let controller = ExecutionController::new();
        controller.start();
        controller.pause();
        controller.dispose();
        controller.dispose();

        assert!(controller.is_disposed());
        assert!(controller.gate().is_open());
        assert!(!controller.start());
        assert!(controller.is_paused());
    }

    #[test]
    fn test_priority_hint() {
        let controller = ExecutionController::new();
        assert_eq!(controller.priority(), TaskPriority::Normal);
        controller.set_priority(TaskPriority::Highest);
        assert_eq!(controller.priority(), TaskPriority::Highest);
    }

    #[tokio::test]
    async fn test_cancel_releases_paused_waiter() {
        let controller = ExecutionController::new();
        controller.start();
        controller.pause();

        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.wait_if_paused().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        controller.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("paused waiter should observe cancellation")
            .expect("waiter should not panic");
        assert!(outcome.unwrap_err().is_cancellation());
    }

    #[tokio::test]
    async fn test_resume_releases_paused_waiter() {
        let controller = ExecutionController::new();
        controller.start();
        controller.pause();

        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.wait_if_paused().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.start();

        let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("paused waiter should resume")
            .expect("waiter should not panic");
        assert!(outcome.is_ok());
    }
}
