//! Reusable binary pause gate

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

use super::CancelSignal;
use crate::Result;

/// A reusable binary gate: open (non-blocking) or closed (blocking).
///
/// Workers wait on it to implement cooperative pause. It supports both
/// blocking waits from synchronous work running on a blocking thread and
/// suspendable waits from async work. Many waiters may wait concurrently; a
/// single setter (the controller) opens and closes it.
#[derive(Debug)]
pub struct PauseGate {
    open: Mutex<bool>,
    condvar: Condvar,
    notify: Notify,
}

impl PauseGate {
    /// Create a gate, initially open
    pub fn new() -> Self {
        Self {
            open: Mutex::new(true),
            condvar: Condvar::new(),
            notify: Notify::new(),
        }
    }

    /// Whether the gate currently lets waiters through
    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Open the gate and release every waiter
    pub(crate) fn open(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.condvar.notify_all();
        self.notify.notify_waiters();
    }

    /// Close the gate; subsequent waits block until it is reopened
    pub(crate) fn close(&self) {
        *self.open.lock() = false;
    }

    /// Block the current thread until the gate opens or `signal` is raised.
    ///
    /// Must not be called from an async task; use [`wait`](Self::wait) there.
    pub fn wait_blocking(&self, signal: &CancelSignal) -> Result<()> {
        let mut open = self.open.lock();
        // The controller reopens the gate whenever it raises the signal.
        while !*open && !signal.is_cancelled() {
            self.condvar.wait(&mut open);
        }
        drop(open);
        signal.check()
    }

    /// Suspend until the gate opens or `signal` is raised.
    pub async fn wait(&self, signal: &CancelSignal) -> Result<()> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_open() || signal.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = signal.cancelled() => break,
            }
        }
        signal.check()
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}
