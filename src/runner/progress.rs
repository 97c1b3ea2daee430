//! Progress reporting

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

/// Receives progress values in `[0.0, 1.0]`.
///
/// Implemented for plain closures and for tokio channel senders, so a caller
/// can either react inline or drain progress from another task.
pub trait ProgressSink: Send + Sync {
    /// Report a progress value
    fn report(&self, value: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, value: f64) {
        self(value)
    }
}

impl ProgressSink for mpsc::UnboundedSender<f64> {
    fn report(&self, value: f64) {
        // A dropped receiver just means nobody listens anymore.
        let _ = self.send(value);
    }
}

impl ProgressSink for watch::Sender<f64> {
    fn report(&self, value: f64) {
        self.send_replace(value);
    }
}

/// Forwards progress to the configured sink, keeping reports non-decreasing
/// and clamped to `[0.0, 1.0]` even when parallel workers finish out of order.
pub(crate) struct ProgressReporter {
    sink: Option<Arc<dyn ProgressSink>>,
    last: Mutex<f64>,
}

impl ProgressReporter {
    pub(crate) fn new(sink: Option<Arc<dyn ProgressSink>>) -> Self {
        Self {
            sink,
            last: Mutex::new(0.0),
        }
    }

    pub(crate) fn report(&self, value: f64) {
        let Some(sink) = &self.sink else {
            return;
        };
        let value = value.clamp(0.0, 1.0);
        // Reporting under the lock keeps the sink's view ordered.
        let mut last = self.last.lock();
        if value < *last {
            return;
        }
        *last = value;
        sink.report(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_are_monotonic_and_clamped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            move |value: f64| seen.lock().push(value)
        };
        let reporter = ProgressReporter::new(Some(Arc::new(sink)));

        reporter.report(0.0);
        reporter.report(0.5);
        reporter.report(0.25);
        reporter.report(1.5);

        assert_eq!(*seen.lock(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<f64>();
        drop(rx);
        tx.report(0.5);
    }

    #[test]
    fn test_watch_sink_keeps_latest_value() {
        let (tx, rx) = watch::channel(0.0);
        let reporter = ProgressReporter::new(Some(Arc::new(tx)));
        reporter.report(0.3);
        reporter.report(0.9);
        assert_eq!(*rx.borrow(), 0.9);
    }
}
