//! Single-task and batch runners
//!
//! Both runners share one lifecycle: optional start delay, controller start,
//! a race between the work, the timeout and the cancellation signal, and a
//! final [`ExecutionResult`](crate::ExecutionResult) with at most one of the
//! error handler or completion callback fired.

mod batch;
mod driver;
pub(crate) mod options;
mod progress;
mod single;
mod work;

pub use batch::{BatchTaskRunner, ExecutionMode};
pub use options::{CompletionCallback, ErrorHandler, TimeoutHandler};
pub use progress::ProgressSink;
pub use single::SingleTaskRunner;
