//! Type-erased work functions and how they are invoked

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinError;
use tracing::{Instrument, Span};

use crate::control::CancelSignal;
use crate::{EngineError, Result};

pub(crate) type WorkFuture<T> = BoxFuture<'static, Result<T>>;

/// One unit of work for a single-task run.
pub(crate) enum SingleWork<T> {
    /// Synchronous work, run on a blocking thread in the background.
    Blocking(Box<dyn FnOnce(CancelSignal) -> Result<T> + Send>),
    /// Asynchronous work, spawned on the runtime in the background.
    Async(Box<dyn FnOnce(CancelSignal) -> WorkFuture<T> + Send>),
}

impl<T: Send + 'static> SingleWork<T> {
    pub(crate) fn blocking<F, E>(work: F) -> Self
    where
        F: FnOnce(CancelSignal) -> std::result::Result<T, E> + Send + 'static,
        E: Into<EngineError>,
    {
        Self::Blocking(Box::new(move |signal| work(signal).map_err(Into::into)))
    }

    pub(crate) fn asynchronous<F, Fut, E>(work: F) -> Self
    where
        F: FnOnce(CancelSignal) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<EngineError>,
    {
        Self::Async(Box::new(move |signal| {
            async move { work(signal).await.map_err(Into::into) }.boxed()
        }))
    }

    /// Run the work. Background work goes to the worker pool; foreground work
    /// runs inline in the calling task. Panics surface as
    /// [`EngineError::Panicked`].
    pub(crate) async fn invoke(self, signal: CancelSignal, background: bool) -> Result<T> {
        match (self, background) {
            (Self::Blocking(work), true) => {
                let span = Span::current();
                tokio::task::spawn_blocking(move || span.in_scope(|| work(signal)))
                    .await
                    .map_err(join_error)?
            }
            (Self::Blocking(work), false) => {
                std::panic::catch_unwind(AssertUnwindSafe(move || work(signal)))
                    .map_err(panic_error)?
            }
            (Self::Async(work), true) => tokio::spawn(work(signal).in_current_span())
                .await
                .map_err(join_error)?,
            (Self::Async(work), false) => AssertUnwindSafe(async move { work(signal).await })
                .catch_unwind()
                .await
                .map_err(panic_error)?,
        }
    }
}

/// Per-item work for a batch run.
pub(crate) enum ItemWork<I, T> {
    Blocking(Arc<dyn Fn(I, CancelSignal) -> Result<T> + Send + Sync>),
    Async(Arc<dyn Fn(I, CancelSignal) -> WorkFuture<T> + Send + Sync>),
}

impl<I, T> Clone for ItemWork<I, T> {
    fn clone(&self) -> Self {
        match self {
            Self::Blocking(work) => Self::Blocking(work.clone()),
            Self::Async(work) => Self::Async(work.clone()),
        }
    }
}

impl<I: Send + 'static, T: Send + 'static> ItemWork<I, T> {
    pub(crate) fn blocking<F, E>(work: F) -> Self
    where
        F: Fn(I, CancelSignal) -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<EngineError>,
    {
        Self::Blocking(Arc::new(move |item, signal| work(item, signal).map_err(Into::into)))
    }

    pub(crate) fn asynchronous<F, Fut, E>(work: F) -> Self
    where
        F: Fn(I, CancelSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<EngineError>,
    {
        Self::Async(Arc::new(move |item, signal| {
            let fut = work(item, signal);
            async move { fut.await.map_err(Into::into) }.boxed()
        }))
    }

    /// Same placement rules as [`SingleWork::invoke`].
    pub(crate) async fn invoke(&self, item: I, signal: CancelSignal, background: bool) -> Result<T> {
        match (self, background) {
            (Self::Blocking(work), true) => {
                let work = work.clone();
                let span = Span::current();
                tokio::task::spawn_blocking(move || span.in_scope(|| work(item, signal)))
                    .await
                    .map_err(join_error)?
            }
            (Self::Blocking(work), false) => {
                std::panic::catch_unwind(AssertUnwindSafe(|| work(item, signal)))
                    .map_err(panic_error)?
            }
            (Self::Async(work), true) => tokio::spawn(work(item, signal).in_current_span())
                .await
                .map_err(join_error)?,
            (Self::Async(work), false) => AssertUnwindSafe(async move { work(item, signal).await })
                .catch_unwind()
                .await
                .map_err(panic_error)?,
        }
    }

    /// Invoke from inside a task already running on the worker pool: async
    /// work runs in place, synchronous work moves to a blocking thread.
    pub(crate) async fn invoke_in_worker(&self, item: I, signal: CancelSignal) -> Result<T> {
        let background = matches!(self, Self::Blocking(_));
        self.invoke(item, signal, background).await
    }
}

pub(crate) fn join_error(err: JoinError) -> EngineError {
    if err.is_panic() {
        panic_error(err.into_panic())
    } else if err.is_cancelled() {
        EngineError::Cancelled
    } else {
        EngineError::Join(err)
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> EngineError {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };
    EngineError::Panicked(message)
}
