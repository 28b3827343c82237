//! Continuations: code that runs once a cell is decided, without polling.
//!
//! A continuation runs exactly once. If the cell is already decided it runs
//! inside the registering call; otherwise it runs on the thread that decides
//! the cell, before that thread's `complete`/`cancel` call returns. Whatever a
//! continuation returns, fails with, or panics with ends up in the future that
//! registering it produced. It never reaches the completing thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use crate::pair::{Future, Promise};
use crate::BoxError;

/// Cause recorded when a continuation panics.
#[derive(Debug, thiserror::Error)]
#[error("continuation panicked: {message}")]
pub struct ContinuationPanicked {
    message: String,
}

impl ContinuationPanicked {
    /// The panic payload, if it was a string.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<T: Send + 'static> Future<T> {
    /// Registers `continuation` to run once this future is decided and returns
    /// a future of whatever it produces.
    ///
    /// The continuation gets a read view of this future, so it decides for
    /// itself how to treat a value, an error or a cancellation. An `Err` it
    /// returns, or a panic, becomes the error outcome of the returned future.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_cell::promise;
    ///
    /// let (f, f_future) = promise::<i32>();
    /// let (g, g_future) = promise::<i32>();
    /// f_future.then(move |done| Ok(g.complete(done.get()?)));
    /// f.complete(100);
    /// assert_eq!(g_future.get().unwrap(), 100);
    /// ```
    pub fn then<W, F>(&self, continuation: F) -> Future<W>
    where
        W: Send + 'static,
        F: FnOnce(&Future<T>) -> Result<W, BoxError> + Send + 'static,
    {
        let (promise, chained) = Promise::new();
        self.cell.on_decided(move |cell| {
            let source = Future {
                cell: Arc::clone(cell),
            };
            run_captured(&promise, move || continuation(&source));
        });
        chained
    }

    /// A future of `f` applied to this future's value. An error or a
    /// cancellation passes through unchanged and `f` never runs.
    pub fn map<W, F>(&self, f: F) -> Future<W>
    where
        T: Clone,
        W: Send + 'static,
        F: FnOnce(T) -> W + Send + 'static,
    {
        let (promise, mapped) = Promise::new();
        self.cell.on_decided(move |cell| match cell.try_get() {
            Some(Ok(value)) => run_captured(&promise, move || Ok(f(value))),
            Some(Err(err)) => {
                promise.settle(Err(err));
            }
            None => unreachable!("decided cell reads back"),
        });
        mapped
    }
}

/// Runs `body` and decides `promise` with its result, turning a panic into an
/// error outcome.
fn run_captured<W, F>(promise: &Promise<W>, body: F)
where
    F: FnOnce() -> Result<W, BoxError>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => {
            promise.complete(value);
        }
        Ok(Err(err)) => {
            debug!(error = %err, "continuation failed");
            promise.complete_with_error(err);
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            error!(panic = %message, "continuation panicked");
            promise.fail(Arc::new(ContinuationPanicked { message }));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
