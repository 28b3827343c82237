//! A standalone, completable [`std::future::Future`] and the one-way bridge
//! from a [`Future`](crate::Future) cell into it.
//!
//! [`ExternalFuture`] can have many consumers. Clones share one outcome and
//! every pending clone is woken when it is set. It knows nothing about the
//! cell it may have been bridged from: completing, failing or cancelling it by
//! hand changes only the external future.

use std::fmt::{self, Debug};
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use tracing::trace;

use crate::pair::Future;
use crate::{BoxError, Cause, Error};

/// A completable future for async code.
///
/// # Examples
///
/// ```
/// use promise_cell::promise;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (promise, future) = promise::<String>();
/// let external = future.to_external_future();
/// let task1 = thread::spawn(move || block_on(async {
///     external.await
/// }));
/// promise.complete("Hi".into());
/// let received = task1.join().expect("The task1 thread has panicked.");
/// assert_eq!(received.unwrap(), "Hi");
/// ```
pub struct ExternalFuture<T> {
    promise: Arc<Mutex<Inner<T>>>,
}

struct Inner<T> {
    value: Option<Result<T, Error>>,
    // One per distinct task polling a clone of this future.
    wakers: Vec<Waker>,
}

impl<T> ExternalFuture<T> {
    /// A pending external future.
    pub fn new() -> Self {
        ExternalFuture {
            promise: Arc::new(Mutex::new(Inner {
                value: None,
                wakers: Vec::new(),
            })),
        }
    }

    /// Resolves with `value`. Returns `false` if already resolved.
    pub fn complete(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Resolves with [`Error::Failed`] wrapping `error`. Returns `false` if
    /// already resolved.
    pub fn complete_with_error<E>(&self, error: E) -> bool
    where
        E: Into<BoxError>,
    {
        let error: BoxError = error.into();
        self.fail(Arc::from(error))
    }

    /// Resolves with [`Error::Cancelled`]. Returns `false` if already resolved.
    /// `_may_interrupt` is ignored; there is no task behind this future.
    pub fn cancel(&self, _may_interrupt: bool) -> bool {
        self.settle(Err(Error::Cancelled))
    }

    pub fn is_done(&self) -> bool {
        self.promise.lock().value.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.promise.lock().value, Some(Err(Error::Cancelled)))
    }

    fn fail(&self, cause: Cause) -> bool {
        self.settle(Err(Error::Failed(cause)))
    }

    fn settle(&self, result: Result<T, Error>) -> bool {
        let wakers = {
            let mut promise = self.promise.lock();
            if promise.value.is_some() {
                return false;
            }
            promise.value = Some(result);
            mem::take(&mut promise.wakers)
        };
        trace!(wakers = wakers.len(), "external future resolved");
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// A new [`ExternalFuture`] that takes on this future's outcome once it is
    /// decided: the value, the same failure cause, or a cancellation.
    ///
    /// Only this future's outcome flows into the external future. Nothing
    /// done to the external future is visible from this cell.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_cell::promise;
    ///
    /// let (_promise, future) = promise::<u32>();
    /// let external = future.to_external_future();
    /// external.complete(100);
    /// assert!(!future.is_done());
    /// ```
    pub fn to_external_future(&self) -> ExternalFuture<T> {
        let external = ExternalFuture::new();
        let sink = external.clone();
        // `then` hands the bridge a read view only
        self.then(move |source| {
            if let Some(result) = source.try_get() {
                sink.settle(result);
            }
            Ok(())
        });
        external
    }
}

impl<T: Clone> std::future::Future for ExternalFuture<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut promise = self.promise.lock();
        match promise.value {
            Some(ref value) => Poll::Ready(value.clone()),
            None => {
                if !promise.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    promise.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> Default for ExternalFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ExternalFuture<T> {
    fn clone(&self) -> Self {
        ExternalFuture {
            promise: self.promise.clone(),
        }
    }
}

impl<T> Debug for ExternalFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let promise = self.promise.lock();
        let state = match promise.value {
            None => "pending",
            Some(Ok(_)) => "value",
            Some(Err(Error::Cancelled)) => "cancelled",
            Some(Err(_)) => "error",
        };
        f.debug_struct("ExternalFuture")
            .field("state", &state)
            .field("wakers", &promise.wakers.len())
            .finish()
    }
}
