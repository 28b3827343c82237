use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use crate::cell::{Cell, Outcome};
use crate::{BoxError, Cause, Error};

/// The write side of a cell. Exactly one of [`complete`](Promise::complete),
/// [`complete_with_error`](Promise::complete_with_error) or
/// [`cancel`](Promise::cancel) decides the cell; every later call is ignored
/// and returns `false`.
///
/// Clones write to the same cell, so several producers may race for it.
///
/// # Examples
///
/// ```
/// use promise_cell::Promise;
/// use std::thread;
///
/// let (promise, future) = Promise::<String>::new();
/// let reader = future.clone();
/// let task1 = thread::spawn(move || reader.get());
/// assert!(promise.complete("Hi".into()));
/// assert!(!promise.complete("Too late".into()));
/// let received = task1.join().expect("The task1 thread has panicked");
/// assert_eq!(received.unwrap(), "Hi");
/// assert_eq!(future.get().unwrap(), "Hi");
/// ```
pub struct Promise<T> {
    pub(crate) cell: Arc<Cell<T>>,
}

/// The read side of a cell. Any number of views may alias one cell; all of
/// them observe the same single outcome.
pub struct Future<T> {
    pub(crate) cell: Arc<Cell<T>>,
}

impl<T> Promise<T> {
    /// Creates a pending cell and returns its write and read views.
    pub fn new() -> (Self, Future<T>) {
        let cell = Arc::new(Cell::new());
        (
            Promise { cell: cell.clone() },
            Future { cell },
        )
    }

    /// Another read view of this promise's cell.
    pub fn future(&self) -> Future<T> {
        Future {
            cell: self.cell.clone(),
        }
    }

    /// Decides the cell with `value`. Returns `false` if it was already decided.
    pub fn complete(&self, value: T) -> bool {
        self.cell.decide(Outcome::Value(value))
    }

    /// Decides the cell with a failure, reported to readers as
    /// [`Error::Failed`]. Returns `false` if it was already decided.
    pub fn complete_with_error<E>(&self, error: E) -> bool
    where
        E: Into<BoxError>,
    {
        let error: BoxError = error.into();
        self.fail(Arc::from(error))
    }

    /// Cancels the cell. `_may_interrupt` is accepted for symmetry with other
    /// future APIs; there is no running task here to interrupt.
    pub fn cancel(&self, _may_interrupt: bool) -> bool {
        self.cell.decide(Outcome::Cancelled)
    }

    pub fn is_done(&self) -> bool {
        self.cell.is_done()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cell.is_cancelled()
    }

    pub(crate) fn fail(&self, cause: Cause) -> bool {
        self.cell.decide(Outcome::Failed(cause))
    }

    /// Decides the cell the way `result` was read from another cell.
    pub(crate) fn settle(&self, result: Result<T, Error>) -> bool {
        match result {
            Ok(value) => self.complete(value),
            Err(Error::Cancelled) => self.cancel(false),
            Err(Error::Failed(cause)) => self.fail(cause),
            Err(err @ Error::Timeout(_)) => self.fail(Arc::new(err)),
        }
    }
}

impl<T> Future<T> {
    /// A future that is already decided with `value`.
    pub fn done(value: T) -> Self {
        Future {
            cell: Arc::new(Cell::with_outcome(Outcome::Value(value))),
        }
    }

    /// A future that is already decided with a failure.
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        let error: BoxError = error.into();
        Future {
            cell: Arc::new(Cell::with_outcome(Outcome::Failed(Arc::from(error)))),
        }
    }

    /// A future that is already cancelled.
    pub fn cancelled() -> Self {
        Future {
            cell: Arc::new(Cell::with_outcome(Outcome::Cancelled)),
        }
    }

    /// True once the cell holds a value, an error or a cancellation.
    pub fn is_done(&self) -> bool {
        self.cell.is_done()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cell.is_cancelled()
    }

    /// Cancels the cell from the read side. Returns `false` if it was already
    /// decided. `_may_interrupt` is ignored, as on [`Promise::cancel`].
    pub fn cancel(&self, _may_interrupt: bool) -> bool {
        self.cell.decide(Outcome::Cancelled)
    }
}

impl<T: Clone> Future<T> {
    /// Blocks until the cell is decided.
    ///
    /// # Errors
    ///
    /// [`Error::Failed`] carrying the producer's failure, or
    /// [`Error::Cancelled`].
    pub fn get(&self) -> Result<T, Error> {
        self.cell.get()
    }

    /// Like [`get`](Future::get), giving up with [`Error::Timeout`] once
    /// `timeout` has passed. A timeout leaves the cell pending.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_cell::{promise, Error};
    /// use std::time::Duration;
    ///
    /// let (_promise, future) = promise::<u8>();
    /// let err = future.get_timeout(Duration::from_millis(1)).unwrap_err();
    /// assert!(matches!(err, Error::Timeout(_)));
    /// assert!(!future.is_done());
    /// ```
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, Error> {
        self.cell.get_timeout(timeout)
    }

    /// The outcome if the cell is decided, without blocking.
    pub fn try_get(&self) -> Option<Result<T, Error>> {
        self.cell.try_get()
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Promise {
            cell: Arc::new(Cell::new()),
        }
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("cell", &self.cell).finish()
    }
}

impl<T> Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future").field("cell", &self.cell).finish()
    }
}
