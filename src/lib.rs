//! A one-shot promise/future cell for handing a single result between threads.
//!
//! A [`Promise`] is the write side and a [`Future`] is the read side of the same
//! cell. The cell is decided exactly once, with a value, an error or a
//! cancellation. Readers may block ([`Future::get`], [`Future::get_timeout`]),
//! peek ([`Future::try_get`]), or attach continuations ([`Future::then`],
//! [`Future::map`]) that run on whichever thread decides the cell.
//! [`Future::to_external_future`] hands the outcome to async code as a plain
//! [`std::future::Future`] without giving that code any control over the cell.
//!
//! # Examples
//!
//! ```
//! use promise_cell::promise;
//! use std::thread;
//!
//! let (promise, future) = promise::<u32>();
//! let doubled = future.map(|v| v * 2);
//! let producer = thread::spawn(move || promise.complete(21));
//! assert_eq!(doubled.get().unwrap(), 42);
//! assert!(producer.join().expect("The producer thread has panicked"));
//! ```

use std::sync::Arc;
use std::time::Duration;

mod cell;
mod chain;
pub mod external;
pub mod pair;

pub use chain::ContinuationPanicked;
pub use external::ExternalFuture;
pub use pair::{Future, Promise};

/// Failure handed to [`Promise::complete_with_error`]. Any error type converts
/// into it, so `?` works inside continuations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared form of a producer failure, reported to every reader of the cell.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Why reading a future did not produce a value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The deadline passed while the cell was still pending. The cell is left
    /// untouched, so reading again is fine.
    #[error("timed out after {0:?} waiting for the future")]
    Timeout(Duration),
    /// The cell was cancelled.
    #[error("future was cancelled")]
    Cancelled,
    /// The producer completed the cell with an error.
    #[error("future completed with an error: {0}")]
    Failed(#[source] Cause),
}

impl Error {
    /// The producer's failure, if this is [`Error::Failed`].
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Error::Failed(cause) => Some(cause),
            _ => None,
        }
    }

    /// Whether reading again may still succeed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

/// Creates a pending cell and returns its write and read views.
///
/// Same as [`Promise::new`].
pub fn promise<T>() -> (Promise<T>, Future<T>) {
    Promise::new()
}
