//! The shared one-shot slot behind every `Promise`/`Future` pair.
//!
//! A cell starts `Pending` and is decided exactly once. Deciding it wakes every
//! blocked reader and then runs the registered continuations in registration
//! order, on the deciding thread, with the lock released. Continuations that
//! arrive while that dispatch is still running join the same queue.

use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::{Cause, Error};

pub(crate) enum Outcome<T> {
    Pending,
    Value(T),
    Failed(Cause),
    Cancelled,
}

impl<T> Outcome<T> {
    fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }

    fn kind(&self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Value(_) => "value",
            Outcome::Failed(_) => "error",
            Outcome::Cancelled => "cancelled",
        }
    }
}

impl<T: Clone> Outcome<T> {
    /// The decided outcome as a reader sees it, `None` while pending.
    fn read(&self) -> Option<Result<T, Error>> {
        match self {
            Outcome::Pending => None,
            Outcome::Value(value) => Some(Ok(value.clone())),
            Outcome::Failed(cause) => Some(Err(Error::Failed(Arc::clone(cause)))),
            Outcome::Cancelled => Some(Err(Error::Cancelled)),
        }
    }
}

type Continuation<T> = Box<dyn FnOnce(&Arc<Cell<T>>) + Send + 'static>;

struct Inner<T> {
    outcome: Outcome<T>,
    continuations: VecDeque<Continuation<T>>,
    // Set from the decision until the deciding thread has drained the queue.
    dispatching: bool,
}

pub(crate) struct Cell<T> {
    inner: Mutex<Inner<T>>,
    decided: Condvar,
}

impl<T> Cell<T> {
    pub(crate) fn new() -> Self {
        Self::with_outcome(Outcome::Pending)
    }

    pub(crate) fn with_outcome(outcome: Outcome<T>) -> Self {
        Cell {
            inner: Mutex::new(Inner {
                outcome,
                continuations: VecDeque::new(),
                dispatching: false,
            }),
            decided: Condvar::new(),
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        !self.inner.lock().outcome.is_pending()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(self.inner.lock().outcome, Outcome::Cancelled)
    }

    /// Moves the cell out of `Pending`. Returns `false`, changing nothing, if
    /// another call got there first.
    pub(crate) fn decide(self: &Arc<Self>, outcome: Outcome<T>) -> bool {
        debug_assert!(!outcome.is_pending(), "a cell cannot be decided as pending");
        let kind = outcome.kind();
        let queued = {
            let mut inner = self.inner.lock();
            if !inner.outcome.is_pending() {
                debug!(
                    attempted = kind,
                    decided = inner.outcome.kind(),
                    "cell already decided, ignoring"
                );
                return false;
            }
            inner.outcome = outcome;
            inner.dispatching = true;
            inner.continuations.len()
        };
        let woken = self.decided.notify_all();
        trace!(outcome = kind, woken, continuations = queued, "cell decided");
        loop {
            let next = {
                let mut inner = self.inner.lock();
                let next = inner.continuations.pop_front();
                if next.is_none() {
                    inner.dispatching = false;
                }
                next
            };
            match next {
                Some(continuation) => continuation(self),
                None => break,
            }
        }
        true
    }

    /// Runs `continuation` once the cell is decided. On a decided cell whose
    /// dispatch has finished it runs right here, on the calling thread;
    /// otherwise it is queued behind every earlier registration.
    pub(crate) fn on_decided<F>(self: &Arc<Self>, continuation: F)
    where
        F: FnOnce(&Arc<Cell<T>>) + Send + 'static,
    {
        {
            let mut inner = self.inner.lock();
            if inner.outcome.is_pending() || inner.dispatching {
                inner.continuations.push_back(Box::new(continuation));
                trace!(
                    queued = inner.continuations.len(),
                    dispatching = inner.dispatching,
                    "continuation queued"
                );
                return;
            }
        }
        trace!("cell already decided, running continuation inline");
        continuation(self);
    }
}

impl<T: Clone> Cell<T> {
    pub(crate) fn try_get(&self) -> Option<Result<T, Error>> {
        self.inner.lock().outcome.read()
    }

    pub(crate) fn get(&self) -> Result<T, Error> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(result) = inner.outcome.read() {
                return result;
            }
            self.decided.wait(&mut inner);
        }
    }

    pub(crate) fn get_timeout(&self, timeout: Duration) -> Result<T, Error> {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => return self.get(),
        };
        let mut inner = self.inner.lock();
        loop {
            if let Some(result) = inner.outcome.read() {
                return result;
            }
            if self.decided.wait_until(&mut inner, deadline).timed_out() {
                return inner.outcome.read().unwrap_or_else(|| {
                    debug!(?timeout, "timed out waiting for cell");
                    Err(Error::Timeout(timeout))
                });
            }
        }
    }
}

impl<T> Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Cell")
            .field("outcome", &inner.outcome.kind())
            .field("continuations", &inner.continuations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    fn cause(msg: &str) -> Cause {
        Arc::new(io::Error::new(io::ErrorKind::Other, msg.to_string()))
    }

    #[test]
    fn only_first_decision_sticks() {
        let cell = Arc::new(Cell::new());
        assert!(cell.decide(Outcome::Value(1)));
        assert!(!cell.decide(Outcome::Value(2)));
        assert!(!cell.decide(Outcome::Failed(cause("late"))));
        assert!(!cell.decide(Outcome::Cancelled));
        assert_eq!(cell.get().unwrap(), 1);
        assert!(!cell.is_cancelled());
    }

    #[test]
    fn queued_continuations_run_in_registration_order() {
        let cell = Arc::new(Cell::<u8>::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            cell.on_decided(move |_| order.lock().push(i));
        }
        assert!(order.lock().is_empty());
        cell.decide(Outcome::Cancelled);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn continuation_on_decided_cell_runs_inline() {
        let cell = Arc::new(Cell::with_outcome(Outcome::Value(7)));
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        cell.on_decided(move |cell| {
            assert_eq!(cell.try_get().unwrap().unwrap(), 7);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn continuation_may_register_another_while_dispatching() {
        let cell = Arc::new(Cell::<u8>::new());
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        cell.on_decided(move |cell| {
            let counter = counter.clone();
            cell.on_decided(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });
        cell.decide(Outcome::Value(1));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_registration_waits_for_running_dispatch() {
        let cell = Arc::new(Cell::<u8>::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let first = order.clone();
        cell.on_decided(move |_| {
            started_tx.send(()).expect("test thread is listening");
            release_rx.recv().expect("test thread releases the first continuation");
            first.lock().push(1);
        });
        let second = order.clone();
        cell.on_decided(move |_| second.lock().push(2));

        let decider = {
            let cell = cell.clone();
            thread::spawn(move || cell.decide(Outcome::Value(0)))
        };
        started_rx.recv().expect("first continuation started");
        assert!(cell.is_done());

        let third = order.clone();
        cell.on_decided(move |_| third.lock().push(3));
        // queued behind the running dispatch, not run inline
        assert!(order.lock().is_empty());

        release_tx.send(()).expect("first continuation is waiting");
        assert!(decider.join().expect("The decider thread has panicked"));
        assert_eq!(*order.lock(), vec![1, 2, 3]);

        let fourth = order.clone();
        cell.on_decided(move |_| fourth.lock().push(4));
        assert_eq!(*order.lock(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn blocked_readers_are_released_by_decision() {
        let cell = Arc::new(Cell::<String>::new());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || cell.get())
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        cell.decide(Outcome::Value("🍓".to_string()));
        for reader in readers {
            let value = reader.join().expect("The reader thread has panicked");
            assert_eq!(value.unwrap(), "🍓");
        }
    }

    #[test]
    fn timed_out_read_leaves_cell_pending() {
        let cell = Arc::new(Cell::<u8>::new());
        let err = cell.get_timeout(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(!cell.is_done());
        assert!(cell.try_get().is_none());
    }

    #[test]
    fn huge_timeout_still_sees_decision() {
        let cell = Arc::new(Cell::with_outcome(Outcome::Value(3)));
        assert_eq!(cell.get_timeout(Duration::MAX).unwrap(), 3);
    }

    #[test]
    fn debug_shows_state_kind() {
        let cell = Arc::new(Cell::<u8>::new());
        assert!(format!("{:?}", cell).contains("pending"));
        cell.decide(Outcome::Cancelled);
        assert!(format!("{:?}", cell).contains("cancelled"));
    }
}
