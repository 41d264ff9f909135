//! Single-assignment asynchronous results.
//!
//! An [`AsyncResult`] is an explicit state box that is either pending, succeeded or failed. Observers register
//! continuations with [`AsyncResult::when_complete`] (or one of the combinators built on it) and every continuation runs
//! exactly once, when the result is resolved.
//!
//! # Dispatch discipline
//!
//! - Continuations of one result run on the thread that resolves it, in registration order.
//! - A continuation registered after resolution runs immediately, on the registering thread.
//! - Nothing here assumes thread affinity. A `map` continuation may well run on a different tokio worker than the one
//!   that created the source result.
//!
//! # Cancellation
//!
//! Cancelling a pending result fails it with [`AsyncError::Cancelled`]. That failure flows to every result derived from
//! it with [`map`](AsyncResult::map), [`then`](AsyncResult::then) or [`transform`](AsyncResult::transform), so
//! cancellation reaches the whole chain. Cancelling the result returned by `then` also cancels the nested result it is
//! waiting on. Cancelling an already resolved result does nothing.
//!
//! `AsyncResult` implements [`Future`], so it can be awaited from async code. [`AsyncResult::join`] blocks the calling
//! thread and is only meant for the outermost boundary of an application (tests, CLI entry points).

mod runner;

pub use runner::{AsyncRunner, RepeatingTask, TokioAsyncRunner};

use crate::error::{AsyncError, ContractViolation};
use log::*;
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

pub type Outcome<T> = Result<T, AsyncError>;

type Continuation<T> = Box<dyn FnOnce(&Outcome<T>) + Send + 'static>;

enum State<T> {
    Pending { continuations: Vec<Continuation<T>>, wakers: Vec<Waker> },
    Resolved(Outcome<T>),
}

/// A handle to a value (or failure) that will be available later.
///
/// Handles are cheap to clone; all clones observe the same state.
pub struct AsyncResult<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for AsyncResult<T> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

impl<T: Clone + Send + 'static> Default for AsyncResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.lock() {
            State::Pending { continuations, .. } => format!("pending ({} observers)", continuations.len()),
            State::Resolved(outcome) => match outcome {
                Ok(_) => "succeeded".to_string(),
                Err(err) => format!("failed: {err}"),
            },
        };
        write!(f, "AsyncResult({state})")
    }
}

impl<T: Clone + Send + 'static> AsyncResult<T> {
    /// Create a new pending result.
    pub fn new() -> Self {
        let state = State::Pending { continuations: Vec::new(), wakers: Vec::new() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn completed(value: T) -> Self {
        Self { state: Arc::new(Mutex::new(State::Resolved(Ok(value)))) }
    }

    pub fn failed(error: AsyncError) -> Self {
        Self { state: Arc::new(Mutex::new(State::Resolved(Err(error)))) }
    }

    /// Schedule synchronous `work` on the runner's blocking pool and return a result that tracks its outcome.
    ///
    /// The calling thread never waits for `work`.
    pub fn run_on_executor<R, F>(runner: &R, work: F) -> Self
    where
        R: AsyncRunner + ?Sized,
        F: FnOnce() -> Outcome<T> + Send + 'static,
    {
        runner.run_blocking(work)
    }

    /// Resolve the result successfully.
    ///
    /// Returns [`ContractViolation::AlreadyResolved`] if the result was already resolved. The first resolution stays
    /// authoritative and observers are not notified a second time.
    pub fn complete(&self, value: T) -> Result<(), ContractViolation> {
        self.resolve(Ok(value))
    }

    /// Resolve the result with a failure. See [`complete`](Self::complete) for the double-resolution contract.
    pub fn fail(&self, error: AsyncError) -> Result<(), ContractViolation> {
        self.resolve(Err(error))
    }

    /// Resolve the result unless it is already resolved. Returns whether this call resolved it.
    ///
    /// Unlike [`complete`](Self::complete), losing the race is not a contract violation. Use this where a result may
    /// legitimately be resolved from two sides, e.g. by a producer and by a consumer cancelling it.
    pub fn try_complete(&self, outcome: Outcome<T>) -> bool {
        self.try_resolve(outcome).is_ok()
    }

    /// Cancel a pending result. Returns `false` (and does nothing) if the result had already been resolved.
    pub fn cancel(&self) -> bool {
        match self.try_resolve(Err(AsyncError::Cancelled)) {
            Ok(()) => {
                trace!("Pending result cancelled");
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(&*self.state.lock(), State::Resolved(_))
    }

    pub fn is_cancelled(&self) -> bool {
        match &*self.state.lock() {
            State::Resolved(outcome) => matches!(outcome, Err(AsyncError::Cancelled)),
            State::Pending { .. } => false,
        }
    }

    /// Register an observer of the terminal state.
    pub fn when_complete<F>(&self, f: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Pending { continuations, .. } => {
                    continuations.push(Box::new(f));
                    return;
                }
                State::Resolved(outcome) => outcome.clone(),
            }
        };
        f(&outcome);
    }

    /// Cancel `upstream` as soon as this result is cancelled.
    pub fn propagate_cancel_to<U: Clone + Send + 'static>(&self, upstream: &AsyncResult<U>) {
        let upstream = upstream.clone();
        self.when_complete(move |outcome| {
            if matches!(outcome, Err(AsyncError::Cancelled)) {
                upstream.cancel();
            }
        });
    }

    fn resolve(&self, outcome: Outcome<T>) -> Result<(), ContractViolation> {
        self.try_resolve(outcome).inspect_err(|violation| {
            error!("Contract violation: {violation}");
        })
    }

    /// Resolve a result that is being fed from an upstream result. A downstream result that was cancelled in the
    /// meantime simply ignores the upstream outcome.
    pub(crate) fn propagate(&self, outcome: Outcome<T>) {
        if let Err(violation) = self.try_resolve(outcome) {
            if !self.is_cancelled() {
                error!("Contract violation while propagating an upstream outcome: {violation}");
            }
        }
    }

    fn try_resolve(&self, outcome: Outcome<T>) -> Result<(), ContractViolation> {
        let (continuations, wakers) = {
            let mut state = self.state.lock();
            let pending = match &mut *state {
                State::Pending { continuations, wakers } => (std::mem::take(continuations), std::mem::take(wakers)),
                State::Resolved(_) => return Err(ContractViolation::AlreadyResolved),
            };
            *state = State::Resolved(outcome.clone());
            pending
        };
        for continuation in continuations {
            continuation(&outcome);
        }
        for waker in wakers {
            waker.wake();
        }
        Ok(())
    }

    /// The outcome, if the result has been resolved.
    pub fn try_get(&self) -> Option<Outcome<T>> {
        match &*self.state.lock() {
            State::Resolved(outcome) => Some(outcome.clone()),
            State::Pending { .. } => None,
        }
    }

    /// Block the current thread until the result resolves.
    ///
    /// Never call this from inside a validator, a sequence stage or any other code running on an async worker.
    pub fn join(self) -> Outcome<T> {
        futures::executor::block_on(self)
    }

    /// Map the outcome (success or failure) into another outcome.
    pub fn transform<U, F>(&self, f: F) -> AsyncResult<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>) -> Outcome<U> + Send + 'static,
    {
        let result = AsyncResult::new();
        let downstream = result.clone();
        self.when_complete(move |outcome| downstream.propagate(f(outcome.clone())));
        result
    }

    /// Apply `f` to a successful value. Failures, including cancellation, pass through unchanged.
    pub fn map<U, F>(&self, f: F) -> AsyncResult<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.transform(move |outcome| outcome.map(f))
    }

    /// Observe both success and failure and produce a value from either.
    ///
    /// The returned result always succeeds; this is how failures are turned into data (e.g. validation verdicts).
    pub fn handle<U, F>(&self, f: F) -> AsyncResult<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Outcome<T>) -> U + Send + 'static,
    {
        self.transform(move |outcome| Ok(f(outcome)))
    }

    /// Chain another asynchronous step (flat-map).
    pub fn then<U, F>(&self, f: F) -> AsyncResult<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> AsyncResult<U> + Send + 'static,
    {
        let result = AsyncResult::new();
        let downstream = result.clone();
        self.when_complete(move |outcome| match outcome {
            Ok(value) => {
                if downstream.is_done() {
                    return;
                }
                let nested = f(value.clone());
                let target = downstream.clone();
                nested.when_complete(move |nested_outcome| target.propagate(nested_outcome.clone()));
                downstream.propagate_cancel_to(&nested);
            }
            Err(err) => downstream.propagate(Err(err.clone())),
        });
        result
    }
}

impl<T: Clone + Send + 'static> Future for AsyncResult<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Resolved(outcome) => Poll::Ready(outcome.clone()),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
