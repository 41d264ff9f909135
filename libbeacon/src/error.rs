use std::sync::Arc;
use thiserror::Error;

/// The failure channel of an [`AsyncResult`](crate::async_result::AsyncResult).
///
/// A resolved result may be observed by any number of continuations, so failures must be cheap to clone. Arbitrary
/// errors are therefore kept behind an `Arc`.
#[derive(Clone, Debug, Error)]
pub enum AsyncError {
    #[error("The operation was cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync + 'static>),
    #[error("{0}")]
    Message(String),
    #[error("A background task did not run to completion. {0}")]
    TaskFailed(String),
}

impl AsyncError {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AsyncError::Failed(Arc::new(error))
    }

    pub fn msg(msg: impl Into<String>) -> Self {
        AsyncError::Message(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AsyncError::Cancelled)
    }

    /// Try to recover the original error type from a [`AsyncError::Failed`] failure.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            AsyncError::Failed(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// A caller broke the stated invariants of a component.
///
/// These are bugs in the calling code, never runtime conditions. They are kept apart from [`AsyncError`] so that they
/// cannot be mistaken for (and silently swallowed as) a domain failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("The result has already been resolved and cannot be resolved again")]
    AlreadyResolved,
    #[error("The exchange has already completed. `{0}` is not permitted after completion")]
    AlreadyCompleted(&'static str),
    #[error("The queue has been finished. `{0}` is not permitted after finish")]
    QueueFinished(&'static str),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Buffer size overflow: {0}")]
    Overflow(usize),
    #[error(transparent)]
    Violation(#[from] ContractViolation),
}

#[derive(Clone, Debug, Error)]
pub enum RunnerError {
    #[error("No tokio runtime is available on this thread. {0}")]
    NoRuntime(String),
}
