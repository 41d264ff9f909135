use super::AsyncSequence;
use crate::async_result::{AsyncResult, Outcome};
use log::*;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;

struct Driver<S, A, F, T> {
    source: S,
    acc: Option<A>,
    step: F,
    in_flight: Option<AsyncResult<Option<T>>>,
}

/// Pull `source` to the end (or until `step` breaks), folding every element into `init`.
///
/// Synchronously available elements are consumed in a loop, so arbitrarily long sequences of ready elements do not
/// grow the stack. Only a pull that is still pending suspends the loop; its continuation restarts it.
pub(crate) fn drive<T, S, A, F>(source: S, init: A, step: F) -> AsyncResult<A>
where
    T: Clone + Send + 'static,
    S: AsyncSequence<T> + 'static,
    A: Clone + Send + 'static,
    F: FnMut(&mut A, T) -> ControlFlow<()> + Send + 'static,
{
    let result = AsyncResult::new();
    let driver = Arc::new(Mutex::new(Driver { source, acc: Some(init), step, in_flight: None }));
    let on_cancel = Arc::clone(&driver);
    result.when_complete(move |outcome: &Outcome<A>| {
        if matches!(outcome, Err(e) if e.is_cancelled()) {
            let in_flight = on_cancel.lock().in_flight.take();
            if let Some(pull) = in_flight {
                pull.cancel();
            }
        }
    });
    pull_next(driver, result.clone());
    result
}

fn pull_next<T, S, A, F>(driver: Arc<Mutex<Driver<S, A, F, T>>>, result: AsyncResult<A>)
where
    T: Clone + Send + 'static,
    S: AsyncSequence<T> + 'static,
    A: Clone + Send + 'static,
    F: FnMut(&mut A, T) -> ControlFlow<()> + Send + 'static,
{
    loop {
        if result.is_done() {
            return;
        }
        let pull = driver.lock().source.next();
        match pull.try_get() {
            Some(outcome) => {
                if !accept(&driver, &result, outcome) {
                    return;
                }
            }
            None => {
                driver.lock().in_flight = Some(pull.clone());
                let (driver, result) = (Arc::clone(&driver), result.clone());
                pull.when_complete(move |outcome| {
                    driver.lock().in_flight = None;
                    if accept(&driver, &result, outcome.clone()) {
                        pull_next(driver, result);
                    }
                });
                return;
            }
        }
    }
}

/// Fold one pulled outcome into the accumulator. Returns `true` if the source should be pulled again.
fn accept<T, S, A, F>(
    driver: &Arc<Mutex<Driver<S, A, F, T>>>,
    result: &AsyncResult<A>,
    outcome: Outcome<Option<T>>,
) -> bool
where
    T: Clone + Send + 'static,
    A: Clone + Send + 'static,
    F: FnMut(&mut A, T) -> ControlFlow<()>,
{
    let finished = {
        let mut guard = driver.lock();
        let Driver { acc, step, .. } = &mut *guard;
        match outcome {
            Ok(Some(item)) => match acc.as_mut().map(|acc| step(acc, item)) {
                Some(ControlFlow::Continue(())) => return true,
                Some(ControlFlow::Break(())) => acc.take().map(Ok),
                None => None,
            },
            Ok(None) => acc.take().map(Ok),
            Err(err) => {
                trace!("Sequence failed, abandoning the terminal operation: {err}");
                acc.take();
                Some(Err(err))
            }
        }
    };
    if let Some(outcome) = finished {
        result.propagate(outcome);
    }
    false
}
