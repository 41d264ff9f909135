use super::AsyncSequence;
use crate::async_result::{AsyncResult, Outcome};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;

/// See [`SequenceExt::flat_map`](super::SequenceExt::flat_map).
pub struct FlatMap<S, F, T, N> {
    state: Arc<Mutex<FlatMapState<S, F, N>>>,
    _source_item: PhantomData<fn(T)>,
}

struct FlatMapState<S, F, N> {
    source: S,
    mapper: F,
    current: Option<N>,
    done: bool,
}

enum Pull<T, R> {
    Source(AsyncResult<Option<T>>),
    Nested(AsyncResult<Option<R>>),
    Finished,
}

impl<S, F, T, N> FlatMap<S, F, T, N> {
    pub(crate) fn new(source: S, mapper: F) -> Self {
        let state = FlatMapState { source, mapper, current: None, done: false };
        Self { state: Arc::new(Mutex::new(state)), _source_item: PhantomData }
    }
}

impl<T, R, S, F, N> AsyncSequence<R> for FlatMap<S, F, T, N>
where
    T: Clone + Send + 'static,
    R: Clone + Send + 'static,
    S: AsyncSequence<T> + 'static,
    N: AsyncSequence<R> + 'static,
    F: FnMut(T) -> N + Send + 'static,
{
    fn next(&mut self) -> AsyncResult<Option<R>> {
        let result = AsyncResult::new();
        pull(Arc::clone(&self.state), result.clone());
        result
    }
}

fn pull<T, R, S, F, N>(state: Arc<Mutex<FlatMapState<S, F, N>>>, result: AsyncResult<Option<R>>)
where
    T: Clone + Send + 'static,
    R: Clone + Send + 'static,
    S: AsyncSequence<T> + 'static,
    N: AsyncSequence<R> + 'static,
    F: FnMut(T) -> N + Send + 'static,
{
    loop {
        if result.is_done() {
            return;
        }
        let next = {
            let mut guard = state.lock();
            let st = &mut *guard;
            if st.done {
                Pull::Finished
            } else if let Some(nested) = st.current.as_mut() {
                Pull::Nested(nested.next())
            } else {
                Pull::Source(st.source.next())
            }
        };
        match next {
            Pull::Finished => {
                result.propagate(Ok(None));
                return;
            }
            Pull::Nested(pending) => match pending.try_get() {
                Some(outcome) => {
                    if !on_nested(&state, &result, outcome) {
                        return;
                    }
                }
                None => {
                    result.propagate_cancel_to(&pending);
                    let (state, result) = (Arc::clone(&state), result.clone());
                    pending.when_complete(move |outcome| {
                        if on_nested(&state, &result, outcome.clone()) {
                            pull(state, result);
                        }
                    });
                    return;
                }
            },
            Pull::Source(pending) => match pending.try_get() {
                Some(outcome) => {
                    if !on_source(&state, &result, outcome) {
                        return;
                    }
                }
                None => {
                    result.propagate_cancel_to(&pending);
                    let (state, result) = (Arc::clone(&state), result.clone());
                    pending.when_complete(move |outcome| {
                        if on_source(&state, &result, outcome.clone()) {
                            pull(state, result);
                        }
                    });
                    return;
                }
            },
        }
    }
}

/// Returns `true` if the pull loop has to continue.
fn on_nested<S, F, N, R>(
    state: &Mutex<FlatMapState<S, F, N>>,
    result: &AsyncResult<Option<R>>,
    outcome: Outcome<Option<R>>,
) -> bool
where
    R: Clone + Send + 'static,
{
    match outcome {
        Ok(Some(item)) => {
            result.propagate(Ok(Some(item)));
            false
        }
        Ok(None) => {
            state.lock().current = None;
            true
        }
        Err(err) => {
            {
                let mut st = state.lock();
                st.current = None;
                st.done = true;
            }
            result.propagate(Err(err));
            false
        }
    }
}

fn on_source<T, S, F, N, R>(
    state: &Mutex<FlatMapState<S, F, N>>,
    result: &AsyncResult<Option<R>>,
    outcome: Outcome<Option<T>>,
) -> bool
where
    R: Clone + Send + 'static,
    F: FnMut(T) -> N,
{
    match outcome {
        Ok(Some(item)) => {
            let mut guard = state.lock();
            let st = &mut *guard;
            st.current = Some((st.mapper)(item));
            true
        }
        Ok(None) => {
            state.lock().done = true;
            result.propagate(Ok(None));
            false
        }
        Err(err) => {
            state.lock().done = true;
            result.propagate(Err(err));
            false
        }
    }
}
