use super::AsyncSequence;
use crate::async_result::AsyncResult;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;

// One-to-one transformations. Semantically `flat_map` with a single-element sequence; implemented directly because
// they never change the number of elements.

/// See [`SequenceExt::map`](super::SequenceExt::map).
pub struct Map<S, F, T> {
    source: S,
    mapper: Arc<Mutex<F>>,
    _source_item: PhantomData<fn(T)>,
}

impl<S, F, T> Map<S, F, T> {
    pub(crate) fn new(source: S, mapper: F) -> Self {
        Self { source, mapper: Arc::new(Mutex::new(mapper)), _source_item: PhantomData }
    }
}

impl<T, R, S, F> AsyncSequence<R> for Map<S, F, T>
where
    T: Clone + Send + 'static,
    R: Clone + Send + 'static,
    S: AsyncSequence<T>,
    F: FnMut(T) -> R + Send + 'static,
{
    fn next(&mut self) -> AsyncResult<Option<R>> {
        let mapper = Arc::clone(&self.mapper);
        let pull = self.source.next();
        let result = pull.map(move |item| item.map(|value| (&mut *mapper.lock())(value)));
        result.propagate_cancel_to(&pull);
        result
    }
}

/// See [`SequenceExt::peek`](super::SequenceExt::peek).
pub struct Peek<S, F> {
    source: S,
    visitor: Arc<Mutex<F>>,
}

impl<S, F> Peek<S, F> {
    pub(crate) fn new(source: S, visitor: F) -> Self {
        Self { source, visitor: Arc::new(Mutex::new(visitor)) }
    }
}

impl<T, S, F> AsyncSequence<T> for Peek<S, F>
where
    T: Clone + Send + 'static,
    S: AsyncSequence<T>,
    F: FnMut(&T) + Send + 'static,
{
    fn next(&mut self) -> AsyncResult<Option<T>> {
        let visitor = Arc::clone(&self.visitor);
        let pull = self.source.next();
        let result = pull.map(move |item| {
            if let Some(value) = &item {
                (&mut *visitor.lock())(value);
            }
            item
        });
        result.propagate_cancel_to(&pull);
        result
    }
}
