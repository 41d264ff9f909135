//! Pull-based asynchronous sequences.
//!
//! An [`AsyncSequence`] hands out one element per [`next`](AsyncSequence::next) call. Every element is delivered through
//! an [`AsyncResult`], so a producer may take as long as it likes to yield. The consumer decides when to pull again,
//! which gives natural back-pressure: nothing upstream runs until somebody asks for the next element.
//!
//! Only two primitive transformations exist: [`flat_map`](SequenceExt::flat_map) and [`slice`](SequenceExt::slice).
//! Everything else (`map`, `filter`, `limit`, `take_while`, ...) is built on top of them.
//!
//! Terminal signals:
//! * `Ok(None)`: the sequence is exhausted (or was stopped by a slice) and will not yield again.
//! * `Err(_)`: the sequence failed. Consumers stop pulling.

mod collect;
mod flat_map;
mod queue;
mod slice;
mod sources;
mod transform;

pub use flat_map::FlatMap;
pub use queue::LimitedAsyncQueue;
pub use slice::{limit, take_until, take_while, Limit, Slice, SliceResult, Slicer, TakeUntil, TakeWhile, Then};
pub use sources::{empty, from_iter, from_results, of, single, FromResults, IterSequence, Single};
pub use transform::{Map, Peek};

use crate::async_result::{AsyncResult, Outcome};
use futures::Stream;
use std::collections::VecDeque;
use std::ops::ControlFlow;

pub trait AsyncSequence<T>: Send {
    /// Pull the next element.
    ///
    /// Callers must wait for the returned result before pulling again. Cancelling the returned result cancels the
    /// upstream pull it is waiting on and stops the sequence.
    fn next(&mut self) -> AsyncResult<Option<T>>;
}

impl<T, S: AsyncSequence<T> + ?Sized> AsyncSequence<T> for Box<S> {
    fn next(&mut self) -> AsyncResult<Option<T>> {
        (**self).next()
    }
}

pub type BoxSequence<T> = Box<dyn AsyncSequence<T> + 'static>;

/// Transformations and terminal operations for every [`AsyncSequence`].
pub trait SequenceExt<T: Clone + Send + 'static>: AsyncSequence<T> + Sized + 'static {
    /// Replace every element with a whole sequence. Each nested sequence is drained completely, in order, before the
    /// source is pulled again.
    fn flat_map<R, N, F>(self, mapper: F) -> FlatMap<Self, F, T, N>
    where
        R: Clone + Send + 'static,
        N: AsyncSequence<R> + 'static,
        F: FnMut(T) -> N + Send + 'static,
    {
        FlatMap::new(self, mapper)
    }

    /// Let `slicer` decide, element by element, where the sequence ends.
    fn slice<D: Slicer<T> + 'static>(self, slicer: D) -> Slice<Self, D> {
        Slice::new(self, slicer)
    }

    fn map<R, F>(self, mapper: F) -> Map<Self, F, T>
    where
        R: Clone + Send + 'static,
        F: FnMut(T) -> R + Send + 'static,
    {
        Map::new(self, mapper)
    }

    fn filter<P>(self, mut predicate: P) -> impl AsyncSequence<T> + 'static
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        self.flat_map(move |item| {
            let keep = predicate(&item);
            from_iter(keep.then_some(item))
        })
    }

    /// Observe elements as they flow past without changing them.
    fn peek<F>(self, visitor: F) -> Peek<Self, F>
    where
        F: FnMut(&T) + Send + 'static,
    {
        Peek::new(self, visitor)
    }

    fn map_async<R, F>(self, mut mapper: F) -> impl AsyncSequence<R> + 'static
    where
        R: Clone + Send + 'static,
        F: FnMut(T) -> AsyncResult<R> + Send + 'static,
    {
        self.flat_map(move |item| single(mapper(item)))
    }

    fn limit(self, count: u64) -> Slice<Self, Limit> {
        let sliced = self.slice(limit(count));
        if count == 0 {
            sliced.stop();
        }
        sliced
    }

    fn take_while<P>(self, predicate: P) -> Slice<Self, TakeWhile<P>>
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        self.slice(take_while(predicate))
    }

    /// Stop at the first element matching `predicate`, yielding it as well if `include_last` is set.
    fn take_until<P>(self, predicate: P, include_last: bool) -> Slice<Self, TakeUntil<P>>
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        self.slice(take_until(predicate, include_last))
    }

    fn collect_vec(self) -> AsyncResult<Vec<T>> {
        collect::drive(self, Vec::new(), |items, item| {
            items.push(item);
            ControlFlow::Continue(())
        })
    }

    fn for_each<F>(self, mut consumer: F) -> AsyncResult<()>
    where
        F: FnMut(T) + Send + 'static,
    {
        collect::drive(self, (), move |_, item| {
            consumer(item);
            ControlFlow::Continue(())
        })
    }

    /// Accumulate every element into `init`, in order.
    fn fold<A, F>(self, init: A, mut folder: F) -> AsyncResult<A>
    where
        A: Clone + Send + 'static,
        F: FnMut(&mut A, T) + Send + 'static,
    {
        collect::drive(self, init, move |acc, item| {
            folder(acc, item);
            ControlFlow::Continue(())
        })
    }

    /// The first element matching `predicate`. Stops pulling as soon as it is found.
    fn find_first<P>(self, mut predicate: P) -> AsyncResult<Option<T>>
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        collect::drive(self, None, move |found, item| {
            if predicate(&item) {
                *found = Some(item);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    fn find_last<P>(self, mut predicate: P) -> AsyncResult<Option<T>>
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        collect::drive(self, None, move |found, item| {
            if predicate(&item) {
                *found = Some(item);
            }
            ControlFlow::Continue(())
        })
    }

    /// The last `count` elements, oldest first.
    fn collect_last(self, count: usize) -> AsyncResult<Vec<T>> {
        collect::drive(self, VecDeque::with_capacity(count), move |window, item| {
            if count > 0 {
                if window.len() == count {
                    window.pop_front();
                }
                window.push_back(item);
            }
            ControlFlow::Continue(())
        })
        .map(Vec::from)
    }

    /// Adapt to a [`futures::Stream`]. A failure is yielded once as `Err` and ends the stream.
    fn into_stream(self) -> impl Stream<Item = Outcome<T>> + Send + 'static {
        futures::stream::unfold(Some(self), |state| async move {
            let mut source = state?;
            match source.next().await {
                Ok(Some(item)) => Some((Ok(item), Some(source))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

impl<T, S> SequenceExt<T> for S
where
    T: Clone + Send + 'static,
    S: AsyncSequence<T> + 'static,
{
}
