use super::AsyncSequence;
use crate::async_result::AsyncResult;
use parking_lot::Mutex;
use std::sync::Arc;

/// The decision a [`Slicer`] makes for every element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceResult {
    /// Yield the element and keep going.
    Continue,
    /// Yield the element, then end the sequence.
    IncludeAndStop,
    /// Drop the element and end the sequence.
    SkipAndStop,
}

impl SliceResult {
    pub fn is_stop(&self) -> bool {
        !matches!(self, SliceResult::Continue)
    }
}

pub trait Slicer<T>: Send {
    fn slice(&mut self, element: &T) -> SliceResult;

    /// Run `self` until it stops, then hand the remaining elements to `next`.
    fn then<N: Slicer<T>>(self, next: N) -> Then<Self, N>
    where
        Self: Sized,
    {
        Then { first: self, next, first_stopped: false }
    }
}

impl<T, F> Slicer<T> for F
where
    F: FnMut(&T) -> SliceResult + Send,
{
    fn slice(&mut self, element: &T) -> SliceResult {
        self(element)
    }
}

/// Yield at most `count` elements.
pub fn limit(count: u64) -> Limit {
    Limit { remaining: count }
}

#[derive(Clone, Debug)]
pub struct Limit {
    remaining: u64,
}

impl<T> Slicer<T> for Limit {
    fn slice(&mut self, _: &T) -> SliceResult {
        match self.remaining {
            0 => SliceResult::SkipAndStop,
            1 => {
                self.remaining = 0;
                SliceResult::IncludeAndStop
            }
            _ => {
                self.remaining -= 1;
                SliceResult::Continue
            }
        }
    }
}

pub fn take_while<P>(predicate: P) -> TakeWhile<P> {
    TakeWhile { predicate }
}

pub struct TakeWhile<P> {
    predicate: P,
}

impl<T, P> Slicer<T> for TakeWhile<P>
where
    P: FnMut(&T) -> bool + Send,
{
    fn slice(&mut self, element: &T) -> SliceResult {
        if (self.predicate)(element) {
            SliceResult::Continue
        } else {
            SliceResult::SkipAndStop
        }
    }
}

pub fn take_until<P>(predicate: P, include_last: bool) -> TakeUntil<P> {
    TakeUntil { predicate, include_last }
}

pub struct TakeUntil<P> {
    predicate: P,
    include_last: bool,
}

impl<T, P> Slicer<T> for TakeUntil<P>
where
    P: FnMut(&T) -> bool + Send,
{
    fn slice(&mut self, element: &T) -> SliceResult {
        match ((self.predicate)(element), self.include_last) {
            (false, _) => SliceResult::Continue,
            (true, true) => SliceResult::IncludeAndStop,
            (true, false) => SliceResult::SkipAndStop,
        }
    }
}

/// See [`Slicer::then`].
pub struct Then<A, B> {
    first: A,
    next: B,
    first_stopped: bool,
}

impl<T, A, B> Slicer<T> for Then<A, B>
where
    A: Slicer<T>,
    B: Slicer<T>,
{
    fn slice(&mut self, element: &T) -> SliceResult {
        if self.first_stopped {
            return self.next.slice(element);
        }
        match self.first.slice(element) {
            SliceResult::Continue => SliceResult::Continue,
            SliceResult::IncludeAndStop => {
                self.first_stopped = true;
                SliceResult::Continue
            }
            SliceResult::SkipAndStop => {
                self.first_stopped = true;
                self.next.slice(element)
            }
        }
    }
}

/// See [`SequenceExt::slice`](super::SequenceExt::slice).
pub struct Slice<S, D> {
    state: Arc<Mutex<SliceState<S, D>>>,
}

struct SliceState<S, D> {
    source: S,
    slicer: D,
    stopped: bool,
}

impl<S, D> Slice<S, D> {
    pub(crate) fn new(source: S, slicer: D) -> Self {
        Self { state: Arc::new(Mutex::new(SliceState { source, slicer, stopped: false })) }
    }

    /// End the slice before the source is ever pulled.
    pub(crate) fn stop(&self) {
        self.state.lock().stopped = true;
    }
}

impl<T, S, D> AsyncSequence<T> for Slice<S, D>
where
    T: Clone + Send + 'static,
    S: AsyncSequence<T> + 'static,
    D: Slicer<T> + 'static,
{
    fn next(&mut self) -> AsyncResult<Option<T>> {
        let pull = {
            let mut st = self.state.lock();
            if st.stopped {
                return AsyncResult::completed(None);
            }
            st.source.next()
        };
        let state = Arc::clone(&self.state);
        let result = pull.transform(move |outcome| {
            let mut st = state.lock();
            let item = match outcome {
                Ok(Some(item)) if !st.stopped => item,
                Ok(_) => {
                    st.stopped = true;
                    return Ok(None);
                }
                Err(err) => {
                    st.stopped = true;
                    return Err(err);
                }
            };
            match st.slicer.slice(&item) {
                SliceResult::Continue => Ok(Some(item)),
                SliceResult::IncludeAndStop => {
                    st.stopped = true;
                    Ok(Some(item))
                }
                SliceResult::SkipAndStop => {
                    st.stopped = true;
                    Ok(None)
                }
            }
        });
        result.propagate_cancel_to(&pull);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_sequence::{from_iter, of, SequenceExt};

    #[test]
    fn stops_on_include_and_stop() {
        let result = of(vec![1u32, 2, 3, 4, 5])
            .slice(|v: &u32| if *v == 3 { SliceResult::IncludeAndStop } else { SliceResult::Continue })
            .collect_vec();
        assert_eq!(result.join().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn stops_on_skip_and_stop() {
        let result = of(vec![1u32, 2, 3, 4, 5])
            .slice(|v: &u32| if *v == 3 { SliceResult::SkipAndStop } else { SliceResult::Continue })
            .collect_vec();
        assert_eq!(result.join().unwrap(), vec![1, 2]);
    }

    #[test]
    fn stopped_slice_never_pulls_again() {
        let mut sliced = from_iter(0u32..).limit(2);
        assert_eq!(sliced.next().join().unwrap(), Some(0));
        assert_eq!(sliced.next().join().unwrap(), Some(1));
        assert_eq!(sliced.next().join().unwrap(), None);
        assert_eq!(sliced.next().join().unwrap(), None);
    }

    #[test]
    fn limit_slicer_counts_down() {
        let mut slicer = limit(2);
        assert_eq!(Slicer::<u32>::slice(&mut slicer, &7), SliceResult::Continue);
        assert_eq!(Slicer::<u32>::slice(&mut slicer, &7), SliceResult::IncludeAndStop);
        assert_eq!(Slicer::<u32>::slice(&mut slicer, &7), SliceResult::SkipAndStop);
        assert_eq!(Slicer::<u32>::slice(&mut limit(0), &7), SliceResult::SkipAndStop);
    }

    #[test]
    fn then_chains_slicers() {
        // odd prefix, then two more elements
        let result = of(vec![1u32, 3, 4, 5, 6, 7])
            .slice(take_while(|v: &u32| v % 2 == 1).then(limit(2)))
            .collect_vec();
        assert_eq!(result.join().unwrap(), vec![1, 3, 4, 5]);
    }

    #[test]
    fn take_until_slicer_decisions() {
        let mut inclusive = take_until(|v: &u32| *v > 2, true);
        assert_eq!(inclusive.slice(&1), SliceResult::Continue);
        assert_eq!(inclusive.slice(&3), SliceResult::IncludeAndStop);
        let mut exclusive = take_until(|v: &u32| *v > 2, false);
        assert_eq!(exclusive.slice(&3), SliceResult::SkipAndStop);
        assert!(SliceResult::SkipAndStop.is_stop());
    }
}
