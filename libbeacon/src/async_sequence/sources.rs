use super::AsyncSequence;
use crate::async_result::AsyncResult;

/// A sequence over the elements of a synchronous iterator. Every pull resolves immediately.
pub struct IterSequence<I> {
    iter: Option<I>,
}

impl<T, I> AsyncSequence<T> for IterSequence<I>
where
    T: Clone + Send + 'static,
    I: Iterator<Item = T> + Send,
{
    fn next(&mut self) -> AsyncResult<Option<T>> {
        let item = self.iter.as_mut().and_then(Iterator::next);
        if item.is_none() {
            // release whatever the iterator holds as soon as it runs dry
            self.iter = None;
        }
        AsyncResult::completed(item)
    }
}

pub fn from_iter<I: IntoIterator>(iter: I) -> IterSequence<I::IntoIter> {
    IterSequence { iter: Some(iter.into_iter()) }
}

pub fn of<T>(items: Vec<T>) -> IterSequence<std::vec::IntoIter<T>> {
    from_iter(items)
}

pub fn empty<T>() -> IterSequence<std::iter::Empty<T>> {
    from_iter(std::iter::empty())
}

/// A sequence of exactly one element that becomes available later.
pub struct Single<T> {
    pending: Option<AsyncResult<T>>,
}

pub fn single<T>(result: AsyncResult<T>) -> Single<T> {
    Single { pending: Some(result) }
}

impl<T: Clone + Send + 'static> AsyncSequence<T> for Single<T> {
    fn next(&mut self) -> AsyncResult<Option<T>> {
        match self.pending.take() {
            Some(result) => {
                let item = result.map(Some);
                item.propagate_cancel_to(&result);
                item
            }
            None => AsyncResult::completed(None),
        }
    }
}

/// A sequence over results that resolve independently, yielded in iteration order.
///
/// The first failed result fails the sequence; consumers stop pulling at that point.
pub struct FromResults<I> {
    results: I,
}

pub fn from_results<T, I>(results: I) -> FromResults<I::IntoIter>
where
    I: IntoIterator<Item = AsyncResult<T>>,
{
    FromResults { results: results.into_iter() }
}

impl<T, I> AsyncSequence<T> for FromResults<I>
where
    T: Clone + Send + 'static,
    I: Iterator<Item = AsyncResult<T>> + Send,
{
    fn next(&mut self) -> AsyncResult<Option<T>> {
        match self.results.next() {
            Some(result) => {
                let item = result.map(Some);
                item.propagate_cancel_to(&result);
                item
            }
            None => AsyncResult::completed(None),
        }
    }
}
