use super::AsyncSequence;
use crate::async_result::AsyncResult;
use crate::error::{ContractViolation, QueueError};
use log::*;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A bounded hand-off point between a push-style producer and a pull-style consumer.
///
/// Items put while a consumer waits are handed over directly. Otherwise they are buffered, up to `max_size` items.
/// `finish` ends the queue: waiting and future takers see the end of the sequence once the buffer is drained.
///
/// Clones share the same queue, so a producer can keep one handle while the consumer uses another as an
/// [`AsyncSequence`].
pub struct LimitedAsyncQueue<T> {
    inner: Arc<Mutex<QueueState<T>>>,
    max_size: usize,
}

struct QueueState<T> {
    items: VecDeque<T>,
    takers: VecDeque<AsyncResult<Option<T>>>,
    finished: bool,
}

impl<T> Clone for LimitedAsyncQueue<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), max_size: self.max_size }
    }
}

impl<T: Clone + Send + 'static> LimitedAsyncQueue<T> {
    pub fn new(max_size: usize) -> Self {
        let state = QueueState { items: VecDeque::new(), takers: VecDeque::new(), finished: false };
        Self { inner: Arc::new(Mutex::new(state)), max_size }
    }

    /// Offer an item. Fails with [`QueueError::Overflow`] if nobody is waiting and the buffer is full.
    pub fn put(&self, item: T) -> Result<(), QueueError> {
        loop {
            let taker = {
                let mut state = self.inner.lock();
                if state.finished {
                    return Err(ContractViolation::QueueFinished("put").into());
                }
                let mut waiting = None;
                while let Some(taker) = state.takers.pop_front() {
                    // cancelled takers are skipped
                    if !taker.is_done() {
                        waiting = Some(taker);
                        break;
                    }
                }
                match waiting {
                    Some(taker) => taker,
                    None if state.items.len() >= self.max_size => {
                        debug!("Rejecting item, the queue already holds {} items", state.items.len());
                        return Err(QueueError::Overflow(self.max_size));
                    }
                    None => {
                        state.items.push_back(item);
                        return Ok(());
                    }
                }
            };
            // the taker can be cancelled after the lock is released
            if taker.try_complete(Ok(Some(item.clone()))) {
                return Ok(());
            }
            trace!("Taker was cancelled before the item was handed over");
        }
    }

    /// Take the next item, waiting for one if the buffer is empty.
    pub fn take(&self) -> AsyncResult<Option<T>> {
        let mut state = self.inner.lock();
        if let Some(item) = state.items.pop_front() {
            return AsyncResult::completed(Some(item));
        }
        if state.finished {
            return AsyncResult::completed(None);
        }
        let taker = AsyncResult::new();
        state.takers.push_back(taker.clone());
        taker
    }

    /// Mark the end of the stream. Buffered items can still be taken.
    pub fn finish(&self) {
        let takers = {
            let mut state = self.inner.lock();
            state.finished = true;
            std::mem::take(&mut state.takers)
        };
        for taker in takers {
            taker.propagate(Ok(None));
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finished(&self) -> bool {
        self.inner.lock().finished
    }
}

impl<T: Clone + Send + 'static> AsyncSequence<T> for LimitedAsyncQueue<T> {
    fn next(&mut self) -> AsyncResult<Option<T>> {
        self.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_sequence::SequenceExt;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn put_then_take() {
        let queue = LimitedAsyncQueue::new(2);
        queue.put(1u32).unwrap();
        queue.put(2).unwrap();
        assert_eq!(queue.put(3), Err(QueueError::Overflow(2)));
        assert_eq!(queue.take().try_get().unwrap().unwrap(), Some(1));
        assert_eq!(queue.take().try_get().unwrap().unwrap(), Some(2));
        assert!(!queue.take().is_done());
    }

    #[test]
    fn waiting_taker_receives_the_item_directly() {
        let queue = LimitedAsyncQueue::new(0);
        let taker = queue.take();
        queue.put(7u32).unwrap();
        assert_eq!(taker.try_get().unwrap().unwrap(), Some(7));
        assert!(queue.is_empty());
    }

    #[test]
    fn items_are_never_lost_to_a_cancelling_taker() {
        for round in 0..2_000u32 {
            let queue = LimitedAsyncQueue::new(1);
            let taker = queue.take();
            let barrier = Arc::new(Barrier::new(2));
            let cancelling = {
                let (taker, barrier) = (taker.clone(), Arc::clone(&barrier));
                thread::spawn(move || {
                    barrier.wait();
                    taker.cancel();
                })
            };
            barrier.wait();
            queue.put(round).unwrap();
            cancelling.join().unwrap();
            let delivered = match taker.try_get() {
                Some(Ok(Some(item))) => Some(item),
                _ => queue.take().try_get().and_then(|outcome| outcome.ok()).flatten(),
            };
            assert_eq!(delivered, Some(round));
        }
    }

    #[test]
    fn cancelled_takers_are_skipped() {
        let queue = LimitedAsyncQueue::new(1);
        let abandoned = queue.take();
        let waiting = queue.take();
        assert!(abandoned.cancel());
        queue.put(5u32).unwrap();
        assert_eq!(waiting.try_get().unwrap().unwrap(), Some(5));
        assert!(queue.is_empty());
    }

    #[test]
    fn finish_releases_waiting_takers_and_drains_buffer() {
        let queue = LimitedAsyncQueue::<u32>::new(4);
        let waiting = queue.take();
        queue.finish();
        assert_eq!(waiting.try_get().unwrap().unwrap(), None);

        let queue = LimitedAsyncQueue::new(4);
        queue.put(1u32).unwrap();
        queue.finish();
        assert_eq!(queue.put(2), Err(QueueError::Violation(ContractViolation::QueueFinished("put"))));
        assert_eq!(queue.take().try_get().unwrap().unwrap(), Some(1));
        assert_eq!(queue.take().try_get().unwrap().unwrap(), None);
    }

    #[test]
    fn feeds_a_consumer_sequence() {
        let queue = LimitedAsyncQueue::new(8);
        let collected = queue.clone().map(|v: u32| v * 2).collect_vec();
        for v in 1..=3 {
            queue.put(v).unwrap();
        }
        assert!(!collected.is_done());
        queue.finish();
        assert_eq!(collected.try_get().unwrap().unwrap(), vec![2, 4, 6]);
        assert!(queue.is_finished());
    }
}
