use crate::errors::RpcException;
use crate::rpc::callback::ResponseCallback;
use libbeacon::{AsyncError, AsyncResult, AsyncSequence, Outcome, SequenceExt};
use log::*;
use std::sync::Arc;

/// Stream the elements of `sequence` to `callback`, at most `max_items` of them, then complete the exchange.
///
/// The next element is only pulled once the transport has accepted the previous one, so a slow peer slows the producer
/// down instead of growing a buffer. The exchange ends with
/// * `complete_successfully` when the sequence (or the item budget) is exhausted,
/// * `complete_with_error_response` when the sequence fails with an [`RpcException`],
/// * `complete_with_unexpected_error` on any other failure, including cancellation of the returned result.
///
/// The returned result holds the number of items the transport accepted.
pub fn respond_with_sequence<T, S, C>(sequence: S, callback: Arc<C>, max_items: Option<u64>) -> AsyncResult<u64>
where
    T: Clone + Send + 'static,
    S: AsyncSequence<T> + 'static,
    C: ResponseCallback<T> + ?Sized + 'static,
{
    let responder = Arc::clone(&callback);
    let sent = sequence
        .limit(max_items.unwrap_or(u64::MAX))
        .map_async(move |item| match responder.respond(item) {
            Ok(accepted) => accepted,
            Err(violation) => AsyncResult::failed(AsyncError::new(violation)),
        })
        .fold(0u64, |count, ()| *count += 1);
    sent.when_complete(move |outcome: &Outcome<u64>| complete_exchange::<T, C>(&*callback, outcome));
    sent
}

fn complete_exchange<T, C: ResponseCallback<T> + ?Sized>(callback: &C, outcome: &Outcome<u64>) {
    let completed = match outcome {
        Ok(count) => {
            trace!("Sequence exhausted after {count} item(s)");
            callback.complete_successfully()
        }
        Err(err) => match err.downcast_ref::<RpcException>() {
            Some(exception) => callback.complete_with_error_response(exception.clone()),
            None => {
                debug!("Responding to a request failed: {err}");
                callback.complete_with_unexpected_error(err.clone())
            }
        },
    };
    if let Err(violation) = completed {
        debug!("Could not complete the exchange: {violation}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::callback::ResponseStateMachine;
    use libbeacon::async_sequence::{from_results, of, LimitedAsyncQueue};
    use libbeacon::ContractViolation;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Item(u32),
        Completed,
        ErrorResponse(RpcException),
        Unexpected(String),
    }

    /// Records events and hands the acknowledgements back to the test.
    #[derive(Default)]
    struct Recorder {
        state: ResponseStateMachine,
        events: Mutex<Vec<Event>>,
        acks: Mutex<Vec<AsyncResult<()>>>,
        auto_ack: bool,
    }

    impl Recorder {
        fn auto() -> Arc<Self> {
            Arc::new(Self { auto_ack: true, ..Default::default() })
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }

        fn finish(&self, operation: &'static str, event: Event) -> Result<(), ContractViolation> {
            self.state.complete(operation)?;
            self.events.lock().push(event);
            Ok(())
        }
    }

    impl ResponseCallback<u32> for Recorder {
        fn respond(&self, item: u32) -> Result<AsyncResult<()>, ContractViolation> {
            self.state.ensure_open("respond")?;
            self.events.lock().push(Event::Item(item));
            if self.auto_ack {
                return Ok(AsyncResult::completed(()));
            }
            let ack = AsyncResult::new();
            self.acks.lock().push(ack.clone());
            Ok(ack)
        }

        fn respond_and_complete_successfully(&self, item: u32) -> Result<(), ContractViolation> {
            self.finish("respond_and_complete_successfully", Event::Item(item))?;
            self.events.lock().push(Event::Completed);
            Ok(())
        }

        fn complete_successfully(&self) -> Result<(), ContractViolation> {
            self.finish("complete_successfully", Event::Completed)
        }

        fn complete_with_error_response(&self, error: RpcException) -> Result<(), ContractViolation> {
            self.finish("complete_with_error_response", Event::ErrorResponse(error))
        }

        fn complete_with_unexpected_error(&self, error: AsyncError) -> Result<(), ContractViolation> {
            self.finish("complete_with_unexpected_error", Event::Unexpected(error.to_string()))
        }
    }

    #[test]
    fn streams_every_item_then_completes() {
        let recorder = Recorder::auto();
        let sent = respond_with_sequence(of(vec![1u32, 2, 3]), Arc::clone(&recorder), None);
        assert_eq!(sent.try_get().unwrap().unwrap(), 3);
        assert_eq!(recorder.events(), vec![Event::Item(1), Event::Item(2), Event::Item(3), Event::Completed]);
    }

    #[test]
    fn stops_at_the_item_budget() {
        let recorder = Recorder::auto();
        let sent = respond_with_sequence(of((0u32..100).collect()), Arc::clone(&recorder), Some(2));
        assert_eq!(sent.try_get().unwrap().unwrap(), 2);
        assert_eq!(recorder.events(), vec![Event::Item(0), Event::Item(1), Event::Completed]);
    }

    #[test]
    fn a_zero_budget_takes_nothing_from_the_producer() {
        let recorder = Recorder::auto();
        let queue = LimitedAsyncQueue::new(4);
        queue.put(1u32).unwrap();
        let sent = respond_with_sequence(queue.clone(), Arc::clone(&recorder), Some(0));
        assert_eq!(sent.try_get().unwrap().unwrap(), 0);
        assert_eq!(recorder.events(), vec![Event::Completed]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn waits_for_the_transport_before_pulling_again() {
        let recorder = Arc::new(Recorder::default());
        let queue = LimitedAsyncQueue::new(8);
        queue.put(1u32).unwrap();
        queue.put(2).unwrap();
        let sent = respond_with_sequence(queue.clone(), Arc::clone(&recorder), None);
        assert_eq!(recorder.events(), vec![Event::Item(1)]);
        assert_eq!(queue.len(), 1);

        let first = recorder.acks.lock().remove(0);
        first.complete(()).unwrap();
        assert_eq!(recorder.events(), vec![Event::Item(1), Event::Item(2)]);
        let second = recorder.acks.lock().remove(0);
        second.complete(()).unwrap();
        queue.finish();
        assert_eq!(sent.try_get().unwrap().unwrap(), 2);
        assert_eq!(recorder.events().last(), Some(&Event::Completed));
    }

    #[test]
    fn rpc_exceptions_become_error_responses() {
        let recorder = Recorder::auto();
        let failing = AsyncResult::failed(AsyncError::new(RpcException::resource_unavailable("pruned")));
        let sequence = from_results(vec![AsyncResult::completed(5u32), failing]);
        let sent = respond_with_sequence(sequence, Arc::clone(&recorder), None);
        assert!(sent.try_get().unwrap().is_err());
        assert_eq!(
            recorder.events(),
            vec![Event::Item(5), Event::ErrorResponse(RpcException::resource_unavailable("pruned"))]
        );
    }

    #[test]
    fn other_failures_are_unexpected() {
        let recorder = Recorder::auto();
        let sequence = from_results(vec![AsyncResult::<u32>::failed(AsyncError::msg("database closed"))]);
        respond_with_sequence(sequence, Arc::clone(&recorder), None);
        assert_eq!(recorder.events(), vec![Event::Unexpected("database closed".to_string())]);
    }

    #[test]
    fn cancelling_ends_the_exchange_with_an_unexpected_error() {
        let recorder = Arc::new(Recorder::default());
        let queue = LimitedAsyncQueue::<u32>::new(8);
        let sent = respond_with_sequence(queue.clone(), Arc::clone(&recorder), None);
        assert!(sent.cancel());
        assert_eq!(recorder.events(), vec![Event::Unexpected(AsyncError::Cancelled.to_string())]);
        // the abandoned pull no longer receives items
        queue.put(1).unwrap();
        assert_eq!(queue.len(), 1);
    }
}
