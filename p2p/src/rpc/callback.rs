use crate::errors::RpcException;
use futures::channel::mpsc;
use libbeacon::{AsyncError, AsyncResult, ContractViolation};
use log::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// The responding side of one RPC exchange.
///
/// An exchange is OPEN until exactly one terminal operation (`respond_and_complete_successfully`,
/// `complete_successfully`, `complete_with_error_response` or `complete_with_unexpected_error`) moves it to COMPLETED.
/// Every operation on a COMPLETED exchange fails with [`ContractViolation::AlreadyCompleted`].
pub trait ResponseCallback<T>: Send + Sync {
    /// Send one response item. The returned result resolves once the transport has accepted the item; producers
    /// should wait for it before sending the next one.
    fn respond(&self, item: T) -> Result<AsyncResult<()>, ContractViolation>;

    fn respond_and_complete_successfully(&self, item: T) -> Result<(), ContractViolation>;

    fn complete_successfully(&self) -> Result<(), ContractViolation>;

    /// Finish with an expected protocol error. The peer receives the error code and message.
    fn complete_with_error_response(&self, error: RpcException) -> Result<(), ContractViolation>;

    /// Finish because of an internal fault. The peer only learns that the server failed.
    fn complete_with_unexpected_error(&self, error: AsyncError) -> Result<(), ContractViolation>;
}

/// The OPEN → COMPLETED transition of an exchange.
#[derive(Debug, Default)]
pub struct ResponseStateMachine {
    completed: AtomicBool,
}

impl ResponseStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Check that a non-terminal operation is still allowed.
    pub fn ensure_open(&self, operation: &'static str) -> Result<(), ContractViolation> {
        if self.is_completed() {
            return Err(Self::violation(operation));
        }
        Ok(())
    }

    /// Claim the terminal transition. Only the first caller succeeds.
    pub fn complete(&self, operation: &'static str) -> Result<(), ContractViolation> {
        self.completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Self::violation(operation))
    }

    fn violation(operation: &'static str) -> ContractViolation {
        let violation = ContractViolation::AlreadyCompleted(operation);
        error!("RPC contract violation: {violation}");
        violation
    }
}

/// What the transport sees of an exchange.
#[derive(Debug)]
pub enum ResponseEvent<T> {
    /// An item to send. Resolve `accepted` with `try_complete` once it has been written, or fail it if it could not
    /// be. The producer may cancel `accepted` first when the exchange is abandoned.
    Item { item: T, accepted: AsyncResult<()> },
    Completed,
    ErrorResponse(RpcException),
    UnexpectedError(AsyncError),
}

/// A [`ResponseCallback`] that hands every event to the transport over a channel.
///
/// The channel is closed right after the terminal event, so the transport sees exactly one terminal event followed by
/// the end of the stream. Deliveries are serialized so an item can never overtake the terminal event.
pub struct ChannelResponseCallback<T> {
    state: ResponseStateMachine,
    delivery: Mutex<()>,
    events: mpsc::UnboundedSender<ResponseEvent<T>>,
}

pub fn response_channel<T>() -> (ChannelResponseCallback<T>, mpsc::UnboundedReceiver<ResponseEvent<T>>) {
    let (events, receiver) = mpsc::unbounded();
    (ChannelResponseCallback { state: ResponseStateMachine::new(), delivery: Mutex::new(()), events }, receiver)
}

impl<T> ChannelResponseCallback<T> {
    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    fn send(&self, event: ResponseEvent<T>) -> Result<(), ResponseEvent<T>> {
        self.events.unbounded_send(event).map_err(|e| e.into_inner())
    }

    fn finish(&self, operation: &'static str, event: ResponseEvent<T>) -> Result<(), ContractViolation> {
        let _delivery = self.delivery.lock();
        self.state.complete(operation)?;
        if self.send(event).is_err() {
            debug!("The transport went away before `{operation}` could be delivered");
        }
        self.events.close_channel();
        Ok(())
    }
}

impl<T: Send> ResponseCallback<T> for ChannelResponseCallback<T> {
    fn respond(&self, item: T) -> Result<AsyncResult<()>, ContractViolation> {
        let _delivery = self.delivery.lock();
        self.state.ensure_open("respond")?;
        let accepted = AsyncResult::new();
        if self.send(ResponseEvent::Item { item, accepted: accepted.clone() }).is_err() {
            if self.state.is_completed() {
                return Err(ContractViolation::AlreadyCompleted("respond"));
            }
            return Ok(AsyncResult::failed(AsyncError::msg("The response stream is closed")));
        }
        Ok(accepted)
    }

    fn respond_and_complete_successfully(&self, item: T) -> Result<(), ContractViolation> {
        let _delivery = self.delivery.lock();
        self.state.complete("respond_and_complete_successfully")?;
        if self.send(ResponseEvent::Item { item, accepted: AsyncResult::new() }).is_ok() {
            let _ = self.send(ResponseEvent::Completed);
        }
        self.events.close_channel();
        Ok(())
    }

    fn complete_successfully(&self) -> Result<(), ContractViolation> {
        self.finish("complete_successfully", ResponseEvent::Completed)
    }

    fn complete_with_error_response(&self, error: RpcException) -> Result<(), ContractViolation> {
        self.finish("complete_with_error_response", ResponseEvent::ErrorResponse(error))
    }

    fn complete_with_unexpected_error(&self, error: AsyncError) -> Result<(), ContractViolation> {
        self.finish("complete_with_unexpected_error", ResponseEvent::UnexpectedError(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn only_the_first_terminal_call_wins() {
        let (callback, _events) = response_channel::<u32>();
        assert!(callback.complete_successfully().is_ok());
        assert_eq!(
            callback.complete_with_error_response(RpcException::invalid_request("late")),
            Err(ContractViolation::AlreadyCompleted("complete_with_error_response"))
        );
        assert_eq!(
            callback.complete_with_unexpected_error(AsyncError::msg("late")),
            Err(ContractViolation::AlreadyCompleted("complete_with_unexpected_error"))
        );
        assert_eq!(callback.complete_successfully(), Err(ContractViolation::AlreadyCompleted("complete_successfully")));
        assert_eq!(callback.respond(1).unwrap_err(), ContractViolation::AlreadyCompleted("respond"));
    }

    #[test]
    fn transport_sees_items_then_one_terminal_event() {
        let (callback, events) = response_channel::<u32>();
        let first = callback.respond(1).unwrap();
        callback.respond_and_complete_successfully(2).unwrap();
        let events: Vec<_> = futures::executor::block_on(events.collect());
        assert_eq!(events.len(), 3);
        match &events[0] {
            ResponseEvent::Item { item, accepted } => {
                assert_eq!(*item, 1);
                accepted.complete(()).unwrap();
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(events[1], ResponseEvent::Item { item: 2, .. }));
        assert!(matches!(events[2], ResponseEvent::Completed));
        assert!(first.is_done());
    }

    #[test]
    fn respond_fails_softly_when_the_transport_is_gone() {
        let (callback, events) = response_channel::<u32>();
        drop(events);
        let accepted = callback.respond(1).unwrap();
        assert!(accepted.try_get().unwrap().is_err());
        assert!(callback.complete_with_error_response(RpcException::resource_unavailable("gone")).is_ok());
    }

    #[test]
    fn concurrent_terminal_calls_complete_exactly_once() {
        let (callback, events) = response_channel::<u32>();
        let callback = std::sync::Arc::new(callback);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let callback = std::sync::Arc::clone(&callback);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        callback.complete_successfully().is_ok()
                    } else {
                        callback.complete_with_error_response(RpcException::server_error("busy")).is_ok()
                    }
                })
            })
            .collect();
        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
        assert_eq!(winners, 1);
        let events: Vec<_> = futures::executor::block_on(events.collect());
        assert_eq!(events.len(), 1);
    }
}
