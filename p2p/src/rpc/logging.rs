use crate::errors::{RpcException, RpcFailure};
use crate::rpc::callback::ResponseCallback;
use libbeacon::{AsyncError, AsyncResult, ContractViolation};
use libp2p::PeerId;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Observes a single RPC exchange.
pub trait ResponseLogger<T>: Send + Sync {
    fn on_next_item(&self, item: &T);

    fn on_complete(&self);

    fn on_error(&self, failure: &RpcFailure);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopResponseLogger;

impl<T> ResponseLogger<T> for NoopResponseLogger {
    fn on_next_item(&self, _: &T) {}

    fn on_complete(&self) {}

    fn on_error(&self, _: &RpcFailure) {}
}

/// Wraps a [`ResponseCallback`] and reports every operation to a [`ResponseLogger`] just before delegating it.
///
/// The logger sees exactly one terminal event per exchange. Operations attempted after completion are not logged;
/// they are still passed to the wrapped callback, which rejects them.
pub struct LoggingResponseCallback<C, L: ?Sized> {
    callback: C,
    logger: Arc<L>,
    terminal_logged: AtomicBool,
}

impl<C, L: ?Sized> LoggingResponseCallback<C, L> {
    pub fn new(callback: C, logger: Arc<L>) -> Self {
        Self { callback, logger, terminal_logged: AtomicBool::new(false) }
    }

    fn claim_terminal(&self) -> bool {
        self.terminal_logged.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    fn is_terminal_logged(&self) -> bool {
        self.terminal_logged.load(Ordering::Acquire)
    }
}

impl<T, C, L> ResponseCallback<T> for LoggingResponseCallback<C, L>
where
    C: ResponseCallback<T>,
    L: ResponseLogger<T> + ?Sized,
{
    fn respond(&self, item: T) -> Result<AsyncResult<()>, ContractViolation> {
        if !self.is_terminal_logged() {
            self.logger.on_next_item(&item);
        }
        self.callback.respond(item)
    }

    fn respond_and_complete_successfully(&self, item: T) -> Result<(), ContractViolation> {
        if self.claim_terminal() {
            self.logger.on_next_item(&item);
            self.logger.on_complete();
        }
        self.callback.respond_and_complete_successfully(item)
    }

    fn complete_successfully(&self) -> Result<(), ContractViolation> {
        if self.claim_terminal() {
            self.logger.on_complete();
        }
        self.callback.complete_successfully()
    }

    fn complete_with_error_response(&self, error: RpcException) -> Result<(), ContractViolation> {
        if self.claim_terminal() {
            self.logger.on_error(&RpcFailure::ErrorResponse(error.clone()));
        }
        self.callback.complete_with_error_response(error)
    }

    fn complete_with_unexpected_error(&self, error: AsyncError) -> Result<(), ContractViolation> {
        if self.claim_terminal() {
            self.logger.on_error(&RpcFailure::Unexpected(error.clone()));
        }
        self.callback.complete_with_unexpected_error(error)
    }
}

/// A peer as it appears in log lines: its peer id and, when known, an abbreviated discovery node id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LoggingPeerId {
    peer_id: PeerId,
    node_id: Option<Vec<u8>>,
}

impl LoggingPeerId {
    pub fn new(peer_id: PeerId) -> Self {
        Self { peer_id, node_id: None }
    }

    pub fn with_node_id(peer_id: PeerId, node_id: Vec<u8>) -> Self {
        Self { peer_id, node_id: Some(node_id) }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }
}

impl From<PeerId> for LoggingPeerId {
    fn from(peer_id: PeerId) -> Self {
        Self::new(peer_id)
    }
}

impl Display for LoggingPeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.node_id {
            Some(node_id) if node_id.len() > 8 => {
                let head = hex::encode(&node_id[..4]);
                let tail = hex::encode(&node_id[node_id.len() - 4..]);
                write!(f, "{} (0x{head}...{tail})", self.peer_id)
            }
            Some(node_id) => write!(f, "{} (0x{})", self.peer_id, hex::encode(node_id)),
            None => write!(f, "{}", self.peer_id),
        }
    }
}

/// Creates a [`ResponseLogger`] for every exchange of one RPC method.
pub trait ReqRespMethodLogger<Req, T>: Send + Sync {
    /// A peer asked this node for something.
    fn on_inbound_request(&self, peer: &LoggingPeerId, request: &Req) -> Arc<dyn ResponseLogger<T>>;

    /// This node asked a peer for something.
    fn on_outbound_request(&self, peer: &LoggingPeerId, request: &Req) -> Arc<dyn ResponseLogger<T>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReqRespMethodLogger;

impl<Req, T> ReqRespMethodLogger<Req, T> for NoopReqRespMethodLogger {
    fn on_inbound_request(&self, _: &LoggingPeerId, _: &Req) -> Arc<dyn ResponseLogger<T>> {
        Arc::new(NoopResponseLogger)
    }

    fn on_outbound_request(&self, _: &LoggingPeerId, _: &Req) -> Arc<dyn ResponseLogger<T>> {
        Arc::new(NoopResponseLogger)
    }
}
