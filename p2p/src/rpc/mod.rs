//! The responding half of request/response exchanges.
//!
//! A handler answers a request through a [`ResponseCallback`]: zero or more items, then exactly one terminal event.
//! [`LoggingResponseCallback`] reports each exchange to a [`ResponseLogger`], and [`respond_with_sequence`] drives a
//! callback from an [`AsyncSequence`](libbeacon::AsyncSequence) with back-pressure from the transport.

mod callback;
mod logging;
mod responder;
mod response_logger;

pub use callback::{response_channel, ChannelResponseCallback, ResponseCallback, ResponseEvent, ResponseStateMachine};
pub use logging::{
    LoggingPeerId, LoggingResponseCallback, NoopReqRespMethodLogger, NoopResponseLogger, ReqRespMethodLogger,
    ResponseLogger,
};
pub use responder::respond_with_sequence;
pub use response_logger::{Direction, ResponseLogSettings, SummarizingMethodLogger, SummarizingResponseLogger};
