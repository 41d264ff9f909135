//! Gossip message validation.
//!
//! A [`GossipValidator`] produces a [`ValidationVerdict`] per message. Observability is layered around validators by
//! wrapping them in decorators ([`LoggingGossipValidator`], [`SubnetLoggingGossipValidator`]) that report to a
//! [`GossipLogger`] without ever changing the verdict. [`GossipPipeline`] assembles the usual stack for a topic.

mod batch_logger;
mod decorators;
mod logger;
mod pipeline;
mod validator;
mod verdict;

pub use batch_logger::{BatchedMessage, BatchingGossipLogger};
pub use decorators::{LoggingGossipValidator, SubnetLoggingGossipValidator};
pub use logger::{GossipLogger, LogGossipLogger, NoopGossipLogger, SubnetGossipLogger};
pub use pipeline::{GossipPipeline, GossipPipelineBuilder};
pub use validator::{
    fault_verdict, validator_fn, BlockingValidator, BlockingValidatorAdapter, DataValidator, DataValidatorAdapter,
    EpochRangeValidator, FaultBoundary, FnValidator, GossipValidator, NoopValidator, PanicGuard,
};
pub use verdict::{ValidationResultCode, ValidationVerdict};
