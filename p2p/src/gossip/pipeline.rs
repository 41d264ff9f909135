use crate::gossip::decorators::LoggingGossipValidator;
use crate::gossip::logger::{guard_hook, GossipLogger};
use crate::gossip::validator::{FaultBoundary, GossipValidator, NoopValidator, PanicGuard};
use crate::gossip::verdict::ValidationVerdict;
use libbeacon::{AsyncResult, Outcome};
use std::sync::Arc;

type SharedValidator<M> = Arc<dyn GossipValidator<M>>;
type SharedLogger<M> = Arc<dyn GossipLogger<M>>;

/// Validation for one gossip topic: a validator, wrapped by loggers, behind a [`FaultBoundary`].
///
/// Loggers are nested in the order they were added, so the first logger is the innermost one. When a message is
/// received the validator resolves first, then the loggers hear about it from the innermost to the outermost. The
/// validator itself sits inside a [`PanicGuard`], so loggers also hear about messages whose validation panicked.
pub struct GossipPipeline<M> {
    validator: FaultBoundary<SharedValidator<M>>,
    loggers: Vec<SharedLogger<M>>,
}

impl<M: Clone + Send + Sync + 'static> GossipPipeline<M> {
    pub fn builder() -> GossipPipelineBuilder<M> {
        GossipPipelineBuilder { validator: None, loggers: Vec::new() }
    }

    /// Validate a received message. The returned result always succeeds.
    pub fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        self.validator.validate(message)
    }

    /// Report a message this node published to every logger, innermost first.
    pub fn publish(&self, message: &M, outcome: &Outcome<()>) {
        for logger in &self.loggers {
            guard_hook("on_publish", || logger.on_publish(message, outcome));
        }
    }
}

pub struct GossipPipelineBuilder<M> {
    validator: Option<SharedValidator<M>>,
    loggers: Vec<SharedLogger<M>>,
}

impl<M: Clone + Send + Sync + 'static> GossipPipelineBuilder<M> {
    pub fn validator<V: GossipValidator<M> + 'static>(mut self, validator: V) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn logger(mut self, logger: SharedLogger<M>) -> Self {
        self.loggers.push(logger);
        self
    }

    /// Without an explicit validator, every message is accepted.
    pub fn build(self) -> GossipPipeline<M> {
        let raw: SharedValidator<M> = self.validator.unwrap_or_else(|| Arc::new(NoopValidator));
        let mut validator: SharedValidator<M> = Arc::new(PanicGuard::new(raw));
        for logger in &self.loggers {
            validator = Arc::new(LoggingGossipValidator::new(validator, Arc::clone(logger)));
        }
        GossipPipeline { validator: FaultBoundary::new(validator), loggers: self.loggers }
    }
}
