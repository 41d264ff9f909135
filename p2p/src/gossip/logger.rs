use crate::errors::panic_message;
use crate::gossip::verdict::ValidationVerdict;
use libbeacon::Outcome;
use log::*;
use std::fmt::Debug;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Observability hooks for one gossip topic.
///
/// Hooks observe, they never influence the verdict. A hook that panics is caught and logged.
pub trait GossipLogger<M>: Send + Sync {
    /// Called once per received message, after its validation resolved.
    fn on_receive(&self, message: &M, verdict: &ValidationVerdict);

    /// Called when this node publishes a message on the topic.
    fn on_publish(&self, message: &M, outcome: &Outcome<()>);
}

/// A [`GossipLogger`] for topics that are split into numbered subnets.
pub trait SubnetGossipLogger<M>: GossipLogger<M> {
    fn on_subnet_subscribe(&self, subnet_id: u64);

    fn on_subnet_unsubscribe(&self, subnet_id: u64);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopGossipLogger;

impl<M> GossipLogger<M> for NoopGossipLogger {
    fn on_receive(&self, _: &M, _: &ValidationVerdict) {}

    fn on_publish(&self, _: &M, _: &Outcome<()>) {}
}

impl<M> SubnetGossipLogger<M> for NoopGossipLogger {
    fn on_subnet_subscribe(&self, _: u64) {}

    fn on_subnet_unsubscribe(&self, _: u64) {}
}

/// Writes one log line per event.
#[derive(Clone, Debug)]
pub struct LogGossipLogger {
    topic: String,
    level: Level,
    reject_level: Level,
}

impl LogGossipLogger {
    pub fn new(topic: impl Into<String>, level: Level, reject_level: Level) -> Self {
        Self { topic: topic.into(), level, reject_level }
    }
}

impl<M: Debug> GossipLogger<M> for LogGossipLogger {
    fn on_receive(&self, message: &M, verdict: &ValidationVerdict) {
        let level = if verdict.is_reject() { self.reject_level } else { self.level };
        log!(level, "Received {} message {message:?}: {verdict}", self.topic);
    }

    fn on_publish(&self, message: &M, outcome: &Outcome<()>) {
        match outcome {
            Ok(()) => log!(self.level, "Published {} message {message:?}", self.topic),
            Err(err) => warn!("Failed to publish {} message {message:?}: {err}", self.topic),
        }
    }
}

impl<M: Debug> SubnetGossipLogger<M> for LogGossipLogger {
    fn on_subnet_subscribe(&self, subnet_id: u64) {
        log!(self.level, "Subscribed to {} subnet {subnet_id}", self.topic);
    }

    fn on_subnet_unsubscribe(&self, subnet_id: u64) {
        log!(self.level, "Unsubscribed from {} subnet {subnet_id}", self.topic);
    }
}

/// Run a logging hook, containing any panic it raises.
pub(crate) fn guard_hook<F: FnOnce()>(hook: &str, f: F) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        error!("Gossip logging hook `{hook}` panicked: {}", panic_message(&*payload));
    }
}
