use crate::gossip::logger::{guard_hook, GossipLogger, SubnetGossipLogger};
use crate::gossip::validator::{fault_verdict, GossipValidator};
use crate::gossip::verdict::ValidationVerdict;
use libbeacon::{AsyncResult, Outcome};
use log::*;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

/// Reports every validation to a [`GossipLogger`] once the wrapped validator has resolved.
///
/// The wrapped validator's outcome is passed through untouched. A fault is reported to the logger as the rejection it
/// will eventually become at the [`FaultBoundary`](crate::gossip::validator::FaultBoundary), while the fault itself
/// continues to flow outwards.
pub struct LoggingGossipValidator<V, L: ?Sized> {
    validator: V,
    logger: Arc<L>,
}

impl<V, L: ?Sized> LoggingGossipValidator<V, L> {
    pub fn new(validator: V, logger: Arc<L>) -> Self {
        Self { validator, logger }
    }

    pub fn logger(&self) -> &Arc<L> {
        &self.logger
    }

    /// Report a message this node originated.
    pub fn publish<M>(&self, message: &M, outcome: &Outcome<()>)
    where
        L: GossipLogger<M>,
    {
        guard_hook("on_publish", || self.logger.on_publish(message, outcome));
    }
}

impl<M, V, L> GossipValidator<M> for LoggingGossipValidator<V, L>
where
    M: Clone + Send + Sync + 'static,
    V: GossipValidator<M>,
    L: GossipLogger<M> + ?Sized + 'static,
{
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        let validation = self.validator.validate(message);
        let logger = Arc::clone(&self.logger);
        let message = message.clone();
        let observed = validation.transform(move |outcome| {
            let reported = match &outcome {
                Ok(verdict) => verdict.clone(),
                Err(err) => fault_verdict(err),
            };
            guard_hook("on_receive", || logger.on_receive(&message, &reported));
            outcome
        });
        observed.propagate_cancel_to(&validation);
        observed
    }
}

/// A [`LoggingGossipValidator`] for subnet topics that also keeps track of subnet subscriptions.
///
/// The logger only hears about real changes: subscribing to a subnet twice reports once.
pub struct SubnetLoggingGossipValidator<M, V, L: ?Sized> {
    inner: LoggingGossipValidator<V, L>,
    subscriptions: Mutex<BTreeSet<u64>>,
    _message: PhantomData<fn(M)>,
}

impl<M, V, L> SubnetLoggingGossipValidator<M, V, L>
where
    L: SubnetGossipLogger<M> + ?Sized,
{
    pub fn new(validator: V, logger: Arc<L>) -> Self {
        let inner = LoggingGossipValidator::new(validator, logger);
        Self { inner, subscriptions: Mutex::new(BTreeSet::new()), _message: PhantomData }
    }

    /// Returns `true` if the subnet was not subscribed before.
    pub fn subscribe(&self, subnet_id: u64) -> bool {
        let added = self.subscriptions.lock().insert(subnet_id);
        if added {
            let logger = self.inner.logger();
            guard_hook("on_subnet_subscribe", || logger.on_subnet_subscribe(subnet_id));
        } else {
            trace!("Already subscribed to subnet {subnet_id}");
        }
        added
    }

    /// Returns `true` if the subnet was subscribed before.
    pub fn unsubscribe(&self, subnet_id: u64) -> bool {
        let removed = self.subscriptions.lock().remove(&subnet_id);
        if removed {
            let logger = self.inner.logger();
            guard_hook("on_subnet_unsubscribe", || logger.on_subnet_unsubscribe(subnet_id));
        }
        removed
    }

    pub fn subscribed_subnets(&self) -> Vec<u64> {
        self.subscriptions.lock().iter().copied().collect()
    }

    pub fn publish(&self, message: &M, outcome: &Outcome<()>) {
        self.inner.publish(message, outcome);
    }
}

impl<M, V, L> GossipValidator<M> for SubnetLoggingGossipValidator<M, V, L>
where
    M: Clone + Send + Sync + 'static,
    V: GossipValidator<M>,
    L: SubnetGossipLogger<M> + ?Sized + 'static,
{
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        self.inner.validate(message)
    }
}
