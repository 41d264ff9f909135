use crate::errors::panic_message;
use crate::gossip::verdict::ValidationVerdict;
use libbeacon::async_result::{AsyncRunner, TokioAsyncRunner};
use libbeacon::{AsyncError, AsyncResult};
use log::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Decides the disposition of one gossip message.
///
/// Implementations must never block the caller. Expected rejections resolve to [`ValidationVerdict::Reject`]; a failed
/// result means something unexpected went wrong and is turned into a rejection by [`FaultBoundary`].
pub trait GossipValidator<M>: Send + Sync {
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict>;
}

impl<M, V: GossipValidator<M> + ?Sized> GossipValidator<M> for Arc<V> {
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        (**self).validate(message)
    }
}

impl<M, V: GossipValidator<M> + ?Sized> GossipValidator<M> for Box<V> {
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        (**self).validate(message)
    }
}

/// A validator from a plain function or closure.
pub struct FnValidator<F>(F);

pub fn validator_fn<M, F>(f: F) -> FnValidator<F>
where
    F: Fn(&M) -> AsyncResult<ValidationVerdict> + Send + Sync,
{
    FnValidator(f)
}

impl<M, F> GossipValidator<M> for FnValidator<F>
where
    F: Fn(&M) -> AsyncResult<ValidationVerdict> + Send + Sync,
{
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        (self.0)(message)
    }
}

/// Accepts everything without looking at it. The default until a real validator is wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopValidator;

impl<M> GossipValidator<M> for NoopValidator {
    fn validate(&self, _: &M) -> AsyncResult<ValidationVerdict> {
        AsyncResult::completed(ValidationVerdict::Accept)
    }
}

/// A collaborator that either succeeds without a payload or fails with the reason the message is invalid.
pub trait DataValidator<M>: Send + Sync {
    fn validate_data(&self, message: &M) -> AsyncResult<()>;
}

/// Presents a [`DataValidator`] as a [`GossipValidator`]: success accepts, failure rejects with the failure's
/// description.
pub struct DataValidatorAdapter<D> {
    validator: D,
}

impl<D> DataValidatorAdapter<D> {
    pub fn new(validator: D) -> Self {
        Self { validator }
    }
}

impl<M, D: DataValidator<M>> GossipValidator<M> for DataValidatorAdapter<D> {
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        let validation = self.validator.validate_data(message);
        let verdict = validation.handle(|outcome| match outcome {
            Ok(()) => ValidationVerdict::Accept,
            Err(err) => ValidationVerdict::reject(err.to_string()),
        });
        verdict.propagate_cancel_to(&validation);
        verdict
    }
}

/// The rejection an unexpected validator fault turns into.
pub fn fault_verdict(error: &AsyncError) -> ValidationVerdict {
    ValidationVerdict::reject(error.to_string())
}

/// Turns a panicking validator into a failed result, so layers wrapped around it still see an outcome.
pub struct PanicGuard<V> {
    validator: V,
}

impl<V> PanicGuard<V> {
    pub fn new(validator: V) -> Self {
        Self { validator }
    }
}

impl<M, V: GossipValidator<M>> GossipValidator<M> for PanicGuard<V> {
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        catch_unwind(AssertUnwindSafe(|| self.validator.validate(message))).unwrap_or_else(|payload| {
            let reason = panic_message(&*payload);
            warn!("Validator panicked: {reason}");
            AsyncResult::failed(AsyncError::msg(format!("Validator panicked: {reason}")))
        })
    }
}

/// The outermost layer of every validation pipeline: failed results and panics become rejections, so every message
/// gets a disposition.
pub struct FaultBoundary<V> {
    validator: PanicGuard<V>,
}

impl<V> FaultBoundary<V> {
    pub fn new(validator: V) -> Self {
        Self { validator: PanicGuard::new(validator) }
    }
}

impl<M, V: GossipValidator<M>> GossipValidator<M> for FaultBoundary<V> {
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        let validation = self.validator.validate(message);
        let verdict = validation.handle(|outcome| match outcome {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!("Validator failed unexpectedly, rejecting message: {err}");
                fault_verdict(&err)
            }
        });
        verdict.propagate_cancel_to(&validation);
        verdict
    }
}

/// Synchronous validation logic that may block (e.g. signature or state checks).
pub trait BlockingValidator<M>: Send + Sync + 'static {
    fn validate_blocking(&self, message: &M) -> Result<ValidationVerdict, AsyncError>;
}

/// Runs a [`BlockingValidator`] on the runtime's blocking pool. The caller gets a pending result straight away.
pub struct BlockingValidatorAdapter<V> {
    validator: Arc<V>,
    runner: TokioAsyncRunner,
}

impl<V> BlockingValidatorAdapter<V> {
    pub fn new(validator: V, runner: TokioAsyncRunner) -> Self {
        Self { validator: Arc::new(validator), runner }
    }
}

impl<M, V> GossipValidator<M> for BlockingValidatorAdapter<V>
where
    M: Clone + Send + 'static,
    V: BlockingValidator<M>,
{
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        let validator = Arc::clone(&self.validator);
        let message = message.clone();
        AsyncResult::run_on_executor(&self.runner, move || validator.validate_blocking(&message))
    }
}

/// Accepts operations whose epoch lies in `[start_epoch, end_epoch]` and ignores the rest.
pub struct EpochRangeValidator<F> {
    start_epoch: u64,
    end_epoch: u64,
    epoch_of: F,
}

impl<F> EpochRangeValidator<F> {
    pub fn new(start_epoch: u64, end_epoch: u64, epoch_of: F) -> Self {
        Self { start_epoch, end_epoch, epoch_of }
    }

    pub fn is_valid<M>(&self, message: &M) -> bool
    where
        F: Fn(&M) -> u64,
    {
        let epoch = (self.epoch_of)(message);
        epoch >= self.start_epoch && epoch <= self.end_epoch
    }
}

impl<M, F> GossipValidator<M> for EpochRangeValidator<F>
where
    F: Fn(&M) -> u64 + Send + Sync,
{
    fn validate(&self, message: &M) -> AsyncResult<ValidationVerdict> {
        let verdict = if self.is_valid(message) {
            ValidationVerdict::Accept
        } else {
            trace!("Ignoring operation outside of epochs {}..={}", self.start_epoch, self.end_epoch);
            ValidationVerdict::Ignore
        };
        AsyncResult::completed(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("KZG proof does not verify")]
    struct InvalidProof;

    struct ProofChecker;

    impl DataValidator<Vec<u8>> for ProofChecker {
        fn validate_data(&self, message: &Vec<u8>) -> AsyncResult<()> {
            if message.is_empty() {
                AsyncResult::failed(AsyncError::new(InvalidProof))
            } else {
                AsyncResult::completed(())
            }
        }
    }

    #[test]
    fn noop_validator_accepts_everything() {
        let verdict = NoopValidator.validate(&"anything").join().unwrap();
        assert_eq!(verdict, ValidationVerdict::Accept);
    }

    #[test]
    fn data_validator_failures_become_rejections() {
        let adapter = DataValidatorAdapter::new(ProofChecker);
        assert_eq!(adapter.validate(&vec![1u8]).join().unwrap(), ValidationVerdict::Accept);
        let verdict = adapter.validate(&vec![]).join().unwrap();
        assert_eq!(verdict, ValidationVerdict::reject("KZG proof does not verify"));
    }

    #[test]
    fn fault_boundary_turns_faults_into_rejections() {
        env_logger::try_init().ok();
        let failing =
            FaultBoundary::new(validator_fn(|_: &u32| AsyncResult::failed(AsyncError::msg("state unavailable"))));
        assert_eq!(failing.validate(&1).join().unwrap(), ValidationVerdict::reject("state unavailable"));

        let panicking =
            FaultBoundary::new(validator_fn(|_: &u32| -> AsyncResult<ValidationVerdict> { panic!("oops") }));
        assert_eq!(panicking.validate(&1).join().unwrap(), ValidationVerdict::reject("Validator panicked: oops"));

        let ignoring = FaultBoundary::new(validator_fn(|_: &u32| AsyncResult::completed(ValidationVerdict::Ignore)));
        assert_eq!(ignoring.validate(&1).join().unwrap(), ValidationVerdict::Ignore);
    }

    #[test]
    fn panic_guard_fails_instead_of_unwinding() {
        let guarded = PanicGuard::new(validator_fn(|_: &u32| -> AsyncResult<ValidationVerdict> { panic!("oops") }));
        let err = guarded.validate(&1).join().unwrap_err();
        assert_eq!(err.to_string(), "Validator panicked: oops");
    }

    #[test]
    fn epoch_range_validator_ignores_out_of_range_operations() {
        let validator = EpochRangeValidator::new(10, 12, |epoch: &u64| *epoch);
        assert_eq!(validator.validate(&9).join().unwrap(), ValidationVerdict::Ignore);
        assert_eq!(validator.validate(&10).join().unwrap(), ValidationVerdict::Accept);
        assert_eq!(validator.validate(&12).join().unwrap(), ValidationVerdict::Accept);
        assert_eq!(validator.validate(&13).join().unwrap(), ValidationVerdict::Ignore);
    }

    struct SlowSignatureCheck;

    impl BlockingValidator<String> for SlowSignatureCheck {
        fn validate_blocking(&self, message: &String) -> Result<ValidationVerdict, AsyncError> {
            std::thread::sleep(std::time::Duration::from_millis(10));
            if message.starts_with("signed:") {
                Ok(ValidationVerdict::Accept)
            } else {
                Ok(ValidationVerdict::reject("bad signature"))
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_validators_run_off_the_async_workers() {
        let runner = TokioAsyncRunner::current().unwrap();
        let adapter = BlockingValidatorAdapter::new(SlowSignatureCheck, runner);
        let good = adapter.validate(&"signed:block".to_string());
        let bad = adapter.validate(&"block".to_string());
        assert_eq!(good.await.unwrap(), ValidationVerdict::Accept);
        assert_eq!(bad.await.unwrap(), ValidationVerdict::reject("bad signature"));
    }
}
