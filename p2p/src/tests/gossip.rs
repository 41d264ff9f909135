use crate::gossip::*;
use libbeacon::async_result::TokioAsyncRunner;
use libbeacon::{AsyncError, AsyncResult, Outcome};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
struct Attestation {
    slot: u64,
}

#[derive(Clone, Debug, PartialEq)]
enum Event {
    Received(&'static str, u64, ValidationVerdict),
    Published(&'static str, u64, bool),
    Subscribed(u64),
    Unsubscribed(u64),
}

/// Appends every event, tagged with its name, to a shared journal.
struct Recorder {
    name: &'static str,
    journal: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    fn new(name: &'static str, journal: &Arc<Mutex<Vec<Event>>>) -> Arc<Self> {
        Arc::new(Self { name, journal: Arc::clone(journal) })
    }
}

impl GossipLogger<Attestation> for Recorder {
    fn on_receive(&self, message: &Attestation, verdict: &ValidationVerdict) {
        self.journal.lock().push(Event::Received(self.name, message.slot, verdict.clone()));
    }

    fn on_publish(&self, message: &Attestation, outcome: &Outcome<()>) {
        self.journal.lock().push(Event::Published(self.name, message.slot, outcome.is_ok()));
    }
}

impl SubnetGossipLogger<Attestation> for Recorder {
    fn on_subnet_subscribe(&self, subnet_id: u64) {
        self.journal.lock().push(Event::Subscribed(subnet_id));
    }

    fn on_subnet_unsubscribe(&self, subnet_id: u64) {
        self.journal.lock().push(Event::Unsubscribed(subnet_id));
    }
}

struct PanickingLogger;

impl GossipLogger<Attestation> for PanickingLogger {
    fn on_receive(&self, _: &Attestation, _: &ValidationVerdict) {
        panic!("logger is broken");
    }

    fn on_publish(&self, _: &Attestation, _: &Outcome<()>) {
        panic!("logger is broken");
    }
}

fn attestation(slot: u64) -> Attestation {
    Attestation { slot }
}

fn journal() -> Arc<Mutex<Vec<Event>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn logs_a_rejection_then_an_acceptance() {
    env_logger::try_init().ok();
    let events = journal();
    let validator = validator_fn(|m: &Attestation| {
        let verdict = if m.slot == 1 { ValidationVerdict::reject("bad signature") } else { ValidationVerdict::Accept };
        AsyncResult::completed(verdict)
    });
    let logging = LoggingGossipValidator::new(validator, Recorder::new("log", &events));

    assert_eq!(logging.validate(&attestation(1)).join().unwrap(), ValidationVerdict::reject("bad signature"));
    assert_eq!(logging.validate(&attestation(2)).join().unwrap(), ValidationVerdict::Accept);
    assert_eq!(
        *events.lock(),
        vec![
            Event::Received("log", 1, ValidationVerdict::reject("bad signature")),
            Event::Received("log", 2, ValidationVerdict::Accept),
        ]
    );
}

#[test]
fn each_message_is_reported_once_after_its_verdict_resolves() {
    let events = journal();
    let pending = AsyncResult::new();
    let inner = pending.clone();
    let validator = validator_fn(move |_: &Attestation| inner.clone());
    let logging = LoggingGossipValidator::new(validator, Recorder::new("log", &events));

    let verdict = logging.validate(&attestation(5));
    assert!(events.lock().is_empty());
    pending.complete(ValidationVerdict::Ignore).unwrap();
    assert_eq!(verdict.try_get().unwrap().unwrap(), ValidationVerdict::Ignore);
    assert_eq!(*events.lock(), vec![Event::Received("log", 5, ValidationVerdict::Ignore)]);
    // a second resolution attempt changes nothing
    assert!(pending.complete(ValidationVerdict::Accept).is_err());
    assert_eq!(events.lock().len(), 1);
}

#[test]
fn loggers_fire_from_innermost_to_outermost() {
    let events = journal();
    let pipeline = GossipPipeline::<Attestation>::builder()
        .validator(NoopValidator)
        .logger(Recorder::new("inner", &events))
        .logger(Recorder::new("outer", &events))
        .build();
    assert_eq!(pipeline.validate(&attestation(3)).join().unwrap(), ValidationVerdict::Accept);
    pipeline.publish(&attestation(4), &Ok(()));
    assert_eq!(
        *events.lock(),
        vec![
            Event::Received("inner", 3, ValidationVerdict::Accept),
            Event::Received("outer", 3, ValidationVerdict::Accept),
            Event::Published("inner", 4, true),
            Event::Published("outer", 4, true),
        ]
    );
}

#[test]
fn faults_become_rejections_at_the_pipeline_boundary() {
    let events = journal();
    let pipeline = GossipPipeline::<Attestation>::builder()
        .validator(validator_fn(|_: &Attestation| AsyncResult::failed(AsyncError::msg("state unavailable"))))
        .logger(Recorder::new("log", &events))
        .build();
    let verdict = pipeline.validate(&attestation(7)).join().unwrap();
    assert_eq!(verdict, ValidationVerdict::reject("state unavailable"));
    assert_eq!(*events.lock(), vec![Event::Received("log", 7, ValidationVerdict::reject("state unavailable"))]);
}

#[test]
fn every_logger_hears_about_a_panicking_validator() {
    env_logger::try_init().ok();
    let events = journal();
    let pipeline = GossipPipeline::<Attestation>::builder()
        .validator(validator_fn(|_: &Attestation| -> AsyncResult<ValidationVerdict> { panic!("bug") }))
        .logger(Recorder::new("inner", &events))
        .logger(Recorder::new("outer", &events))
        .build();
    let rejected = ValidationVerdict::reject("Validator panicked: bug");
    assert_eq!(pipeline.validate(&attestation(9)).join().unwrap(), rejected);
    assert_eq!(
        *events.lock(),
        vec![Event::Received("inner", 9, rejected.clone()), Event::Received("outer", 9, rejected.clone())]
    );
}

#[test]
fn broken_loggers_do_not_affect_the_verdict() {
    env_logger::try_init().ok();
    let events = journal();
    let pipeline = GossipPipeline::<Attestation>::builder()
        .validator(validator_fn(|_: &Attestation| AsyncResult::completed(ValidationVerdict::reject("late"))))
        .logger(Arc::new(PanickingLogger))
        .logger(Recorder::new("outer", &events))
        .build();
    assert_eq!(pipeline.validate(&attestation(1)).join().unwrap(), ValidationVerdict::reject("late"));
    pipeline.publish(&attestation(1), &Err(AsyncError::msg("no peers")));
    assert_eq!(
        *events.lock(),
        vec![Event::Received("outer", 1, ValidationVerdict::reject("late")), Event::Published("outer", 1, false)]
    );
}

#[test]
fn subnet_logger_only_hears_about_real_churn() {
    let events = journal();
    let logger = Recorder::new("subnets", &events);
    let validator = SubnetLoggingGossipValidator::<Attestation, _, _>::new(NoopValidator, logger);
    assert!(validator.subscribe(1));
    assert!(!validator.subscribe(1));
    assert!(validator.subscribe(2));
    assert!(validator.unsubscribe(1));
    assert!(!validator.unsubscribe(3));
    assert_eq!(validator.subscribed_subnets(), vec![2]);
    assert_eq!(validator.validate(&attestation(2)).join().unwrap(), ValidationVerdict::Accept);
    assert_eq!(
        *events.lock(),
        vec![
            Event::Subscribed(1),
            Event::Subscribed(2),
            Event::Unsubscribed(1),
            Event::Received("subnets", 2, ValidationVerdict::Accept),
        ]
    );
}

struct SlotCheck;

impl BlockingValidator<Attestation> for SlotCheck {
    fn validate_blocking(&self, message: &Attestation) -> Result<ValidationVerdict, AsyncError> {
        std::thread::sleep(std::time::Duration::from_millis(5));
        Ok(if message.slot % 2 == 0 { ValidationVerdict::Accept } else { ValidationVerdict::Ignore })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blocking_validation_runs_off_the_async_workers() {
    let events = journal();
    let runner = TokioAsyncRunner::current().unwrap();
    let pipeline = GossipPipeline::<Attestation>::builder()
        .validator(BlockingValidatorAdapter::new(SlotCheck, runner))
        .logger(Recorder::new("log", &events))
        .build();
    let verdicts: Vec<_> = (0..16u64).map(|slot| pipeline.validate(&attestation(slot))).collect();
    for (slot, verdict) in verdicts.into_iter().enumerate() {
        let expected = if slot % 2 == 0 { ValidationVerdict::Accept } else { ValidationVerdict::Ignore };
        assert_eq!(verdict.await.unwrap(), expected);
    }
    assert_eq!(events.lock().len(), 16);
}
