use crate::errors::RpcFailure;
use crate::rpc::logging::{LoggingPeerId, ReqRespMethodLogger, ResponseLogger};
use libbeacon::time::TimeProvider;
use log::*;
use parking_lot::Mutex;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

#[derive(Clone, Debug)]
struct Timestamped<E> {
    millis: u64,
    event: E,
}

#[derive(Default)]
struct ExchangeLog {
    items: Vec<Timestamped<String>>,
    item_count: usize,
    finished: bool,
}

/// Collects the items of one exchange and writes a single summary line when the exchange ends.
///
/// Events reported after the end are logged at debug level as anomalies.
pub struct SummarizingResponseLogger {
    method: String,
    direction: Direction,
    peer: LoggingPeerId,
    request: String,
    level: Level,
    max_logged_items: usize,
    time: Arc<dyn TimeProvider>,
    started_millis: u64,
    log: Mutex<ExchangeLog>,
}

impl SummarizingResponseLogger {
    pub fn new(
        method: impl Into<String>,
        direction: Direction,
        peer: LoggingPeerId,
        request: impl Into<String>,
        settings: &ResponseLogSettings,
    ) -> Self {
        let started_millis = settings.time.time_millis();
        Self {
            method: method.into(),
            direction,
            peer,
            request: request.into(),
            level: settings.level,
            max_logged_items: settings.max_logged_items,
            time: Arc::clone(&settings.time),
            started_millis,
            log: Mutex::new(ExchangeLog::default()),
        }
    }

    /// Mark the exchange finished, handing back what was collected. `None` if it already was.
    fn finish(&self, event: &str) -> Option<(Vec<Timestamped<String>>, usize, u64)> {
        let mut log = self.log.lock();
        if log.finished {
            let (direction, method, peer) = (self.direction, &self.method, &self.peer);
            debug!("{direction} {method} exchange with {peer} reported {event} after it had finished");
            return None;
        }
        log.finished = true;
        let elapsed = self.time.time_millis().saturating_sub(self.started_millis);
        Some((std::mem::take(&mut log.items), log.item_count, elapsed))
    }

    fn summary(&self, items: &[Timestamped<String>], item_count: usize, elapsed: u64) -> String {
        let mut listed: Vec<String> =
            items.iter().map(|i| format!("{}@+{}ms", i.event, i.millis.saturating_sub(self.started_millis))).collect();
        if item_count > items.len() {
            listed.push(format!("...{} more", item_count - items.len()));
        }
        format!(
            "{} {} exchange with {}: request {}, {} item(s) in {elapsed}ms [{}]",
            self.direction,
            self.method,
            self.peer,
            self.request,
            item_count,
            listed.join(", ")
        )
    }
}

impl<T: Debug> ResponseLogger<T> for SummarizingResponseLogger {
    fn on_next_item(&self, item: &T) {
        let mut log = self.log.lock();
        if log.finished {
            let (direction, method, peer) = (self.direction, &self.method, &self.peer);
            debug!("{direction} {method} exchange with {peer} sent an item after it had finished");
            return;
        }
        log.item_count += 1;
        if log.items.len() < self.max_logged_items {
            log.items.push(Timestamped { millis: self.time.time_millis(), event: format!("{item:?}") });
        }
    }

    fn on_complete(&self) {
        if let Some((items, count, elapsed)) = self.finish("completion") {
            log!(self.level, "{} completed", self.summary(&items, count, elapsed));
        }
    }

    fn on_error(&self, failure: &RpcFailure) {
        if let Some((items, count, elapsed)) = self.finish("an error") {
            match failure {
                RpcFailure::ErrorResponse(_) => {
                    log!(self.level, "{} failed: {failure}", self.summary(&items, count, elapsed))
                }
                RpcFailure::Unexpected(_) => warn!("{} failed: {failure}", self.summary(&items, count, elapsed)),
            }
        }
    }
}

/// Shared settings of the loggers a [`SummarizingMethodLogger`] creates.
#[derive(Clone)]
pub struct ResponseLogSettings {
    pub level: Level,
    pub max_logged_items: usize,
    pub time: Arc<dyn TimeProvider>,
}

/// A [`ReqRespMethodLogger`] producing a [`SummarizingResponseLogger`] per exchange.
pub struct SummarizingMethodLogger {
    method: String,
    settings: ResponseLogSettings,
}

impl SummarizingMethodLogger {
    pub fn new(method: impl Into<String>, settings: ResponseLogSettings) -> Self {
        Self { method: method.into(), settings }
    }

    pub fn start<Req: Debug>(
        &self,
        direction: Direction,
        peer: &LoggingPeerId,
        request: &Req,
    ) -> Arc<SummarizingResponseLogger> {
        trace!("Starting {direction} {} exchange with {peer}", self.method);
        let request = format!("{request:?}");
        Arc::new(SummarizingResponseLogger::new(&*self.method, direction, peer.clone(), request, &self.settings))
    }
}

impl<Req: Debug, T: Debug + 'static> ReqRespMethodLogger<Req, T> for SummarizingMethodLogger {
    fn on_inbound_request(&self, peer: &LoggingPeerId, request: &Req) -> Arc<dyn ResponseLogger<T>> {
        self.start(Direction::Inbound, peer, request)
    }

    fn on_outbound_request(&self, peer: &LoggingPeerId, request: &Req) -> Arc<dyn ResponseLogger<T>> {
        self.start(Direction::Outbound, peer, request)
    }
}
