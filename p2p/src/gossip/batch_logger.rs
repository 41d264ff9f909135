//! Condensed logging for topics that deliver many small pieces of the same object.
//!
//! Data column sidecars arrive as dozens of messages per block. Logging each one drowns everything else, so the
//! [`BatchingGossipLogger`] buffers receive events and periodically writes one line per object, listing the received
//! indexes as compact ranges.

use crate::gossip::logger::GossipLogger;
use crate::gossip::verdict::ValidationVerdict;
use libbeacon::async_result::{RepeatingTask, TokioAsyncRunner};
use libbeacon::helpers::format_index_ranges;
use libbeacon::time::TimeProvider;
use libbeacon::Outcome;
use log::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// A message that is one indexed part of a larger object.
pub trait BatchedMessage {
    /// Identifies the object the part belongs to, e.g. `#123 (0x1a2b3c4d)` for a block.
    fn batch_key(&self) -> String;

    fn batch_index(&self) -> u64;
}

#[derive(Clone, Debug)]
struct ReceiveEvent {
    key: String,
    index: u64,
    verdict: ValidationVerdict,
    millis: u64,
}

pub struct BatchingGossipLogger {
    label: String,
    max_index: u64,
    level: Level,
    time: Arc<dyn TimeProvider>,
    events: Mutex<Vec<ReceiveEvent>>,
}

impl BatchingGossipLogger {
    pub fn new(label: impl Into<String>, max_index: u64, level: Level, time: Arc<dyn TimeProvider>) -> Self {
        Self { label: label.into(), max_index, level, time, events: Mutex::new(Vec::new()) }
    }

    /// Flush the buffer every `interval` until the returned task is dropped.
    pub fn start(self: &Arc<Self>, runner: &TokioAsyncRunner, interval: Duration) -> RepeatingTask {
        let logger = Arc::clone(self);
        runner.run_with_fixed_delay(interval, move || {
            logger.flush();
        })
    }

    pub fn pending_events(&self) -> usize {
        self.events.lock().len()
    }

    /// Write out everything received since the last flush. Returns the lines that were logged.
    pub fn flush(&self) -> Vec<String> {
        let events = std::mem::take(&mut *self.events.lock());
        let mut groups: Vec<(String, Vec<ReceiveEvent>)> = Vec::new();
        for event in events {
            match groups.iter_mut().find(|(key, _)| *key == event.key) {
                Some((_, group)) => group.push(event),
                None => groups.push((event.key.clone(), vec![event])),
            }
        }
        let lines: Vec<String> = groups.into_iter().flat_map(|(key, group)| self.describe(&key, &group)).collect();
        for line in &lines {
            log!(self.level, "{line}");
        }
        lines
    }

    fn describe(&self, key: &str, group: &[ReceiveEvent]) -> Vec<String> {
        let first = &group[0];
        if group.iter().all(|e| e.verdict == first.verdict) {
            let indexes: Vec<u64> = group.iter().map(|e| e.index).collect();
            let span = group.iter().map(|e| e.millis).max().unwrap_or(first.millis).saturating_sub(first.millis);
            vec![format!(
                "{}: received {} for {key} {}: {} (over {span}ms)",
                self.label,
                group.len(),
                format_index_ranges(&indexes, self.max_index),
                first.verdict
            )]
        } else {
            group
                .iter()
                .map(|e| format!("{}: received index {} for {key}: {}", self.label, e.index, e.verdict))
                .collect()
        }
    }
}

impl<M: BatchedMessage + Send + Sync> GossipLogger<M> for BatchingGossipLogger {
    fn on_receive(&self, message: &M, verdict: &ValidationVerdict) {
        let event = ReceiveEvent {
            key: message.batch_key(),
            index: message.batch_index(),
            verdict: verdict.clone(),
            millis: self.time.time_millis(),
        };
        self.events.lock().push(event);
    }

    fn on_publish(&self, message: &M, outcome: &Outcome<()>) {
        match outcome {
            Ok(()) => log!(
                self.level,
                "{}: published index {} for {}",
                self.label,
                message.batch_index(),
                message.batch_key()
            ),
            Err(err) => warn!(
                "{}: failed to publish index {} for {}: {err}",
                self.label,
                message.batch_index(),
                message.batch_key()
            ),
        }
    }
}
