//! Ordered progress-event stream and per-thread event log.
//!
//! The engine and the coordinator's workers push discrete [`ProgressEvent`]
//! records; consumers drain them in emission order from a plain channel. A
//! stream is finite and not restartable; each execution produces a fresh
//! receiver. The only delivery guarantee is ordering within one
//! (thread, stream) partition, carried by a monotonically increasing
//! sequence number assigned at append time.
//!
//! The [`EventLog`] doubles as the durable record the coordinator queries
//! (e.g. counting per-platform completion signals). A dropped receiver never
//! fails a producer: an abandoned execution keeps appending to the log and
//! checkpointing, it just has nobody watching.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::types::StreamKind;

/// Kind discriminator for progress events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NodeStart,
    NodeEnd,
    Token,
    Plan,
    SearchResults,
    Trend,
    Idea,
    Complete,
    Error,
}

/// One discrete progress record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub thread_id: String,
    pub stream: StreamKind,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default)]
    pub data: Value,
    /// Monotonically increasing within (thread_id, stream).
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct LogInner {
    events: Vec<ProgressEvent>,
    next_sequence: FxHashMap<(String, StreamKind), u64>,
}

/// In-memory, queryable log of every emitted progress event.
///
/// Sequence numbers are assigned here, under one lock, so concurrent
/// producers on the same partition still observe a gap-free total order.
#[derive(Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<LogInner>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp an event with the partition's next sequence number and store it.
    pub fn append(
        &self,
        thread_id: &str,
        stream: StreamKind,
        kind: EventKind,
        node: Option<String>,
        data: Value,
    ) -> ProgressEvent {
        let mut inner = self.inner.lock().expect("event log poisoned");
        let key = (thread_id.to_string(), stream);
        let sequence = inner.next_sequence.get(&key).copied().unwrap_or(0);
        inner.next_sequence.insert(key, sequence + 1);
        let event = ProgressEvent {
            thread_id: thread_id.to_string(),
            stream,
            kind,
            node,
            data,
            sequence,
            created_at: Utc::now(),
        };
        inner.events.push(event.clone());
        event
    }

    /// All events for one partition, in sequence order.
    #[must_use]
    pub fn by_thread(&self, thread_id: &str, stream: StreamKind) -> Vec<ProgressEvent> {
        let inner = self.inner.lock().expect("event log poisoned");
        let mut events: Vec<ProgressEvent> = inner
            .events
            .iter()
            .filter(|e| e.thread_id == thread_id && e.stream == stream)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.sequence);
        events
    }

    /// Highest sequence number assigned for the partition, if any.
    #[must_use]
    pub fn latest_sequence(&self, thread_id: &str, stream: StreamKind) -> Option<u64> {
        let inner = self.inner.lock().expect("event log poisoned");
        inner
            .next_sequence
            .get(&(thread_id.to_string(), stream))
            .map(|next| next - 1)
    }

    /// Drop every event for the partition and restart its sequence at zero.
    pub fn clear(&self, thread_id: &str, stream: StreamKind) {
        let mut inner = self.inner.lock().expect("event log poisoned");
        inner
            .events
            .retain(|e| !(e.thread_id == thread_id && e.stream == stream));
        inner.next_sequence.remove(&(thread_id.to_string(), stream));
    }
}

/// Producer handle: stamps events through the log, then pushes them into the
/// channel for whoever is watching this execution.
#[derive(Clone)]
pub struct ProgressEmitter {
    log: EventLog,
    tx: flume::Sender<ProgressEvent>,
}

impl ProgressEmitter {
    /// Create an emitter plus the receiver draining this execution's stream.
    #[must_use]
    pub fn channel(log: EventLog) -> (Self, flume::Receiver<ProgressEvent>) {
        let (tx, rx) = flume::unbounded();
        (Self { log, tx }, rx)
    }

    /// Emit one event. Send failures (receiver gone) are ignored: the event
    /// is already in the log, and abandoned streams must not halt execution.
    pub fn emit(
        &self,
        thread_id: &str,
        stream: StreamKind,
        kind: EventKind,
        node: Option<String>,
        data: Value,
    ) {
        let event = self.log.append(thread_id, stream, kind, node, data);
        if self.tx.send(event).is_err() {
            tracing::debug!(thread = %thread_id, "progress stream abandoned; event logged only");
        }
    }

    /// The shared log backing this emitter.
    #[must_use]
    pub fn log(&self) -> &EventLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sequences_are_per_partition_and_gap_free() {
        let log = EventLog::new();
        log.append("t1", StreamKind::Research, EventKind::NodeStart, None, json!({}));
        log.append("t1", StreamKind::Ideas, EventKind::NodeStart, None, json!({}));
        log.append("t1", StreamKind::Research, EventKind::NodeEnd, None, json!({}));

        let research = log.by_thread("t1", StreamKind::Research);
        assert_eq!(
            research.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(log.latest_sequence("t1", StreamKind::Ideas), Some(0));
    }

    #[test]
    fn clear_restarts_sequence_numbering() {
        let log = EventLog::new();
        log.append("t1", StreamKind::Research, EventKind::Token, None, json!({}));
        log.clear("t1", StreamKind::Research);
        assert!(log.by_thread("t1", StreamKind::Research).is_empty());
        let event = log.append("t1", StreamKind::Research, EventKind::Token, None, json!({}));
        assert_eq!(event.sequence, 0);
    }

    #[test]
    fn emitter_survives_dropped_receiver() {
        let log = EventLog::new();
        let (emitter, rx) = ProgressEmitter::channel(log.clone());
        drop(rx);
        emitter.emit("t1", StreamKind::Research, EventKind::Error, None, json!({}));
        assert_eq!(log.by_thread("t1", StreamKind::Research).len(), 1);
    }
}
