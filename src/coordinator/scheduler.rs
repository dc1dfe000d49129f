//! Deferred-task scheduling seam.
//!
//! External triggers never do long work inline: they validate, enqueue a
//! task, and return an accepted acknowledgment. The scheduler contract is
//! "run this named task after N time units, at-least-once"; the queue
//! implementation here delivers in-process, and a worker loop
//! ([`super::Coordinator::serve`]) drains it.

use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::steps::ResumeDecision;
use crate::types::Platform;

/// The closed set of deferred tasks the coordinator runs.
#[derive(Clone, Debug, PartialEq)]
pub enum Task {
    RunResearch { thread_id: String },
    ResumeApproval {
        thread_id: String,
        decision: ResumeDecision,
    },
    FanOutIdeas { thread_id: String },
    PlatformIdeas {
        thread_id: String,
        platform: Platform,
    },
}

#[derive(Debug, Error, Diagnostic)]
pub enum ScheduleError {
    #[error("task queue closed; worker is gone")]
    #[diagnostic(
        code(trendloom::scheduler::queue_closed),
        help("Start the worker loop before scheduling tasks.")
    )]
    QueueClosed,
}

/// Deferred-task scheduler with at-least-once delivery.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    async fn schedule(&self, task: Task, delay: Duration) -> Result<(), ScheduleError>;
}

/// In-process queue scheduler backed by a flume channel.
pub struct QueueScheduler {
    tx: flume::Sender<(Task, Duration)>,
}

impl QueueScheduler {
    /// Create a scheduler plus the receiver its worker loop drains.
    #[must_use]
    pub fn new() -> (Self, flume::Receiver<(Task, Duration)>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TaskScheduler for QueueScheduler {
    async fn schedule(&self, task: Task, delay: Duration) -> Result<(), ScheduleError> {
        tracing::debug!(?task, ?delay, "task scheduled");
        self.tx
            .send_async((task, delay))
            .await
            .map_err(|_| ScheduleError::QueueClosed)
    }
}
