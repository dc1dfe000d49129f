#![allow(dead_code)]

pub mod checkpoints;
pub mod fakes;

pub use checkpoints::*;
pub use fakes::*;

use std::sync::Arc;
use std::time::Duration;

use trendloom::checkpoint::InMemoryCheckpointStore;
use trendloom::coordinator::{Coordinator, CoordinatorBuilder, Task};
use trendloom::types::ThreadStatus;

/// Coordinator over in-memory stores and scripted clients, with handles to
/// everything a test wants to poke at.
pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub tasks: flume::Receiver<(Task, Duration)>,
    pub threads: Arc<RecordingThreadStore>,
    pub checkpoints: Arc<InMemoryCheckpointStore>,
    pub model: Arc<ScriptedModel>,
}

impl Harness {
    pub fn new() -> Self {
        let threads = Arc::new(RecordingThreadStore::new());
        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        let model = Arc::new(ScriptedModel::new());
        let (coordinator, tasks) = CoordinatorBuilder::new(model.clone(), Arc::new(StaticSearch))
            .thread_store(threads.clone())
            .checkpoint_store(checkpoints.clone())
            .build();
        Self {
            coordinator: Arc::new(coordinator),
            tasks,
            threads,
            checkpoints,
            model,
        }
    }

    /// Pull the next scheduled task off the queue and run it to completion.
    /// Deterministic alternative to running the worker loop.
    pub async fn run_next_task(&self) {
        let (task, _delay) = self
            .tasks
            .recv_async()
            .await
            .expect("a task was scheduled");
        self.coordinator.run_task(task).await.expect("task succeeds");
    }

    /// Drain one scheduled task without running it.
    pub async fn next_task(&self) -> Task {
        self.tasks.recv_async().await.expect("a task was scheduled").0
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll the thread's status until it matches, failing after five seconds.
pub async fn wait_for_status(coordinator: &Coordinator, thread_id: &str, expected: ThreadStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let thread = coordinator
            .threads()
            .get(thread_id)
            .await
            .expect("thread exists");
        if thread.status == expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for status {expected}, thread is in {}",
            thread.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll the thread's event partition until an event of the given kind shows
/// up, failing after five seconds.
pub async fn wait_for_event(
    coordinator: &Coordinator,
    thread_id: &str,
    stream: trendloom::types::StreamKind,
    kind: trendloom::events::EventKind,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if coordinator
            .events()
            .by_thread(thread_id, stream)
            .iter()
            .any(|e| e.kind == kind)
        {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {kind:?} on {stream}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Collapse consecutive duplicates, for status-sequence assertions.
pub fn dedup_consecutive(statuses: Vec<ThreadStatus>) -> Vec<ThreadStatus> {
    let mut out: Vec<ThreadStatus> = Vec::new();
    for status in statuses {
        if out.last() != Some(&status) {
            out.push(status);
        }
    }
    out
}
