//! Durable checkpoint store: contract, records, and persistence envelope.
//!
//! A checkpoint is an immutable-once-written snapshot of engine state at one
//! step boundary, keyed by (thread, namespace, checkpoint id) with a parent
//! pointer forming a lineage tree. Pending writes are task-scoped values
//! recorded against a checkpoint before they are folded into the next one;
//! the interrupt payload travels this way.
//!
//! Store semantics (identical across backends):
//! - `put` is an idempotent upsert: same id overwrites, never duplicates, and
//!   the parent pointer is last-write-wins (safe retry of a crashed task).
//! - `put_writes` is first-write-wins per (task, idx): re-submitting an
//!   existing key is a silent no-op.
//! - Lookups on unknown threads/namespaces return absent, never an error.
//! - Within a (thread, namespace), checkpoint ids are totally ordered by
//!   creation; [`next_checkpoint_id`] guarantees lexicographic order matches
//!   creation order, so "latest" is simply the greatest id.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryCheckpointStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::serde_ext::{self, SerdeExtError};
use crate::state::WorkflowState;
use crate::types::StepKind;

/// One persisted checkpoint row. Blobs are opaque text produced by
/// [`crate::serde_ext`].
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub thread_id: String,
    pub checkpoint_ns: String,
    pub checkpoint_id: String,
    pub parent_checkpoint_id: Option<String>,
    pub checkpoint: String,
    pub metadata: String,
    pub created_at: DateTime<Utc>,
}

/// One provisional task-scoped write pending against a checkpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingWrite {
    pub thread_id: String,
    pub checkpoint_ns: String,
    pub checkpoint_id: String,
    pub task_id: String,
    pub idx: u32,
    pub channel: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("invalid checkpoint key: {what}")]
    #[diagnostic(
        code(trendloom::checkpoint::validation),
        help("Checkpoint ids must be non-empty.")
    )]
    Validation { what: String },

    #[error("checkpoint backend error: {message}")]
    #[diagnostic(code(trendloom::checkpoint::backend))]
    Backend { message: String },

    #[error(transparent)]
    #[diagnostic(code(trendloom::checkpoint::codec))]
    Codec(#[from] SerdeExtError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence contract for checkpoints and pending writes.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Exact lookup when `checkpoint_id` is given, otherwise the latest
    /// checkpoint for (thread, ns) by creation order. Absent, never an
    /// error, for unknown keys.
    async fn get(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<Checkpoint>>;

    /// Newest-first listing, at most `limit` rows. `before` excludes every
    /// checkpoint at-or-after the given id, making it a restartable cursor.
    async fn list(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<Checkpoint>>;

    /// Idempotent upsert by (thread, ns, checkpoint id).
    async fn put(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Insert each write iff its (task, idx) key is new; existing keys are
    /// silently skipped.
    async fn put_writes(&self, writes: Vec<PendingWrite>) -> Result<()>;

    /// Pending writes for one checkpoint, ordered by (task, idx).
    async fn pending_writes(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: &str,
    ) -> Result<Vec<PendingWrite>>;

    /// Remove every checkpoint and pending write for the thread, across all
    /// namespaces. Only the restart path calls this.
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;
}

pub(crate) fn validate_checkpoint_id(checkpoint_id: &str) -> Result<()> {
    if checkpoint_id.is_empty() {
        return Err(StoreError::Validation {
            what: "empty checkpoint id".into(),
        });
    }
    Ok(())
}

/// Generate a checkpoint id whose lexicographic order equals creation order.
///
/// The zero-padded hex step counter prefix makes ids sortable; the uuid
/// suffix keeps ids from colliding when divergent lineages reuse a step
/// number after a resume.
#[must_use]
pub fn next_checkpoint_id(step: u64) -> String {
    format!("{step:016x}-{}", Uuid::new_v4())
}

/// Serde envelope for the checkpoint blob: full state plus the frontier the
/// engine resumes from. Kept separate from the in-memory types so the wire
/// shape can evolve independently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedRun {
    pub state: WorkflowState,
    /// Step to execute next; `None` when the run reached a terminal route.
    #[serde(default)]
    pub next: Option<StepKind>,
    /// Number of steps completed so far across all invocations of the thread.
    pub step: u64,
}

/// Serde envelope for the checkpoint metadata blob.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// What produced the checkpoint: `"input"` (seed) or `"loop"` (a step).
    pub source: String,
    pub step: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<StepKind>,
}

impl PersistedRun {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_ext::encode_json(self)?)
    }

    pub fn decode(blob: &str) -> Result<Self> {
        Ok(serde_ext::decode_json(blob)?)
    }
}

impl CheckpointMetadata {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_ext::encode_json(self)?)
    }

    pub fn decode(blob: &str) -> Result<Self> {
        Ok(serde_ext::decode_json(blob)?)
    }
}
