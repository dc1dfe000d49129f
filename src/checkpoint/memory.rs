//! Volatile checkpoint store for tests and single-process runs.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use super::{Checkpoint, CheckpointStore, PendingWrite, Result, validate_checkpoint_id};

#[derive(Default)]
struct Shelves {
    /// (thread, ns) -> checkpoint_id -> row. Latest = greatest id.
    checkpoints: FxHashMap<(String, String), FxHashMap<String, Checkpoint>>,
    /// (thread, ns, checkpoint_id) -> (task_id, idx) -> row.
    writes: FxHashMap<(String, String, String), FxHashMap<(String, u32), PendingWrite>>,
}

/// In-memory [`CheckpointStore`] with the same upsert / first-write-wins
/// semantics as the durable backends.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    shelves: RwLock<Shelves>,
}

impl InMemoryCheckpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for InMemoryCheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCheckpointStore").finish()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<Checkpoint>> {
        let shelves = self.shelves.read().await;
        let key = (thread_id.to_string(), checkpoint_ns.to_string());
        let Some(by_id) = shelves.checkpoints.get(&key) else {
            return Ok(None);
        };
        match checkpoint_id {
            Some(id) => Ok(by_id.get(id).cloned()),
            None => Ok(by_id
                .iter()
                .max_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(_, cp)| cp.clone())),
        }
    }

    async fn list(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<Checkpoint>> {
        let shelves = self.shelves.read().await;
        let key = (thread_id.to_string(), checkpoint_ns.to_string());
        let Some(by_id) = shelves.checkpoints.get(&key) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<Checkpoint> = by_id
            .values()
            .filter(|cp| before.is_none_or(|cursor| cp.checkpoint_id.as_str() < cursor))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.checkpoint_id.cmp(&a.checkpoint_id));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        validate_checkpoint_id(&checkpoint.checkpoint_id)?;
        let mut shelves = self.shelves.write().await;
        let key = (
            checkpoint.thread_id.clone(),
            checkpoint.checkpoint_ns.clone(),
        );
        shelves
            .checkpoints
            .entry(key)
            .or_default()
            .insert(checkpoint.checkpoint_id.clone(), checkpoint);
        Ok(())
    }

    async fn put_writes(&self, writes: Vec<PendingWrite>) -> Result<()> {
        let mut shelves = self.shelves.write().await;
        for write in writes {
            validate_checkpoint_id(&write.checkpoint_id)?;
            let key = (
                write.thread_id.clone(),
                write.checkpoint_ns.clone(),
                write.checkpoint_id.clone(),
            );
            shelves
                .writes
                .entry(key)
                .or_default()
                .entry((write.task_id.clone(), write.idx))
                .or_insert(write);
        }
        Ok(())
    }

    async fn pending_writes(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: &str,
    ) -> Result<Vec<PendingWrite>> {
        let shelves = self.shelves.read().await;
        let key = (
            thread_id.to_string(),
            checkpoint_ns.to_string(),
            checkpoint_id.to_string(),
        );
        let Some(by_task) = shelves.writes.get(&key) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<PendingWrite> = by_task.values().cloned().collect();
        rows.sort_by(|a, b| (&a.task_id, a.idx).cmp(&(&b.task_id, b.idx)));
        Ok(rows)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut shelves = self.shelves.write().await;
        shelves.checkpoints.retain(|(thread, _), _| thread != thread_id);
        shelves.writes.retain(|(thread, _, _), _| thread != thread_id);
        Ok(())
    }
}
