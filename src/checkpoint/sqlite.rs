/*!
SQLite checkpoint store.

Async [`CheckpointStore`] backend over a `sqlx` connection pool.

## Behavior

- When the `sqlite-migrations` feature is enabled (default), embedded
  migrations (`sqlx::migrate!("./migrations")`) run on connect; disabling the
  feature assumes external migration orchestration.
- Upsert semantics come from `INSERT … ON CONFLICT DO UPDATE` on the
  checkpoint primary key; pending writes use `ON CONFLICT DO NOTHING` so a
  retried task cannot duplicate effects.
- Checkpoint ids are lexicographically ordered by construction (see
  [`super::next_checkpoint_id`]), so latest/cursor queries order by id.

## Schema

- `checkpoints (thread_id, checkpoint_ns, checkpoint_id)` primary key, plus
  `parent_checkpoint_id`, `checkpoint`, `metadata`, `created_at` (RFC3339).
- `checkpoint_writes (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)`
  primary key, plus `channel`, `value`, `created_at`.
*/

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;

use super::{
    Checkpoint, CheckpointStore, PendingWrite, Result, StoreError, validate_checkpoint_id,
};

/// SQLite-backed checkpoint store.
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteCheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCheckpointStore").finish()
    }
}

fn backend_err(context: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::Backend {
        message: format!("{context}: {e}"),
    }
}

fn decode_row(row: &SqliteRow) -> Result<Checkpoint> {
    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Ok(Checkpoint {
        thread_id: row.get("thread_id"),
        checkpoint_ns: row.get("checkpoint_ns"),
        checkpoint_id: row.get("checkpoint_id"),
        parent_checkpoint_id: row.get("parent_checkpoint_id"),
        checkpoint: row.get("checkpoint"),
        metadata: row.get("metadata"),
        created_at,
    })
}

fn decode_write_row(row: &SqliteRow) -> Result<PendingWrite> {
    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let idx: i64 = row.get("idx");
    Ok(PendingWrite {
        thread_id: row.get("thread_id"),
        checkpoint_ns: row.get("checkpoint_ns"),
        checkpoint_id: row.get("checkpoint_id"),
        task_id: row.get("task_id"),
        idx: idx as u32,
        channel: row.get("channel"),
        value: row.get("value"),
        created_at,
    })
}

impl SqliteCheckpointStore {
    /// Connect to (or create) the database at `database_url`, e.g.
    /// `sqlite://trendloom.db`.
    #[must_use = "store must be used to persist checkpoints"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(backend_err("connect"))?;
        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(StoreError::Backend {
                    message: format!("migration failure: {e}"),
                });
            }
        }
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    #[instrument(skip(self), err)]
    async fn get(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<Checkpoint>> {
        let row = match checkpoint_id {
            Some(id) => {
                sqlx::query(
                    r#"
                    SELECT * FROM checkpoints
                    WHERE thread_id = ?1 AND checkpoint_ns = ?2 AND checkpoint_id = ?3
                    "#,
                )
                .bind(thread_id)
                .bind(checkpoint_ns)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM checkpoints
                    WHERE thread_id = ?1 AND checkpoint_ns = ?2
                    ORDER BY checkpoint_id DESC
                    LIMIT 1
                    "#,
                )
                .bind(thread_id)
                .bind(checkpoint_ns)
                .fetch_optional(&self.pool)
                .await
            }
        }
        .map_err(backend_err("select checkpoint"))?;

        row.as_ref().map(decode_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<Checkpoint>> {
        let rows = match before {
            Some(cursor) => {
                sqlx::query(
                    r#"
                    SELECT * FROM checkpoints
                    WHERE thread_id = ?1 AND checkpoint_ns = ?2 AND checkpoint_id < ?3
                    ORDER BY checkpoint_id DESC
                    LIMIT ?4
                    "#,
                )
                .bind(thread_id)
                .bind(checkpoint_ns)
                .bind(cursor)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM checkpoints
                    WHERE thread_id = ?1 AND checkpoint_ns = ?2
                    ORDER BY checkpoint_id DESC
                    LIMIT ?3
                    "#,
                )
                .bind(thread_id)
                .bind(checkpoint_ns)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(backend_err("list checkpoints"))?;

        rows.iter().map(decode_row).collect()
    }

    #[instrument(skip(self, checkpoint), err)]
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        validate_checkpoint_id(&checkpoint.checkpoint_id)?;
        sqlx::query(
            r#"
            INSERT INTO checkpoints (
                thread_id, checkpoint_ns, checkpoint_id,
                parent_checkpoint_id, checkpoint, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (thread_id, checkpoint_ns, checkpoint_id) DO UPDATE SET
                parent_checkpoint_id = excluded.parent_checkpoint_id,
                checkpoint = excluded.checkpoint,
                metadata = excluded.metadata
            "#,
        )
        .bind(&checkpoint.thread_id)
        .bind(&checkpoint.checkpoint_ns)
        .bind(&checkpoint.checkpoint_id)
        .bind(&checkpoint.parent_checkpoint_id)
        .bind(&checkpoint.checkpoint)
        .bind(&checkpoint.metadata)
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend_err("upsert checkpoint"))?;
        Ok(())
    }

    #[instrument(skip(self, writes), err)]
    async fn put_writes(&self, writes: Vec<PendingWrite>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend_err("tx begin"))?;
        for write in &writes {
            validate_checkpoint_id(&write.checkpoint_id)?;
            sqlx::query(
                r#"
                INSERT INTO checkpoint_writes (
                    thread_id, checkpoint_ns, checkpoint_id,
                    task_id, idx, channel, value, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)
                    DO NOTHING
                "#,
            )
            .bind(&write.thread_id)
            .bind(&write.checkpoint_ns)
            .bind(&write.checkpoint_id)
            .bind(&write.task_id)
            .bind(write.idx as i64)
            .bind(&write.channel)
            .bind(&write.value)
            .bind(write.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(backend_err("insert pending write"))?;
        }
        tx.commit().await.map_err(backend_err("tx commit"))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn pending_writes(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: &str,
    ) -> Result<Vec<PendingWrite>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM checkpoint_writes
            WHERE thread_id = ?1 AND checkpoint_ns = ?2 AND checkpoint_id = ?3
            ORDER BY task_id, idx
            "#,
        )
        .bind(thread_id)
        .bind(checkpoint_ns)
        .bind(checkpoint_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err("select pending writes"))?;

        rows.iter().map(decode_write_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(backend_err("tx begin"))?;
        sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?1")
            .bind(thread_id)
            .execute(&mut *tx)
            .await
            .map_err(backend_err("delete checkpoints"))?;
        sqlx::query("DELETE FROM checkpoint_writes WHERE thread_id = ?1")
            .bind(thread_id)
            .execute(&mut *tx)
            .await
            .map_err(backend_err("delete pending writes"))?;
        tx.commit().await.map_err(backend_err("tx commit"))?;
        Ok(())
    }
}
