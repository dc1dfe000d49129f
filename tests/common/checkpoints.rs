//! Checkpoint fixtures and the backend-agnostic store contract suite.

use chrono::Utc;

use trendloom::checkpoint::{Checkpoint, CheckpointStore, PendingWrite, StoreError};

pub fn checkpoint(thread: &str, ns: &str, id: &str) -> Checkpoint {
    Checkpoint {
        thread_id: thread.into(),
        checkpoint_ns: ns.into(),
        checkpoint_id: id.into(),
        parent_checkpoint_id: None,
        checkpoint: format!("{{\"blob\":\"{id}\"}}"),
        metadata: "{}".into(),
        created_at: Utc::now(),
    }
}

pub fn pending_write(
    thread: &str,
    ns: &str,
    checkpoint_id: &str,
    task: &str,
    idx: u32,
    value: &str,
) -> PendingWrite {
    PendingWrite {
        thread_id: thread.into(),
        checkpoint_ns: ns.into(),
        checkpoint_id: checkpoint_id.into(),
        task_id: task.into(),
        idx,
        channel: "values".into(),
        value: value.into(),
        created_at: Utc::now(),
    }
}

/// Contract shared by every backend: run against a fresh, empty store.
pub async fn assert_store_contract(store: &dyn CheckpointStore) {
    // Lookups on unknown keys are absent, never errors.
    assert!(store.get("ghost", "", None).await.unwrap().is_none());
    assert!(store.list("ghost", "", 10, None).await.unwrap().is_empty());
    assert!(
        store
            .pending_writes("ghost", "", "cp-0")
            .await
            .unwrap()
            .is_empty()
    );

    // Put three checkpoints with lexicographically increasing ids.
    for id in ["cp-01", "cp-02", "cp-03"] {
        store.put(checkpoint("t1", "", id)).await.unwrap();
    }

    // Latest is the greatest id; exact lookups hit their row.
    let latest = store.get("t1", "", None).await.unwrap().unwrap();
    assert_eq!(latest.checkpoint_id, "cp-03");
    let exact = store.get("t1", "", Some("cp-02")).await.unwrap().unwrap();
    assert_eq!(exact.checkpoint_id, "cp-02");

    // Idempotent upsert: same id overwrites content, never duplicates.
    let mut replacement = checkpoint("t1", "", "cp-03");
    replacement.checkpoint = "{\"blob\":\"rewritten\"}".into();
    replacement.parent_checkpoint_id = Some("cp-02".into());
    store.put(replacement).await.unwrap();
    let rows = store.list("t1", "", 10, None).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].checkpoint, "{\"blob\":\"rewritten\"}");
    assert_eq!(rows[0].parent_checkpoint_id.as_deref(), Some("cp-02"));

    // list: newest first, limited, cursor excludes at-or-after.
    let ids: Vec<&str> = rows.iter().map(|c| c.checkpoint_id.as_str()).collect();
    assert_eq!(ids, ["cp-03", "cp-02", "cp-01"]);
    let page = store.list("t1", "", 1, None).await.unwrap();
    assert_eq!(page[0].checkpoint_id, "cp-03");
    let before = store.list("t1", "", 10, Some("cp-03")).await.unwrap();
    let ids: Vec<&str> = before.iter().map(|c| c.checkpoint_id.as_str()).collect();
    assert_eq!(ids, ["cp-02", "cp-01"]);

    // Namespaces partition: same thread, different ns, independent rows.
    store.put(checkpoint("t1", "sub", "cp-90")).await.unwrap();
    let sub_latest = store.get("t1", "sub", None).await.unwrap().unwrap();
    assert_eq!(sub_latest.checkpoint_id, "cp-90");
    assert_eq!(store.list("t1", "", 10, None).await.unwrap().len(), 3);

    // Pending writes: first-write-wins per (task, idx).
    store
        .put_writes(vec![
            pending_write("t1", "", "cp-03", "task-a", 0, "original"),
            pending_write("t1", "", "cp-03", "task-a", 1, "second"),
        ])
        .await
        .unwrap();
    store
        .put_writes(vec![pending_write("t1", "", "cp-03", "task-a", 0, "retry")])
        .await
        .unwrap();
    let writes = store.pending_writes("t1", "", "cp-03").await.unwrap();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].value, "original");
    assert_eq!(writes[1].value, "second");

    // Empty checkpoint id is a validation error for both write paths.
    assert!(matches!(
        store.put(checkpoint("t1", "", "")).await,
        Err(StoreError::Validation { .. })
    ));
    assert!(matches!(
        store
            .put_writes(vec![pending_write("t1", "", "", "task-a", 0, "x")])
            .await,
        Err(StoreError::Validation { .. })
    ));

    // delete_thread wipes checkpoints and writes across all namespaces.
    store.put(checkpoint("t2", "", "cp-50")).await.unwrap();
    store.delete_thread("t1").await.unwrap();
    assert!(store.get("t1", "", None).await.unwrap().is_none());
    assert!(store.get("t1", "sub", None).await.unwrap().is_none());
    assert!(
        store
            .pending_writes("t1", "", "cp-03")
            .await
            .unwrap()
            .is_empty()
    );
    // Other threads untouched.
    assert!(store.get("t2", "", None).await.unwrap().is_some());
}
