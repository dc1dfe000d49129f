//! Durable records owned by the coordinator and their store seams.
//!
//! The vendor data store is an external collaborator, so each record type
//! gets an async trait with an in-memory implementation; production swaps in
//! a real backend behind the same seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::state::{Source, Trend};
use crate::types::{Confidence, Platform, ThreadStatus};

/// One workflow run. Owned exclusively by the coordinator and mutated only
/// through store calls; never deleted except on explicit restart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub user_prompt: String,
    pub status: ThreadStatus,
    #[serde(default)]
    pub refinement_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted trend, ordered within its thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub id: String,
    pub thread_id: String,
    pub title: String,
    pub summary: String,
    pub why_it_matters: String,
    pub confidence: Confidence,
    pub sources: Vec<Source>,
    pub order: usize,
    pub created_at: DateTime<Utc>,
}

impl TrendRecord {
    pub fn from_trend(thread_id: &str, order: usize, trend: &Trend) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.to_string(),
            title: trend.title.clone(),
            summary: trend.summary.clone(),
            why_it_matters: trend.why_it_matters.clone(),
            confidence: trend.confidence,
            sources: trend.sources.clone(),
            order,
            created_at: Utc::now(),
        }
    }
}

/// A persisted content idea, linked to the trends it draws on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdeaRecord {
    pub id: String,
    pub thread_id: String,
    pub trend_ids: Vec<String>,
    pub platform: Platform,
    pub hook: String,
    pub format: String,
    pub angle: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn create(&self, thread: Thread);
    async fn get(&self, thread_id: &str) -> Option<Thread>;
    async fn update_status(&self, thread_id: &str, status: ThreadStatus);
    async fn set_refinement_feedback(&self, thread_id: &str, feedback: Option<String>);
}

#[async_trait]
pub trait TrendStore: Send + Sync {
    async fn create(&self, trend: TrendRecord);
    async fn by_thread(&self, thread_id: &str) -> Vec<TrendRecord>;
    async fn delete_by_thread(&self, thread_id: &str);
}

#[async_trait]
pub trait IdeaStore: Send + Sync {
    async fn create(&self, idea: IdeaRecord);
    async fn by_thread(&self, thread_id: &str) -> Vec<IdeaRecord>;
    async fn delete_by_thread(&self, thread_id: &str);
}

/// In-memory [`ThreadStore`].
#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: RwLock<FxHashMap<String, Thread>>,
}

impl InMemoryThreadStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn create(&self, thread: Thread) {
        self.threads.write().await.insert(thread.id.clone(), thread);
    }

    async fn get(&self, thread_id: &str) -> Option<Thread> {
        self.threads.read().await.get(thread_id).cloned()
    }

    async fn update_status(&self, thread_id: &str, status: ThreadStatus) {
        if let Some(thread) = self.threads.write().await.get_mut(thread_id) {
            thread.status = status;
            thread.updated_at = Utc::now();
        }
    }

    async fn set_refinement_feedback(&self, thread_id: &str, feedback: Option<String>) {
        if let Some(thread) = self.threads.write().await.get_mut(thread_id) {
            thread.refinement_feedback = feedback;
            thread.updated_at = Utc::now();
        }
    }
}

/// In-memory [`TrendStore`].
#[derive(Default)]
pub struct InMemoryTrendStore {
    trends: RwLock<Vec<TrendRecord>>,
}

impl InMemoryTrendStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrendStore for InMemoryTrendStore {
    async fn create(&self, trend: TrendRecord) {
        self.trends.write().await.push(trend);
    }

    async fn by_thread(&self, thread_id: &str) -> Vec<TrendRecord> {
        let mut rows: Vec<TrendRecord> = self
            .trends
            .read()
            .await
            .iter()
            .filter(|t| t.thread_id == thread_id)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.order);
        rows
    }

    async fn delete_by_thread(&self, thread_id: &str) {
        self.trends.write().await.retain(|t| t.thread_id != thread_id);
    }
}

/// In-memory [`IdeaStore`].
#[derive(Default)]
pub struct InMemoryIdeaStore {
    ideas: RwLock<Vec<IdeaRecord>>,
}

impl InMemoryIdeaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdeaStore for InMemoryIdeaStore {
    async fn create(&self, idea: IdeaRecord) {
        self.ideas.write().await.push(idea);
    }

    async fn by_thread(&self, thread_id: &str) -> Vec<IdeaRecord> {
        self.ideas
            .read()
            .await
            .iter()
            .filter(|i| i.thread_id == thread_id)
            .cloned()
            .collect()
    }

    async fn delete_by_thread(&self, thread_id: &str) {
        self.ideas.write().await.retain(|i| i.thread_id != thread_id);
    }
}
