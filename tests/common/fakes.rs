//! Deterministic fakes for the provider seams.

use std::sync::Mutex;

use async_trait::async_trait;

use trendloom::clients::{ClientError, CompletionRequest, LanguageModel, SearchProvider};
use trendloom::coordinator::{InMemoryThreadStore, Thread, ThreadStore};
use trendloom::state::SearchHit;
use trendloom::types::ThreadStatus;

/// Language model that answers each pipeline prompt with canned JSON and
/// records every request for later assertions.
pub struct ScriptedModel {
    pub calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    /// System prompts seen so far.
    pub fn systems(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.system.clone())
            .collect()
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ClientError> {
        self.calls.lock().unwrap().push(request.clone());
        let system = &request.system;

        if system.contains("The user has provided feedback") {
            return Ok(r#"Refined plan:
{"keywords": ["b2b ai tools"], "timeframe": "past_week", "domain": "b2b", "region": null}"#
                .to_string());
        }
        if system.contains("create a research plan") {
            return Ok(r#"Here you go:
{"keywords": ["ai tooling", "generative ai"], "timeframe": "past_week", "domain": "technology", "region": null}"#
                .to_string());
        }
        if system.contains("synthesize search results") {
            return Ok(r#"```json
{"trends": [
  {"title": "Agents move into CI", "summary": "s1", "why_it_matters": "w1",
   "confidence": "high", "source_indices": [0, 1]},
  {"title": "Local models get practical", "summary": "s2", "why_it_matters": "w2",
   "confidence": "medium", "source_indices": [2]}
]}
```"#
                .to_string());
        }
        if system.contains("content strategist") {
            return Ok(r#"{"ideas": [
  {"hook": "h1", "format": "post", "angle": "a1", "description": "d1"},
  {"hook": "h2", "format": "thread", "angle": "a2", "description": "d2"}
]}"#
            .to_string());
        }

        let head: String = system.chars().take(60).collect();
        Err(ClientError::Provider {
            provider: "scripted",
            message: format!("no script for prompt: {head}"),
        })
    }
}

/// Language model that always fails, for error-path tests.
pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, ClientError> {
        Err(ClientError::Provider {
            provider: "failing",
            message: "model unavailable".into(),
        })
    }
}

/// Search provider returning three ranked hits per query with unique URLs.
pub struct StaticSearch;

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError> {
        let slug = query.replace(' ', "-");
        Ok((0..3)
            .map(|i| SearchHit {
                title: format!("{query} result {i}"),
                url: format!("https://example.com/{slug}/{i}"),
                content: format!("Detailed coverage of {query}, item {i}."),
                score: 0.9 - (i as f64) * 0.1,
                published_at: Some("2026-08-01".into()),
            })
            .collect())
    }
}

/// Thread store wrapper that records every status transition in order.
pub struct RecordingThreadStore {
    inner: InMemoryThreadStore,
    pub statuses: Mutex<Vec<ThreadStatus>>,
}

impl RecordingThreadStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryThreadStore::new(),
            statuses: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<ThreadStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

impl Default for RecordingThreadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThreadStore for RecordingThreadStore {
    async fn create(&self, thread: Thread) {
        self.inner.create(thread).await;
    }

    async fn get(&self, thread_id: &str) -> Option<Thread> {
        self.inner.get(thread_id).await
    }

    async fn update_status(&self, thread_id: &str, status: ThreadStatus) {
        self.statuses.lock().unwrap().push(status);
        self.inner.update_status(thread_id, status).await;
    }

    async fn set_refinement_feedback(&self, thread_id: &str, feedback: Option<String>) {
        self.inner.set_refinement_feedback(thread_id, feedback).await;
    }
}
