//! Orchestration coordinator: external triggers in, engine invocations and
//! deferred tasks out.
//!
//! Each trigger validates synchronously, enqueues a deferred task, and
//! returns an accepted acknowledgment; the caller never waits for the
//! pipeline. The deferred tasks drive the engine and translate its event
//! stream into durable side effects (thread status transitions, persisted
//! trends and ideas). Idea generation additionally fans out one worker per
//! platform; the phase is complete once the count of distinct per-platform
//! completion signals reaches the platform count. That is a counting
//! barrier, not a lock; the workers share no mutable state.

pub mod scheduler;
pub mod stores;

pub use scheduler::{QueueScheduler, ScheduleError, Task, TaskScheduler};
pub use stores::{
    IdeaRecord, IdeaStore, InMemoryIdeaStore, InMemoryThreadStore, InMemoryTrendStore, Thread,
    ThreadStore, TrendRecord, TrendStore,
};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::checkpoint::{CheckpointStore, InMemoryCheckpointStore, StoreError};
use crate::clients::{LanguageModel, SearchProvider};
use crate::engine::{Engine, EngineError, Invocation, RunOutcome};
use crate::events::{EventKind, EventLog, ProgressEmitter, ProgressEvent};
use crate::state::{BrandContext, Trend, WorkflowState};
use crate::steps::{DecisionAction, ResumeDecision, ideas_for_trend};
use crate::types::{IDEA_PLATFORMS, Platform, StepKind, StreamKind, ThreadStatus};

const THREAD_TITLE_LEN: usize = 60;

#[derive(Debug, Error, Diagnostic)]
pub enum CoordinatorError {
    #[error("thread not found: {thread_id}")]
    #[diagnostic(code(trendloom::coordinator::thread_not_found))]
    ThreadNotFound { thread_id: String },

    #[error("cannot {action} thread in status {status}")]
    #[diagnostic(
        code(trendloom::coordinator::invalid_status),
        help("Check the thread's current status before triggering this action.")
    )]
    InvalidStatus {
        action: &'static str,
        status: ThreadStatus,
    },

    #[error("no trends found for thread {thread_id}; run research first")]
    #[diagnostic(code(trendloom::coordinator::no_trends))]
    NoTrends { thread_id: String },

    #[error(transparent)]
    #[diagnostic(code(trendloom::coordinator::schedule))]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    #[diagnostic(code(trendloom::coordinator::engine))]
    Engine(#[from] EngineError),

    #[error(transparent)]
    #[diagnostic(code(trendloom::coordinator::store))]
    Store(#[from] StoreError),
}

/// Acknowledgment returned by triggers: work was accepted, not finished.
#[derive(Clone, Debug, PartialEq)]
pub struct Accepted {
    pub started: bool,
    pub message: String,
}

impl Accepted {
    fn new(message: impl Into<String>) -> Self {
        Self {
            started: true,
            message: message.into(),
        }
    }
}

/// Builder wiring the coordinator's collaborators; in-memory defaults for
/// every store that is not supplied.
pub struct CoordinatorBuilder {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    threads: Option<Arc<dyn ThreadStore>>,
    trends: Option<Arc<dyn TrendStore>>,
    ideas: Option<Arc<dyn IdeaStore>>,
    events: Option<EventLog>,
    brand: Option<BrandContext>,
}

impl CoordinatorBuilder {
    pub fn new(model: Arc<dyn LanguageModel>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            model,
            search,
            checkpoints: None,
            threads: None,
            trends: None,
            ideas: None,
            events: None,
            brand: None,
        }
    }

    #[must_use]
    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    #[must_use]
    pub fn thread_store(mut self, store: Arc<dyn ThreadStore>) -> Self {
        self.threads = Some(store);
        self
    }

    #[must_use]
    pub fn trend_store(mut self, store: Arc<dyn TrendStore>) -> Self {
        self.trends = Some(store);
        self
    }

    #[must_use]
    pub fn idea_store(mut self, store: Arc<dyn IdeaStore>) -> Self {
        self.ideas = Some(store);
        self
    }

    #[must_use]
    pub fn event_log(mut self, log: EventLog) -> Self {
        self.events = Some(log);
        self
    }

    #[must_use]
    pub fn brand_context(mut self, brand: BrandContext) -> Self {
        self.brand = Some(brand);
        self
    }

    /// Build the coordinator plus the task-queue receiver to hand to
    /// [`Coordinator::serve`].
    pub fn build(self) -> (Coordinator, flume::Receiver<(Task, Duration)>) {
        let (scheduler, rx) = QueueScheduler::new();
        let coordinator = Coordinator {
            model: self.model,
            search: self.search,
            checkpoints: self
                .checkpoints
                .unwrap_or_else(|| Arc::new(InMemoryCheckpointStore::new())),
            threads: self
                .threads
                .unwrap_or_else(|| Arc::new(InMemoryThreadStore::new())),
            trends: self
                .trends
                .unwrap_or_else(|| Arc::new(InMemoryTrendStore::new())),
            ideas: self
                .ideas
                .unwrap_or_else(|| Arc::new(InMemoryIdeaStore::new())),
            events: self.events.unwrap_or_default(),
            brand: self.brand.unwrap_or_default(),
            scheduler: Arc::new(scheduler),
        };
        (coordinator, rx)
    }
}

/// Maps external triggers onto engine invocations and deferred work.
pub struct Coordinator {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    checkpoints: Arc<dyn CheckpointStore>,
    threads: Arc<dyn ThreadStore>,
    trends: Arc<dyn TrendStore>,
    ideas: Arc<dyn IdeaStore>,
    events: EventLog,
    brand: BrandContext,
    scheduler: Arc<dyn TaskScheduler>,
}

impl Coordinator {
    /// Spawn the worker loop that drains the task queue. One worker is
    /// enough; tasks for one thread must not run concurrently anyway (see
    /// [`Engine::run`] on concurrent resumes).
    pub fn serve(
        coordinator: Arc<Self>,
        rx: flume::Receiver<(Task, Duration)>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Ok((task, delay)) = rx.recv_async().await {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if let Err(e) = coordinator.run_task(task.clone()).await {
                    tracing::error!(?task, error = %e, "deferred task failed");
                }
            }
        })
    }

    /// The shared event log (progress events, queryable per thread+stream).
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The thread store (read access for callers polling status).
    #[must_use]
    pub fn threads(&self) -> &Arc<dyn ThreadStore> {
        &self.threads
    }

    #[must_use]
    pub fn trend_records(&self) -> &Arc<dyn TrendStore> {
        &self.trends
    }

    #[must_use]
    pub fn idea_records(&self) -> &Arc<dyn IdeaStore> {
        &self.ideas
    }

    // ------------------------------------------------------------------
    // Triggers (validate synchronously, defer the work)
    // ------------------------------------------------------------------

    /// Create a new idle thread for the given prompt.
    pub async fn create_thread(&self, user_prompt: impl Into<String>) -> Thread {
        let user_prompt = user_prompt.into();
        let mut title: String = user_prompt.chars().take(THREAD_TITLE_LEN).collect();
        if user_prompt.chars().count() > THREAD_TITLE_LEN {
            title.push_str("...");
        }
        let now = Utc::now();
        let thread = Thread {
            id: Uuid::new_v4().to_string(),
            title,
            user_prompt,
            status: ThreadStatus::Idle,
            refinement_feedback: None,
            created_at: now,
            updated_at: now,
        };
        self.threads.create(thread.clone()).await;
        thread
    }

    /// Kick off the research pipeline for a thread.
    #[instrument(skip(self), err)]
    pub async fn start_research(&self, thread_id: &str) -> Result<Accepted, CoordinatorError> {
        self.require_thread(thread_id).await?;
        self.scheduler
            .schedule(
                Task::RunResearch {
                    thread_id: thread_id.to_string(),
                },
                Duration::ZERO,
            )
            .await?;
        Ok(Accepted::new("Research started"))
    }

    /// Approve the reviewed trends; idea generation follows.
    #[instrument(skip(self), err)]
    pub async fn approve(&self, thread_id: &str) -> Result<Accepted, CoordinatorError> {
        let thread = self.require_thread(thread_id).await?;
        if thread.status != ThreadStatus::AwaitingApproval {
            return Err(CoordinatorError::InvalidStatus {
                action: "approve",
                status: thread.status,
            });
        }
        self.schedule_resume(thread_id, ResumeDecision::approved())
            .await?;
        Ok(Accepted::new("Ideas generation started"))
    }

    /// Send the research back for another pass with feedback.
    #[instrument(skip(self, feedback), err)]
    pub async fn refine(
        &self,
        thread_id: &str,
        feedback: impl Into<String>,
    ) -> Result<Accepted, CoordinatorError> {
        let thread = self.require_thread(thread_id).await?;
        if thread.status != ThreadStatus::AwaitingApproval {
            return Err(CoordinatorError::InvalidStatus {
                action: "refine",
                status: thread.status,
            });
        }
        self.schedule_resume(thread_id, ResumeDecision::refine(feedback))
            .await?;
        Ok(Accepted::new("Research refinement started"))
    }

    /// Wipe the thread's research and start over from a clean slate.
    #[instrument(skip(self), err)]
    pub async fn restart(&self, thread_id: &str) -> Result<Accepted, CoordinatorError> {
        self.require_thread(thread_id).await?;
        self.schedule_resume(thread_id, ResumeDecision::restart())
            .await?;
        Ok(Accepted::new("Thread restart initiated"))
    }

    /// Fan out fresh idea generation over the already-approved trends.
    #[instrument(skip(self), err)]
    pub async fn regenerate_ideas(&self, thread_id: &str) -> Result<Accepted, CoordinatorError> {
        let thread = self.require_thread(thread_id).await?;
        if thread.status != ThreadStatus::Completed {
            return Err(CoordinatorError::InvalidStatus {
                action: "regenerate ideas for",
                status: thread.status,
            });
        }
        self.schedule_fan_out(thread_id).await?;
        Ok(Accepted::new("Ideas regeneration started (parallel)"))
    }

    /// Start parallel idea generation for a thread that has trends.
    #[instrument(skip(self), err)]
    pub async fn start_ideas_generation(
        &self,
        thread_id: &str,
    ) -> Result<Accepted, CoordinatorError> {
        let thread = self.require_thread(thread_id).await?;
        let allowed = [
            ThreadStatus::GeneratingIdeas,
            ThreadStatus::AwaitingApproval,
            ThreadStatus::Completed,
        ];
        if !allowed.contains(&thread.status) {
            return Err(CoordinatorError::InvalidStatus {
                action: "generate ideas for",
                status: thread.status,
            });
        }
        if self.trends.by_thread(thread_id).await.is_empty() {
            return Err(CoordinatorError::NoTrends {
                thread_id: thread_id.to_string(),
            });
        }
        self.schedule_fan_out(thread_id).await?;
        Ok(Accepted::new("Ideas generation started (parallel)"))
    }

    // ------------------------------------------------------------------
    // Deferred tasks
    // ------------------------------------------------------------------

    /// Execute one deferred task. Public so hosts with their own scheduler
    /// can deliver tasks directly.
    pub async fn run_task(&self, task: Task) -> Result<(), CoordinatorError> {
        match task {
            Task::RunResearch { thread_id } => self.run_research(&thread_id).await,
            Task::ResumeApproval {
                thread_id,
                decision,
            } => self.resume_after_approval(&thread_id, decision).await,
            Task::FanOutIdeas { thread_id } => self.fan_out_ideas(&thread_id).await,
            Task::PlatformIdeas {
                thread_id,
                platform,
            } => self.platform_ideas(&thread_id, platform).await,
        }
    }

    #[instrument(skip(self), err)]
    async fn run_research(&self, thread_id: &str) -> Result<(), CoordinatorError> {
        let thread = self.require_thread(thread_id).await?;

        self.events.clear(thread_id, StreamKind::Research);
        self.threads
            .update_status(thread_id, ThreadStatus::Planning)
            .await;

        let state = WorkflowState::new(thread_id, thread.user_prompt)
            .with_refinement_feedback(thread.refinement_feedback);

        let outcome = self
            .drive_engine(thread_id, Invocation::Start { state }, true)
            .await;

        match outcome {
            Ok(RunOutcome::Interrupted { .. }) => {
                self.threads
                    .update_status(thread_id, ThreadStatus::AwaitingApproval)
                    .await;
                let trends_count = self.trends.by_thread(thread_id).await.len();
                self.events.append(
                    thread_id,
                    StreamKind::Research,
                    EventKind::Complete,
                    None,
                    json!({ "trends_count": trends_count }),
                );
                Ok(())
            }
            Ok(RunOutcome::Suspended { .. }) => {
                self.threads
                    .update_status(thread_id, ThreadStatus::AwaitingApproval)
                    .await;
                Ok(())
            }
            Ok(RunOutcome::Completed { .. }) => {
                self.threads
                    .update_status(thread_id, ThreadStatus::Completed)
                    .await;
                Ok(())
            }
            Ok(RunOutcome::Failed { error, .. }) => {
                self.threads
                    .update_status(thread_id, ThreadStatus::Error)
                    .await;
                tracing::warn!(thread = %thread_id, %error, "research run failed");
                Ok(())
            }
            Err(e) => {
                self.threads
                    .update_status(thread_id, ThreadStatus::Error)
                    .await;
                self.events.append(
                    thread_id,
                    StreamKind::Research,
                    EventKind::Error,
                    None,
                    json!({ "message": e.to_string() }),
                );
                Err(e)
            }
        }
    }

    /// Resume a suspended thread with a human decision.
    ///
    /// Restart never reaches the engine: it deletes checkpoints and research
    /// artifacts directly and resets the thread; the only path that also
    /// wipes checkpoint history.
    #[instrument(skip(self), err)]
    async fn resume_after_approval(
        &self,
        thread_id: &str,
        decision: ResumeDecision,
    ) -> Result<(), CoordinatorError> {
        self.require_thread(thread_id).await?;

        if decision.action == DecisionAction::Restart {
            tracing::info!(thread = %thread_id, "restart requested; clearing all state");
            self.checkpoints.delete_thread(thread_id).await?;
            self.trends.delete_by_thread(thread_id).await;
            self.ideas.delete_by_thread(thread_id).await;
            self.threads
                .update_status(thread_id, ThreadStatus::Idle)
                .await;
            self.threads.set_refinement_feedback(thread_id, None).await;
            self.events.clear(thread_id, StreamKind::Research);
            self.events.clear(thread_id, StreamKind::Ideas);
            return Ok(());
        }

        match decision.action {
            DecisionAction::Approved => {
                self.threads
                    .update_status(thread_id, ThreadStatus::GeneratingIdeas)
                    .await;
                self.events.clear(thread_id, StreamKind::Ideas);
            }
            DecisionAction::Refine => {
                self.threads
                    .update_status(thread_id, ThreadStatus::Planning)
                    .await;
                self.threads
                    .set_refinement_feedback(thread_id, decision.feedback.clone())
                    .await;
                self.trends.delete_by_thread(thread_id).await;
                self.events.clear(thread_id, StreamKind::Research);
            }
            _ => {}
        }

        let approved = decision.action == DecisionAction::Approved;
        let outcome = self
            .drive_engine(thread_id, Invocation::Resume { decision }, false)
            .await;

        match outcome {
            Ok(RunOutcome::Completed { .. }) => {
                self.threads
                    .update_status(thread_id, ThreadStatus::Completed)
                    .await;
                let ideas_count = self.ideas.by_thread(thread_id).await.len();
                self.events.append(
                    thread_id,
                    StreamKind::Ideas,
                    EventKind::Complete,
                    None,
                    json!({ "message": "Ideas generation complete", "ideas_count": ideas_count }),
                );
                Ok(())
            }
            Ok(RunOutcome::Interrupted { .. }) | Ok(RunOutcome::Suspended { .. }) => {
                self.threads
                    .update_status(thread_id, ThreadStatus::AwaitingApproval)
                    .await;
                let stream = if approved {
                    StreamKind::Ideas
                } else {
                    StreamKind::Research
                };
                self.events.append(
                    thread_id,
                    stream,
                    EventKind::Complete,
                    None,
                    json!({ "message": "Research complete" }),
                );
                Ok(())
            }
            Ok(RunOutcome::Failed { error, .. }) => {
                self.threads
                    .update_status(thread_id, ThreadStatus::Error)
                    .await;
                tracing::warn!(thread = %thread_id, %error, "resume failed");
                Ok(())
            }
            Err(e) => {
                self.threads
                    .update_status(thread_id, ThreadStatus::Error)
                    .await;
                Err(e)
            }
        }
    }

    #[instrument(skip(self), err)]
    async fn fan_out_ideas(&self, thread_id: &str) -> Result<(), CoordinatorError> {
        self.require_thread(thread_id).await?;
        let trends = self.trends.by_thread(thread_id).await;
        if trends.is_empty() {
            return Err(CoordinatorError::NoTrends {
                thread_id: thread_id.to_string(),
            });
        }

        self.ideas.delete_by_thread(thread_id).await;
        self.events.clear(thread_id, StreamKind::Ideas);
        self.threads
            .update_status(thread_id, ThreadStatus::GeneratingIdeas)
            .await;

        self.events.append(
            thread_id,
            StreamKind::Ideas,
            EventKind::NodeStart,
            Some("generate_ideas_coordinator".into()),
            json!({
                "message": "Starting parallel ideas generation...",
                "trends_count": trends.len(),
                "platforms": IDEA_PLATFORMS,
                "total_platforms": IDEA_PLATFORMS.len(),
            }),
        );

        for platform in IDEA_PLATFORMS {
            self.scheduler
                .schedule(
                    Task::PlatformIdeas {
                        thread_id: thread_id.to_string(),
                        platform,
                    },
                    Duration::ZERO,
                )
                .await?;
        }
        tracing::info!(thread = %thread_id, workers = IDEA_PLATFORMS.len(), "platform workers scheduled");
        Ok(())
    }

    /// One fan-out worker: generate and persist ideas for a single platform
    /// against the shared read-only trend list, then report completion.
    #[instrument(skip(self), err)]
    async fn platform_ideas(
        &self,
        thread_id: &str,
        platform: Platform,
    ) -> Result<(), CoordinatorError> {
        let node = format!("generate_ideas_{platform}");
        let trend_records = self.trends.by_thread(thread_id).await;
        if trend_records.is_empty() {
            self.events.append(
                thread_id,
                StreamKind::Ideas,
                EventKind::Error,
                Some(node),
                json!({ "message": "No trends found", "platform": platform }),
            );
            return Err(CoordinatorError::NoTrends {
                thread_id: thread_id.to_string(),
            });
        }

        let mut platform_ideas_count = 0usize;
        for (index, record) in trend_records.iter().enumerate() {
            self.events.append(
                thread_id,
                StreamKind::Ideas,
                EventKind::Token,
                Some(node.clone()),
                json!({ "message": format!("Generating ideas for: {}", record.title), "platform": platform }),
            );

            let trend = Trend {
                title: record.title.clone(),
                summary: record.summary.clone(),
                why_it_matters: record.why_it_matters.clone(),
                confidence: record.confidence,
                sources: record.sources.clone(),
            };
            let ideas = match ideas_for_trend(
                self.model.as_ref(),
                &self.brand,
                platform,
                &trend,
                index,
            )
            .await
            {
                Ok(ideas) => ideas,
                Err(e) => {
                    self.events.append(
                        thread_id,
                        StreamKind::Ideas,
                        EventKind::Error,
                        Some(node.clone()),
                        json!({ "message": e.to_string(), "platform": platform }),
                    );
                    continue;
                }
            };

            for idea in ideas {
                platform_ideas_count += 1;
                let record = IdeaRecord {
                    id: Uuid::new_v4().to_string(),
                    thread_id: thread_id.to_string(),
                    trend_ids: vec![trend_records[index].id.clone()],
                    platform,
                    hook: idea.hook.clone(),
                    format: idea.format.clone(),
                    angle: idea.angle.clone(),
                    description: idea.description.clone(),
                    created_at: Utc::now(),
                };
                let idea_id = record.id.clone();
                self.ideas.create(record).await;
                self.events.append(
                    thread_id,
                    StreamKind::Ideas,
                    EventKind::Idea,
                    Some(node.clone()),
                    json!({
                        "idea_id": idea_id,
                        "platform": platform,
                        "trend_title": trend_records[index].title,
                        "hook": idea.hook,
                        "format": idea.format,
                        "angle": idea.angle,
                        "description": idea.description,
                        "platform_ideas_count": platform_ideas_count,
                    }),
                );
            }
        }

        self.events.append(
            thread_id,
            StreamKind::Ideas,
            EventKind::Complete,
            Some(node),
            json!({
                "platform": platform,
                "ideas_count": platform_ideas_count,
                "message": format!("{platform} complete: {platform_ideas_count} ideas"),
            }),
        );
        tracing::info!(thread = %thread_id, %platform, ideas = platform_ideas_count, "platform worker done");

        self.promote_if_all_platforms_done(thread_id).await;
        Ok(())
    }

    /// The fan-in barrier: count distinct platforms that reported complete;
    /// promote the thread once every platform has.
    async fn promote_if_all_platforms_done(&self, thread_id: &str) {
        let events = self.events.by_thread(thread_id, StreamKind::Ideas);
        let mut completed: Vec<&str> = events
            .iter()
            .filter(|e| e.kind == EventKind::Complete)
            .filter_map(|e| e.data.get("platform").and_then(|p| p.as_str()))
            .collect();
        completed.sort_unstable();
        completed.dedup();

        if completed.len() >= IDEA_PLATFORMS.len() {
            self.threads
                .update_status(thread_id, ThreadStatus::Completed)
                .await;
            tracing::info!(thread = %thread_id, "all platforms done; thread completed");
        }
    }

    // ------------------------------------------------------------------
    // Engine plumbing
    // ------------------------------------------------------------------

    async fn drive_engine(
        &self,
        thread_id: &str,
        invocation: Invocation,
        update_statuses: bool,
    ) -> Result<RunOutcome, CoordinatorError> {
        let (emitter, rx) = ProgressEmitter::channel(self.events.clone());
        let engine = Engine::with_default_steps(
            self.model.clone(),
            self.search.clone(),
            self.checkpoints.clone(),
            emitter,
        );

        let consumer = tokio::spawn(consume_stream(
            rx,
            self.threads.clone(),
            self.trends.clone(),
            self.ideas.clone(),
            thread_id.to_string(),
            update_statuses,
        ));

        let outcome = engine.run(thread_id, invocation).await;
        // Dropping the engine drops the last sender, letting the consumer
        // drain the tail of the stream and exit.
        drop(engine);
        let _ = consumer.await;

        Ok(outcome?)
    }

    async fn require_thread(&self, thread_id: &str) -> Result<Thread, CoordinatorError> {
        self.threads
            .get(thread_id)
            .await
            .ok_or_else(|| CoordinatorError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            })
    }

    async fn schedule_resume(
        &self,
        thread_id: &str,
        decision: ResumeDecision,
    ) -> Result<(), CoordinatorError> {
        self.scheduler
            .schedule(
                Task::ResumeApproval {
                    thread_id: thread_id.to_string(),
                    decision,
                },
                Duration::ZERO,
            )
            .await?;
        Ok(())
    }

    async fn schedule_fan_out(&self, thread_id: &str) -> Result<(), CoordinatorError> {
        self.scheduler
            .schedule(
                Task::FanOutIdeas {
                    thread_id: thread_id.to_string(),
                },
                Duration::ZERO,
            )
            .await?;
        Ok(())
    }
}

/// Translate the engine's per-step outputs into durable side effects.
///
/// Runs alongside the engine; ends when the stream closes. Status updates
/// happen only for fresh research runs; resume drivers set statuses up
/// front and once the outcome is known.
async fn consume_stream(
    rx: flume::Receiver<ProgressEvent>,
    threads: Arc<dyn ThreadStore>,
    trends: Arc<dyn TrendStore>,
    ideas: Arc<dyn IdeaStore>,
    thread_id: String,
    update_statuses: bool,
) {
    use futures_util::StreamExt;

    let mut last_status: Option<ThreadStatus> = None;
    let mut trend_order = 0usize;
    let mut events = rx.into_stream();

    while let Some(event) = events.next().await {
        match event.kind {
            EventKind::NodeStart if update_statuses => {
                let Some(kind) = event
                    .node
                    .as_deref()
                    .and_then(|n| serde_json::from_value::<StepKind>(json!(n)).ok())
                else {
                    continue;
                };
                let status = kind.status();
                if last_status != Some(status) {
                    last_status = Some(status);
                    threads.update_status(&thread_id, status).await;
                }
            }
            EventKind::Trend => {
                let Ok(trend) = serde_json::from_value::<Trend>(event.data["trend"].clone())
                else {
                    continue;
                };
                trends
                    .create(TrendRecord::from_trend(&thread_id, trend_order, &trend))
                    .await;
                trend_order += 1;
            }
            EventKind::Idea => {
                let Ok(idea) =
                    serde_json::from_value::<crate::state::Idea>(event.data["idea"].clone())
                else {
                    continue;
                };
                let records = trends.by_thread(&thread_id).await;
                // Fall back to linking every trend when the index is stale.
                let trend_ids: Vec<String> = records
                    .get(idea.trend_index)
                    .map(|r| vec![r.id.clone()])
                    .unwrap_or_else(|| records.iter().map(|r| r.id.clone()).collect());
                ideas
                    .create(IdeaRecord {
                        id: Uuid::new_v4().to_string(),
                        thread_id: thread_id.clone(),
                        trend_ids,
                        platform: idea.platform,
                        hook: idea.hook,
                        format: idea.format,
                        angle: idea.angle,
                        description: idea.description,
                        created_at: Utc::now(),
                    })
                    .await;
            }
            _ => {}
        }
    }
}
