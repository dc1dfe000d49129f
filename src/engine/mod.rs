//! The resumable step-function engine.
//!
//! The topology is fixed and small, so the graph is data: an explicit
//! handler table keyed by [`StepKind`] plus one routing function. Execution
//! is sequential: run a step, fold its update through the per-field
//! reducers, persist one checkpoint, route. An interrupt raised inside a
//! step halts the loop, records the payload as a pending write against the
//! current checkpoint, and surfaces it to the caller; a later resume loads
//! the latest checkpoint and replays the recorded frontier step with the
//! decision injected.
//!
//! ```text
//! plan_research -> search -> synthesize -> await_approval
//!       ^                                       |
//!       |  refine / restart          approved   v
//!       +---------------------- generate_ideas -> end
//!                        (pending: suspend)
//! ```

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::checkpoint::{
    Checkpoint, CheckpointMetadata, CheckpointStore, PendingWrite, PersistedRun, StoreError,
    next_checkpoint_id,
};
use crate::clients::{LanguageModel, SearchProvider};
use crate::events::{EventKind, ProgressEmitter};
use crate::state::{StateUpdate, WorkflowState};
use crate::steps::{
    AwaitApprovalStep, GenerateIdeasStep, PlanResearchStep, ResumeDecision, SearchStep, Step,
    StepContext, StepError, SynthesizeStep,
};
use crate::types::{HitlStatus, StepKind, StreamKind};

/// Pending-write channel name reserved for interrupt payloads.
pub const INTERRUPT_CHANNEL: &str = "__interrupt__";

/// Namespace used for top-level (non-nested) executions.
pub const DEFAULT_NAMESPACE: &str = "";

/// How an engine invocation begins.
#[derive(Debug)]
pub enum Invocation {
    /// Run the pipeline from the entry step with the given state.
    Start { state: WorkflowState },
    /// Re-enter the interrupted step recorded in the latest checkpoint,
    /// feeding it the decision.
    Resume { decision: ResumeDecision },
}

/// Terminal result of one engine invocation.
#[derive(Debug)]
pub enum RunOutcome {
    /// The pipeline reached its end.
    Completed { state: WorkflowState },
    /// A step suspended awaiting external input; the payload describes what
    /// is needed. Opaque to the engine.
    Interrupted { payload: Value },
    /// Routing found no usable decision (hitl pending); the invocation
    /// terminates and the graph stays resumable at the same step.
    Suspended { state: WorkflowState },
    /// A step failed; the error is folded into the state and persisted.
    Failed { error: String, state: WorkflowState },
}

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("no checkpoint to resume for thread {thread_id}")]
    #[diagnostic(
        code(trendloom::engine::no_checkpoint),
        help("Resume requires a prior run that reached a checkpoint.")
    )]
    NoCheckpoint { thread_id: String },

    #[error("thread {thread_id} is not suspended; nothing to resume")]
    #[diagnostic(code(trendloom::engine::not_suspended))]
    NotSuspended { thread_id: String },

    #[error("no handler registered for step {kind}")]
    #[diagnostic(code(trendloom::engine::unknown_step))]
    UnknownStep { kind: StepKind },

    #[error(transparent)]
    #[diagnostic(code(trendloom::engine::store))]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(code(trendloom::engine::serde))]
    Serde(#[from] serde_json::Error),
}

/// Where routing sends execution after a completed step.
enum Route {
    Next(StepKind),
    Suspend,
    End,
}

fn route_after(kind: StepKind, state: &WorkflowState) -> Route {
    match kind {
        StepKind::PlanResearch => Route::Next(StepKind::Search),
        StepKind::Search => Route::Next(StepKind::Synthesize),
        StepKind::Synthesize => Route::Next(StepKind::AwaitApproval),
        StepKind::AwaitApproval => match state.hitl_status {
            Some(HitlStatus::Approved) => Route::Next(StepKind::GenerateIdeas),
            Some(HitlStatus::Refine) | Some(HitlStatus::Restart) => {
                Route::Next(StepKind::PlanResearch)
            }
            Some(HitlStatus::Pending) | None => Route::Suspend,
        },
        StepKind::GenerateIdeas => Route::End,
    }
}

/// Executes the fixed pipeline over a checkpoint store.
///
/// Concurrent invocations against the same thread are not serialized here:
/// both would resume from the same latest checkpoint and race on subsequent
/// puts. Callers must serialize resumes per thread.
pub struct Engine {
    steps: FxHashMap<StepKind, Arc<dyn Step>>,
    store: Arc<dyn CheckpointStore>,
    emitter: ProgressEmitter,
    checkpoint_ns: String,
}

impl Engine {
    /// Engine with an explicit handler table.
    pub fn new(
        steps: FxHashMap<StepKind, Arc<dyn Step>>,
        store: Arc<dyn CheckpointStore>,
        emitter: ProgressEmitter,
    ) -> Self {
        Self {
            steps,
            store,
            emitter,
            checkpoint_ns: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Engine wired with the five pipeline steps over injected clients.
    pub fn with_default_steps(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        store: Arc<dyn CheckpointStore>,
        emitter: ProgressEmitter,
    ) -> Self {
        let mut steps: FxHashMap<StepKind, Arc<dyn Step>> = FxHashMap::default();
        steps.insert(
            StepKind::PlanResearch,
            Arc::new(PlanResearchStep::new(model.clone())),
        );
        steps.insert(StepKind::Search, Arc::new(SearchStep::new(search)));
        steps.insert(
            StepKind::Synthesize,
            Arc::new(SynthesizeStep::new(model.clone())),
        );
        steps.insert(StepKind::AwaitApproval, Arc::new(AwaitApprovalStep));
        steps.insert(
            StepKind::GenerateIdeas,
            Arc::new(GenerateIdeasStep::new(model)),
        );
        Self::new(steps, store, emitter)
    }

    /// Run one invocation to its terminal outcome.
    #[instrument(skip(self, invocation), err)]
    pub async fn run(
        &self,
        thread_id: &str,
        invocation: Invocation,
    ) -> Result<RunOutcome, EngineError> {
        let latest = self
            .store
            .get(thread_id, &self.checkpoint_ns, None)
            .await?;

        let (mut state, mut next, mut step_counter, mut parent_id, mut resume) = match invocation {
            Invocation::Start { state } => {
                let step = latest.as_ref().map_or(0, |cp| {
                    PersistedRun::decode(&cp.checkpoint)
                        .map(|run| run.step)
                        .unwrap_or(0)
                });
                (
                    state,
                    Some(StepKind::PlanResearch),
                    step,
                    latest.map(|cp| cp.checkpoint_id),
                    None,
                )
            }
            Invocation::Resume { decision } => {
                let checkpoint = latest.ok_or_else(|| EngineError::NoCheckpoint {
                    thread_id: thread_id.to_string(),
                })?;
                let run = PersistedRun::decode(&checkpoint.checkpoint)?;
                let frontier = run.next.ok_or_else(|| EngineError::NotSuspended {
                    thread_id: thread_id.to_string(),
                })?;
                tracing::info!(
                    thread = %thread_id,
                    checkpoint = %checkpoint.checkpoint_id,
                    step = %frontier,
                    "resuming from checkpoint"
                );
                (
                    run.state,
                    Some(frontier),
                    run.step,
                    Some(checkpoint.checkpoint_id),
                    Some(serde_json::to_value(&decision)?),
                )
            }
        };

        while let Some(kind) = next {
            let stream = kind.stream();
            self.emitter.emit(
                thread_id,
                stream,
                EventKind::NodeStart,
                Some(kind.to_string()),
                json!({ "message": kind.start_message() }),
            );

            let handler = self
                .steps
                .get(&kind)
                .ok_or(EngineError::UnknownStep { kind })?
                .clone();
            let mut ctx = StepContext::new(
                thread_id.to_string(),
                kind,
                step_counter,
                Uuid::new_v4().to_string(),
                resume.take(),
                self.emitter.clone(),
            );

            match handler.run(&state, &mut ctx).await {
                Ok(update) => {
                    self.emit_step_outputs(thread_id, kind, &update);
                    state.apply(update);
                    step_counter += 1;

                    let route = route_after(kind, &state);
                    let persisted_next = match &route {
                        Route::Next(next_kind) => Some(*next_kind),
                        // Keep the frontier on the suspended step so a later
                        // resume replays it.
                        Route::Suspend => Some(kind),
                        Route::End => None,
                    };
                    parent_id = Some(
                        self.persist_checkpoint(
                            thread_id,
                            &state,
                            persisted_next,
                            step_counter,
                            parent_id.take(),
                            "loop",
                            Some(kind),
                        )
                        .await?,
                    );

                    self.emitter.emit(
                        thread_id,
                        stream,
                        EventKind::NodeEnd,
                        Some(kind.to_string()),
                        Value::Null,
                    );

                    match route {
                        Route::Next(next_kind) => next = Some(next_kind),
                        Route::Suspend => {
                            tracing::info!(thread = %thread_id, "invocation suspended (hitl pending)");
                            return Ok(RunOutcome::Suspended { state });
                        }
                        Route::End => {
                            tracing::info!(thread = %thread_id, steps = step_counter, "run completed");
                            return Ok(RunOutcome::Completed { state });
                        }
                    }
                }
                Err(StepError::Interrupted { payload }) => {
                    let checkpoint_id = match parent_id {
                        Some(id) => id,
                        // Interrupt before any checkpoint exists: seed one so
                        // the pending write has a row to hang off.
                        None => {
                            self.persist_checkpoint(
                                thread_id,
                                &state,
                                Some(kind),
                                step_counter,
                                None,
                                "input",
                                None,
                            )
                            .await?
                        }
                    };
                    self.store
                        .put_writes(vec![PendingWrite {
                            thread_id: thread_id.to_string(),
                            checkpoint_ns: self.checkpoint_ns.clone(),
                            checkpoint_id,
                            task_id: ctx.task_id.clone(),
                            idx: 0,
                            channel: INTERRUPT_CHANNEL.to_string(),
                            value: crate::serde_ext::encode_json(&payload)
                                .map_err(StoreError::from)?,
                            created_at: chrono::Utc::now(),
                        }])
                        .await?;
                    tracing::info!(thread = %thread_id, step = %kind, "interrupted awaiting input");
                    return Ok(RunOutcome::Interrupted { payload });
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(thread = %thread_id, step = %kind, error = %message, "step failed");
                    state.apply(StateUpdate::failed(message.clone()));
                    step_counter += 1;
                    self.persist_checkpoint(
                        thread_id,
                        &state,
                        None,
                        step_counter,
                        parent_id.take(),
                        "loop",
                        Some(kind),
                    )
                    .await?;
                    self.emitter.emit(
                        thread_id,
                        stream,
                        EventKind::Error,
                        Some(kind.to_string()),
                        json!({ "message": message }),
                    );
                    return Ok(RunOutcome::Failed {
                        error: message,
                        state,
                    });
                }
            }
        }

        Ok(RunOutcome::Completed { state })
    }

    async fn persist_checkpoint(
        &self,
        thread_id: &str,
        state: &WorkflowState,
        next: Option<StepKind>,
        step: u64,
        parent_id: Option<String>,
        source: &str,
        node: Option<StepKind>,
    ) -> Result<String, EngineError> {
        let checkpoint_id = next_checkpoint_id(step);
        let run = PersistedRun {
            state: state.clone(),
            next,
            step,
        };
        let metadata = CheckpointMetadata {
            source: source.to_string(),
            step,
            node,
        };
        self.store
            .put(Checkpoint {
                thread_id: thread_id.to_string(),
                checkpoint_ns: self.checkpoint_ns.clone(),
                checkpoint_id: checkpoint_id.clone(),
                parent_checkpoint_id: parent_id,
                checkpoint: run.encode()?,
                metadata: metadata.encode()?,
                created_at: chrono::Utc::now(),
            })
            .await?;
        tracing::debug!(thread = %thread_id, checkpoint = %checkpoint_id, step, "checkpoint persisted");
        Ok(checkpoint_id)
    }

    /// Translate what a step produced into the domain events of its stream.
    fn emit_step_outputs(&self, thread_id: &str, kind: StepKind, update: &StateUpdate) {
        match kind {
            StepKind::PlanResearch => {
                if let crate::state::Patch::Set(plan) = &update.research_plan {
                    self.emitter.emit(
                        thread_id,
                        StreamKind::Research,
                        EventKind::Plan,
                        Some(kind.to_string()),
                        json!({ "keywords": plan.keywords, "timeframe": plan.timeframe }),
                    );
                }
            }
            StepKind::Search => {
                if let Some(results) = &update.search_results {
                    self.emitter.emit(
                        thread_id,
                        StreamKind::Research,
                        EventKind::SearchResults,
                        Some(kind.to_string()),
                        json!({ "count": results.len() }),
                    );
                }
            }
            StepKind::Synthesize => {
                if let Some(trends) = &update.trends {
                    for trend in trends {
                        self.emitter.emit(
                            thread_id,
                            StreamKind::Research,
                            EventKind::Trend,
                            Some(kind.to_string()),
                            json!({ "trend": trend }),
                        );
                    }
                }
            }
            StepKind::GenerateIdeas => {
                if let Some(ideas) = &update.ideas {
                    for idea in ideas {
                        self.emitter.emit(
                            thread_id,
                            StreamKind::Ideas,
                            EventKind::Idea,
                            Some(kind.to_string()),
                            json!({ "idea": idea }),
                        );
                    }
                }
            }
            StepKind::AwaitApproval => {}
        }
    }
}
