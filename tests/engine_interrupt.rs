mod common;

use std::sync::Arc;

use common::{FailingModel, ScriptedModel, StaticSearch};
use trendloom::checkpoint::{
    CheckpointStore, InMemoryCheckpointStore, PersistedRun,
};
use trendloom::engine::{
    DEFAULT_NAMESPACE, Engine, EngineError, INTERRUPT_CHANNEL, Invocation, RunOutcome,
};
use trendloom::events::{EventKind, EventLog, ProgressEmitter};
use trendloom::state::WorkflowState;
use trendloom::steps::{InterruptPayload, ResumeDecision};
use trendloom::types::{HitlStatus, StepKind, StreamKind, ThreadStatus};

struct Harness {
    engine: Engine,
    model: Arc<ScriptedModel>,
    store: Arc<InMemoryCheckpointStore>,
    log: EventLog,
}

fn harness() -> Harness {
    let model = Arc::new(ScriptedModel::new());
    let store = Arc::new(InMemoryCheckpointStore::new());
    let log = EventLog::new();
    let (emitter, _rx) = ProgressEmitter::channel(log.clone());
    let engine = Engine::with_default_steps(
        model.clone(),
        Arc::new(StaticSearch),
        store.clone(),
        emitter,
    );
    Harness {
        engine,
        model,
        store,
        log,
    }
}

async fn latest_run(store: &InMemoryCheckpointStore, thread: &str) -> PersistedRun {
    let checkpoint = store
        .get(thread, DEFAULT_NAMESPACE, None)
        .await
        .unwrap()
        .expect("latest checkpoint exists");
    PersistedRun::decode(&checkpoint.checkpoint).unwrap()
}

async fn run_to_interrupt(h: &Harness, thread: &str) -> InterruptPayload {
    let outcome = h
        .engine
        .run(
            thread,
            Invocation::Start {
                state: WorkflowState::new(thread, "AI trends"),
            },
        )
        .await
        .unwrap();
    match outcome {
        RunOutcome::Interrupted { payload } => serde_json::from_value(payload).unwrap(),
        other => panic!("expected interrupt, got {other:?}"),
    }
}

#[tokio::test]
async fn fresh_run_interrupts_with_review_payload() {
    let h = harness();
    let payload = run_to_interrupt(&h, "t1").await;

    assert_eq!(payload.trends.len(), 2);
    assert_eq!(payload.options, ["approved", "refine", "restart"]);
    assert!(!payload.message.is_empty());
    assert!(!payload.trends[0].sources.is_empty());

    // One checkpoint per completed step: plan, search, synthesize.
    let history = h.store.list("t1", DEFAULT_NAMESPACE, 10, None).await.unwrap();
    assert_eq!(history.len(), 3);
    // Parent pointers chain oldest -> newest.
    assert!(history[2].parent_checkpoint_id.is_none());
    assert_eq!(
        history[1].parent_checkpoint_id.as_deref(),
        Some(history[2].checkpoint_id.as_str())
    );
    assert_eq!(
        history[0].parent_checkpoint_id.as_deref(),
        Some(history[1].checkpoint_id.as_str())
    );

    // The frontier is the suspended step and the interrupt payload is
    // recorded as a pending write against the latest checkpoint.
    let run = latest_run(&h.store, "t1").await;
    assert_eq!(run.next, Some(StepKind::AwaitApproval));
    assert_eq!(run.state.trends.len(), 2);
    assert!(!run.state.search_results.is_empty());
    let writes = h
        .store
        .pending_writes("t1", DEFAULT_NAMESPACE, &history[0].checkpoint_id)
        .await
        .unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].channel, INTERRUPT_CHANNEL);
}

#[tokio::test]
async fn resume_approved_keeps_trends_and_generates_ideas() {
    let h = harness();
    run_to_interrupt(&h, "t1").await;

    let outcome = h
        .engine
        .run(
            "t1",
            Invocation::Resume {
                decision: ResumeDecision::approved(),
            },
        )
        .await
        .unwrap();

    let state = match outcome {
        RunOutcome::Completed { state } => state,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(state.hitl_status, Some(HitlStatus::Approved));
    // Approval must not clear the reviewed trends.
    assert_eq!(state.trends.len(), 2);
    // 2 trends x 3 platforms x 2 ideas per reply.
    assert_eq!(state.ideas.len(), 12);
    assert!(state.error.is_none());

    let idea_events = h
        .log
        .by_thread("t1", StreamKind::Ideas)
        .into_iter()
        .filter(|e| e.kind == EventKind::Idea)
        .count();
    assert_eq!(idea_events, 12);
}

#[tokio::test]
async fn resume_refine_clears_research_and_replans_with_feedback() {
    let h = harness();
    run_to_interrupt(&h, "t1").await;

    let outcome = h
        .engine
        .run(
            "t1",
            Invocation::Resume {
                decision: ResumeDecision::refine("focus on B2B"),
            },
        )
        .await
        .unwrap();

    // The refined pipeline runs back through plan/search/synthesize and
    // suspends at approval again.
    assert!(matches!(outcome, RunOutcome::Interrupted { .. }));

    let run = latest_run(&h.store, "t1").await;
    assert_eq!(run.state.refinement_feedback.as_deref(), Some("focus on B2B"));
    assert_eq!(
        run.state.research_plan.as_ref().unwrap().keywords,
        ["b2b ai tools"]
    );
    assert_eq!(run.state.trends.len(), 2);
    assert_eq!(run.next, Some(StepKind::AwaitApproval));

    // The refine decision checkpoint cleared trends and search results and
    // routed back to planning.
    let history = h.store.list("t1", DEFAULT_NAMESPACE, 20, None).await.unwrap();
    let refine_point = history
        .iter()
        .map(|cp| PersistedRun::decode(&cp.checkpoint).unwrap())
        .find(|run| run.state.hitl_status == Some(HitlStatus::Refine) && run.state.trends.is_empty())
        .expect("refine checkpoint exists");
    assert!(refine_point.state.search_results.is_empty());
    assert_eq!(refine_point.next, Some(StepKind::PlanResearch));

    // The plan step saw the feedback through the refinement prompt.
    assert!(
        h.model
            .systems()
            .iter()
            .any(|system| system.contains("focus on B2B"))
    );
}

#[tokio::test]
async fn unknown_decision_returns_graph_to_pending() {
    let h = harness();
    run_to_interrupt(&h, "t1").await;

    let decision: ResumeDecision =
        serde_json::from_str(r#"{"action": "escalate"}"#).unwrap();
    let outcome = h
        .engine
        .run("t1", Invocation::Resume { decision })
        .await
        .unwrap();

    let state = match outcome {
        RunOutcome::Suspended { state } => state,
        other => panic!("expected suspension, got {other:?}"),
    };
    assert_eq!(state.hitl_status, Some(HitlStatus::Pending));
    assert!(state.error.as_deref().unwrap().contains("Unknown"));

    // Still resumable: the frontier stays on the approval step, and a valid
    // decision afterwards completes the run.
    let run = latest_run(&h.store, "t1").await;
    assert_eq!(run.next, Some(StepKind::AwaitApproval));
    let outcome = h
        .engine
        .run(
            "t1",
            Invocation::Resume {
                decision: ResumeDecision::approved(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
}

#[tokio::test]
async fn resume_without_checkpoint_is_an_error() {
    let h = harness();
    let err = h
        .engine
        .run(
            "ghost",
            Invocation::Resume {
                decision: ResumeDecision::approved(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoCheckpoint { .. }));
}

#[tokio::test]
async fn step_failure_is_folded_into_state_and_checkpointed() {
    let store = Arc::new(InMemoryCheckpointStore::new());
    let log = EventLog::new();
    let (emitter, _rx) = ProgressEmitter::channel(log.clone());
    let engine = Engine::with_default_steps(
        Arc::new(FailingModel),
        Arc::new(StaticSearch),
        store.clone(),
        emitter,
    );

    let outcome = engine
        .run(
            "t1",
            Invocation::Start {
                state: WorkflowState::new("t1", "AI trends"),
            },
        )
        .await
        .unwrap();

    let (error, state) = match outcome {
        RunOutcome::Failed { error, state } => (error, state),
        other => panic!("expected failure, got {other:?}"),
    };
    assert!(error.contains("model unavailable"));
    assert_eq!(state.current_step, ThreadStatus::Error);
    assert_eq!(state.error.as_deref(), Some(error.as_str()));

    // The failure checkpoint is terminal (no frontier) but partial progress
    // stays queryable.
    let run = latest_run(&store, "t1").await;
    assert_eq!(run.next, None);
    assert_eq!(run.state.current_step, ThreadStatus::Error);

    let errors = log
        .by_thread("t1", StreamKind::Research)
        .into_iter()
        .filter(|e| e.kind == EventKind::Error)
        .count();
    assert_eq!(errors, 1);
}
