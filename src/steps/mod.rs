//! Step execution framework: the [`Step`] trait, execution context, and the
//! interrupt primitive.
//!
//! A step is a pure function of the current state that returns a partial
//! update. Steps must be safe to re-execute from their start up to their
//! first interrupt call: resume replays the interrupted step, so everything
//! before the interrupt has to be pure computation or idempotent persistence.
//! That contract is what makes checkpoint-replay resume correct.

mod approval;
mod ideas;
mod plan;
mod search;
mod synthesize;

pub use approval::{
    AwaitApprovalStep, DecisionAction, InterruptPayload, ResumeDecision, SourceLink, TrendSummary,
};
pub use ideas::{GenerateIdeasStep, ideas_for_trend};
pub use plan::PlanResearchStep;
pub use search::SearchStep;
pub use synthesize::SynthesizeStep;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::clients::ClientError;
use crate::events::{EventKind, ProgressEmitter};
use crate::state::{StateUpdate, WorkflowState};
use crate::types::StepKind;

/// One unit of work in the pipeline.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &mut StepContext,
    ) -> Result<StateUpdate, StepError>;
}

/// Execution context handed to a step for one invocation.
pub struct StepContext {
    /// Thread being executed.
    pub thread_id: String,
    /// Which step this context belongs to.
    pub kind: StepKind,
    /// Steps completed so far on this thread (across invocations).
    pub step: u64,
    /// Task identity for pending writes produced by this step invocation.
    pub task_id: String,
    resume: Option<Value>,
    emitter: ProgressEmitter,
}

impl StepContext {
    pub(crate) fn new(
        thread_id: String,
        kind: StepKind,
        step: u64,
        task_id: String,
        resume: Option<Value>,
        emitter: ProgressEmitter,
    ) -> Self {
        Self {
            thread_id,
            kind,
            step,
            task_id,
            resume,
            emitter,
        }
    }

    /// Suspend this step pending external input, or receive the answer.
    ///
    /// On a fresh invocation there is no resume value: the call raises the
    /// [`StepError::Interrupted`] sentinel carrying the serialized payload,
    /// the engine records it as a pending write and halts. When the engine
    /// later replays this step with a resume decision injected, the same call
    /// site returns that decision and the rest of the step runs normally.
    pub fn interrupt<P, R>(&mut self, payload: &P) -> Result<R, StepError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        match self.resume.take() {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(StepError::Interrupted {
                payload: serde_json::to_value(payload)?,
            }),
        }
    }

    /// Emit a token-style progress message scoped to this step.
    pub fn emit_token(&self, message: impl Into<String>) {
        self.emitter.emit(
            &self.thread_id,
            self.kind.stream(),
            EventKind::Token,
            Some(self.kind.to_string()),
            serde_json::json!({ "token": message.into() }),
        );
    }
}

/// Errors raised by step execution.
///
/// `Interrupted` is not a failure: it is the suspension signal raised by
/// [`StepContext::interrupt`] and intercepted by the engine before it can
/// reach a caller. Every other variant is fatal for the invocation and
/// short-circuits the remaining steps.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    #[error("step interrupted pending external input")]
    #[diagnostic(code(trendloom::steps::interrupted))]
    Interrupted { payload: Value },

    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(trendloom::steps::missing_input),
        help("Check that the previous step produced the required data.")
    )]
    MissingInput { what: &'static str },

    #[error(transparent)]
    #[diagnostic(code(trendloom::steps::client))]
    Client(#[from] ClientError),

    #[error(transparent)]
    #[diagnostic(code(trendloom::steps::serde))]
    Serde(#[from] serde_json::Error),
}
