//! Research planning step: user prompt in, keyword plan out.

use std::sync::Arc;

use async_trait::async_trait;

use crate::clients::{CompletionRequest, LanguageModel, parse_json_reply};
use crate::prompts::{PLAN_RESEARCH_PROMPT, REFINEMENT_PROMPT};
use crate::state::{Patch, ResearchPlan, StateUpdate, WorkflowState};
use crate::types::ThreadStatus;

use super::{Step, StepContext, StepError};

/// Asks the model for a [`ResearchPlan`]. When refinement feedback and a
/// previous plan are present, the refinement prompt variant is used so the
/// new plan adjusts the old one instead of starting cold.
pub struct PlanResearchStep {
    model: Arc<dyn LanguageModel>,
}

impl PlanResearchStep {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step for PlanResearchStep {
    async fn run(
        &self,
        state: &WorkflowState,
        _ctx: &mut StepContext,
    ) -> Result<StateUpdate, StepError> {
        tracing::debug!(
            thread = %state.thread_id,
            feedback = ?state.refinement_feedback,
            "planning research"
        );

        let (system, user) = match (&state.refinement_feedback, &state.research_plan) {
            (Some(feedback), Some(previous)) => {
                let system = REFINEMENT_PROMPT
                    .replace("{previous_keywords}", &previous.keywords.join(", "))
                    .replace("{feedback}", feedback);
                let user = format!(
                    "Original request: {}\nFeedback: {}",
                    state.user_prompt, feedback
                );
                (system, user)
            }
            _ => (PLAN_RESEARCH_PROMPT.to_string(), state.user_prompt.clone()),
        };

        let reply = self
            .model
            .complete(CompletionRequest::new(system, user, 0.3))
            .await?;
        let plan: ResearchPlan = parse_json_reply(&reply, "research plan")?;

        tracing::debug!(keywords = ?plan.keywords, timeframe = %plan.timeframe, "plan generated");

        Ok(StateUpdate {
            research_plan: Patch::Set(plan),
            current_step: Some(ThreadStatus::Planning),
            error: Patch::Clear,
            ..Default::default()
        })
    }
}
