//! Idea generation: the engine step and the shared per-trend helper the
//! fan-out workers reuse.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::clients::{ClientError, CompletionRequest, LanguageModel, parse_json_reply};
use crate::prompts::ideas_prompt;
use crate::state::{BrandContext, Idea, Patch, StateUpdate, Trend, WorkflowState};
use crate::types::{IDEA_PLATFORMS, Platform, ThreadStatus};

use super::{Step, StepContext, StepError};

#[derive(Deserialize)]
struct IdeasReply {
    ideas: Vec<IdeaFields>,
}

#[derive(Deserialize)]
struct IdeaFields {
    hook: String,
    format: String,
    angle: String,
    description: String,
}

/// Generate 2-3 ideas for one trend on one platform.
///
/// Shared between the in-graph [`GenerateIdeasStep`] and the coordinator's
/// per-platform workers. A reply the model mangles past recognition is
/// skipped with a warning instead of failing the whole batch, matching how
/// partial progress is treated everywhere else.
pub async fn ideas_for_trend(
    model: &dyn LanguageModel,
    brand: &BrandContext,
    platform: Platform,
    trend: &Trend,
    trend_index: usize,
) -> Result<Vec<Idea>, ClientError> {
    let system = ideas_prompt(brand, platform);
    let sources = trend
        .sources
        .iter()
        .map(|s| format!("- {}: {}", s.title, s.url))
        .collect::<Vec<_>>()
        .join("\n");
    let user = format!(
        "Generate 2-3 {platform} content ideas for this trend:\n\n\
         Trend: {title}\nSummary: {summary}\nWhy it matters: {why}\nSupporting sources:\n{sources}",
        platform = platform,
        title = trend.title,
        summary = trend.summary,
        why = trend.why_it_matters,
    );

    let reply = model
        .complete(CompletionRequest::new(system, user, 0.7))
        .await?;
    let parsed: IdeasReply = match parse_json_reply(&reply, "ideas") {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(%platform, trend_index, error = %e, "skipping unparseable ideas reply");
            return Ok(Vec::new());
        }
    };

    Ok(parsed
        .ideas
        .into_iter()
        .map(|fields| Idea {
            trend_index,
            platform,
            hook: fields.hook,
            format: fields.format,
            angle: fields.angle,
            description: fields.description,
        })
        .collect())
}

/// In-graph idea generation: every trend crossed with every target platform,
/// sequentially, appending to the state's idea list.
pub struct GenerateIdeasStep {
    model: Arc<dyn LanguageModel>,
}

impl GenerateIdeasStep {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step for GenerateIdeasStep {
    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &mut StepContext,
    ) -> Result<StateUpdate, StepError> {
        if state.trends.is_empty() {
            return Err(StepError::MissingInput { what: "trends" });
        }

        let mut all_ideas: Vec<Idea> = Vec::new();
        for (trend_index, trend) in state.trends.iter().enumerate() {
            ctx.emit_token(format!("Generating ideas for: {}", trend.title));
            for platform in IDEA_PLATFORMS {
                let ideas = ideas_for_trend(
                    self.model.as_ref(),
                    &state.brand_context,
                    platform,
                    trend,
                    trend_index,
                )
                .await?;
                all_ideas.extend(ideas);
            }
        }

        tracing::debug!(
            thread = %state.thread_id,
            ideas = all_ideas.len(),
            "idea generation complete"
        );

        Ok(StateUpdate {
            ideas: Some(all_ideas),
            current_step: Some(ThreadStatus::GeneratingIdeas),
            error: Patch::Clear,
            ..Default::default()
        })
    }
}
