//! Trend synthesis step: search results in, reviewed-ready trends out.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::clients::{CompletionRequest, LanguageModel, parse_json_reply};
use crate::prompts::SYNTHESIZE_PROMPT;
use crate::state::{Patch, Source, StateUpdate, Trend, WorkflowState};
use crate::types::{Confidence, ThreadStatus};

use super::{Step, StepContext, StepError};

/// Characters of result content quoted into a trend's source snippet.
const SNIPPET_LEN: usize = 200;
/// Characters of result content shown to the model per search result.
const CONTENT_LEN: usize = 500;

#[derive(Deserialize)]
struct SynthesisReply {
    trends: Vec<SynthesisTrend>,
}

#[derive(Deserialize)]
struct SynthesisTrend {
    title: String,
    summary: String,
    why_it_matters: String,
    confidence: Confidence,
    #[serde(default)]
    source_indices: Vec<usize>,
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Feeds indexed search results to the model and maps the returned source
/// indices back to [`Source`] citations. Also resets the HITL status so a
/// fresh approval round follows every synthesis.
pub struct SynthesizeStep {
    model: Arc<dyn LanguageModel>,
}

impl SynthesizeStep {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step for SynthesizeStep {
    async fn run(
        &self,
        state: &WorkflowState,
        _ctx: &mut StepContext,
    ) -> Result<StateUpdate, StepError> {
        if state.search_results.is_empty() {
            return Err(StepError::MissingInput {
                what: "search results",
            });
        }

        let formatted: Vec<serde_json::Value> = state
            .search_results
            .iter()
            .enumerate()
            .map(|(index, result)| {
                serde_json::json!({
                    "index": index,
                    "title": result.title,
                    "url": result.url,
                    "content": truncate_chars(&result.content, CONTENT_LEN),
                    "published_at": result.published_at,
                })
            })
            .collect();

        let user = format!(
            "Search results:\n{}\n\nUser's original request: {}",
            serde_json::to_string_pretty(&formatted)?,
            state.user_prompt
        );
        let reply = self
            .model
            .complete(CompletionRequest::new(SYNTHESIZE_PROMPT, user, 0.4))
            .await?;
        let synthesis: SynthesisReply = parse_json_reply(&reply, "synthesis")?;

        let trends: Vec<Trend> = synthesis
            .trends
            .into_iter()
            .map(|t| Trend {
                title: t.title,
                summary: t.summary,
                why_it_matters: t.why_it_matters,
                confidence: t.confidence,
                sources: t
                    .source_indices
                    .into_iter()
                    .filter(|i| *i < state.search_results.len())
                    .map(|i| {
                        let result = &state.search_results[i];
                        Source {
                            url: result.url.clone(),
                            title: result.title.clone(),
                            snippet: Some(truncate_chars(&result.content, SNIPPET_LEN)),
                            published_at: result.published_at.clone(),
                        }
                    })
                    .collect(),
            })
            .collect();

        tracing::debug!(thread = %state.thread_id, trends = trends.len(), "synthesis complete");

        Ok(StateUpdate {
            trends: Some(trends),
            current_step: Some(ThreadStatus::Synthesizing),
            hitl_status: Patch::Clear,
            error: Patch::Clear,
            ..Default::default()
        })
    }
}
