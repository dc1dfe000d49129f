//! Keyword search step: fan the plan's keywords through the search provider.

use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashSet;

use crate::clients::SearchProvider;
use crate::state::{Patch, SearchHit, StateUpdate, WorkflowState};
use crate::types::ThreadStatus;

use super::{Step, StepContext, StepError};

/// Results kept after ranking; everything below the cut is discarded.
const MAX_RESULTS: usize = 20;

/// Queries the provider once per plan keyword, de-duplicates by URL, ranks by
/// score descending, and keeps the top [`MAX_RESULTS`].
pub struct SearchStep {
    provider: Arc<dyn SearchProvider>,
}

impl SearchStep {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Step for SearchStep {
    async fn run(
        &self,
        state: &WorkflowState,
        _ctx: &mut StepContext,
    ) -> Result<StateUpdate, StepError> {
        let plan = state
            .research_plan
            .as_ref()
            .ok_or(StepError::MissingInput {
                what: "research plan",
            })?;

        let mut seen_urls: FxHashSet<String> = FxHashSet::default();
        let mut all_results: Vec<SearchHit> = Vec::new();

        for keyword in &plan.keywords {
            tracing::debug!(thread = %state.thread_id, %keyword, "searching");
            let hits = self.provider.search(keyword).await?;
            for hit in hits {
                if seen_urls.insert(hit.url.clone()) {
                    all_results.push(hit);
                }
            }
        }

        all_results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let total = all_results.len();
        all_results.truncate(MAX_RESULTS);

        tracing::debug!(
            thread = %state.thread_id,
            total,
            kept = all_results.len(),
            "search complete"
        );

        Ok(StateUpdate {
            search_results: Some(all_results),
            current_step: Some(ThreadStatus::Searching),
            error: Patch::Clear,
            ..Default::default()
        })
    }
}
