//! Workflow state, partial updates, and per-field reducers.
//!
//! The engine threads one [`WorkflowState`] through the pipeline. Each step
//! returns a [`StateUpdate`] describing only the fields it wants to change;
//! [`WorkflowState::apply`] folds the update in using a fixed merge rule per
//! field. Most fields are last-write-wins; `ideas` accumulates. Nullable
//! fields use [`Patch`], which distinguishes "leave alone" from "set to
//! null"; the refine/restart paths depend on being able to clear fields
//! explicitly.

use serde::{Deserialize, Serialize};

use crate::types::{Confidence, HitlStatus, Platform, ThreadStatus};

/// Research plan produced by the planning step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub keywords: Vec<String>,
    pub timeframe: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// One ranked result returned by the search provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// Citation attached to a trend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// A synthesized trend awaiting human review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub title: String,
    pub summary: String,
    pub why_it_matters: String,
    pub confidence: Confidence,
    pub sources: Vec<Source>,
}

/// A generated content idea, linked back to its trend by index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub trend_index: usize,
    pub platform: Platform,
    pub hook: String,
    pub format: String,
    pub angle: String,
    pub description: String,
}

/// Brand voice parameters injected into idea-generation prompts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrandContext {
    pub name: String,
    pub voice: String,
    pub target_audience: String,
    pub values: Vec<String>,
    pub do_list: Vec<String>,
    pub dont_list: Vec<String>,
}

impl Default for BrandContext {
    fn default() -> Self {
        Self {
            name: "Gallium".into(),
            voice: "Clear, sharp, slightly edgy, technical but human. No corporate fluff.".into(),
            target_audience:
                "Founders, growth leads, and small marketing teams who want to move faster with AI"
                    .into(),
            values: [
                "Speed",
                "Leverage",
                "Rigor",
                "Systems thinking",
                "Modern taste",
            ]
            .map(String::from)
            .to_vec(),
            do_list: [
                "Concrete takeaways",
                "Strong opinions backed by evidence",
                "Punchy hooks",
                "'This actually works' energy",
                "Show don't tell",
            ]
            .map(String::from)
            .to_vec(),
            dont_list: [
                "Corporate speak",
                "Vague platitudes",
                "Excessive emojis",
                "Clickbait without substance",
                "Being preachy",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

/// The mutable payload threaded through pipeline steps.
///
/// Serialized in full into every checkpoint; `#[serde(default)]` on optional
/// and list fields keeps older checkpoints loadable as the shape grows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub user_prompt: String,
    pub thread_id: String,
    #[serde(default)]
    pub refinement_feedback: Option<String>,
    #[serde(default)]
    pub research_plan: Option<ResearchPlan>,
    #[serde(default)]
    pub search_results: Vec<SearchHit>,
    #[serde(default)]
    pub trends: Vec<Trend>,
    #[serde(default)]
    pub ideas: Vec<Idea>,
    #[serde(default)]
    pub brand_context: BrandContext,
    #[serde(default)]
    pub current_step: ThreadStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub hitl_status: Option<HitlStatus>,
}

impl WorkflowState {
    /// Fresh state for a new thread: everything at its per-field default.
    pub fn new(thread_id: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            thread_id: thread_id.into(),
            refinement_feedback: None,
            research_plan: None,
            search_results: Vec::new(),
            trends: Vec::new(),
            ideas: Vec::new(),
            brand_context: BrandContext::default(),
            current_step: ThreadStatus::Idle,
            error: None,
            hitl_status: None,
        }
    }

    /// Seed refinement feedback on a fresh state (re-plan after refine).
    #[must_use]
    pub fn with_refinement_feedback(mut self, feedback: Option<String>) -> Self {
        self.refinement_feedback = feedback;
        self
    }

    /// Fold a partial update into this state using the per-field reducers.
    ///
    /// Replace fields overwrite; `ideas` appends; [`Patch`] fields can also
    /// clear. The order of application is irrelevant because no two rules
    /// touch the same field.
    pub fn apply(&mut self, update: StateUpdate) {
        update.research_plan.apply_to(&mut self.research_plan);
        update
            .refinement_feedback
            .apply_to(&mut self.refinement_feedback);
        update.hitl_status.apply_to(&mut self.hitl_status);
        update.error.apply_to(&mut self.error);
        if let Some(results) = update.search_results {
            self.search_results = results;
        }
        if let Some(trends) = update.trends {
            self.trends = trends;
        }
        if let Some(mut ideas) = update.ideas {
            self.ideas.append(&mut ideas);
        }
        if let Some(brand) = update.brand_context {
            self.brand_context = brand;
        }
        if let Some(step) = update.current_step {
            self.current_step = step;
        }
    }
}

/// Three-way merge instruction for a nullable state field.
///
/// [`Patch::Keep`] leaves the field untouched, [`Patch::Set`] replaces it,
/// and [`Patch::Clear`] resets it to null. `Keep` is the default so a
/// [`StateUpdate`] built with `..Default::default()` touches nothing.
#[derive(Clone, Debug, PartialEq)]
pub enum Patch<T> {
    Keep,
    Set(T),
    Clear,
}

// Manual impl: the derive would demand `T: Default` for a variant that
// holds no `T`.
impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T> Patch<T> {
    fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Set(value) => *slot = Some(value),
            Patch::Clear => *slot = None,
        }
    }
}

/// Partial state update returned by a step.
///
/// Every field is optional; unset fields leave the state untouched. Field
/// semantics mirror [`WorkflowState::apply`]: `Option<Vec<_>>` fields replace
/// wholesale (including replace-with-empty, which is how refine clears
/// collected research), `ideas` appends, and [`Patch`] fields can clear.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateUpdate {
    pub research_plan: Patch<ResearchPlan>,
    pub refinement_feedback: Patch<String>,
    pub search_results: Option<Vec<SearchHit>>,
    pub trends: Option<Vec<Trend>>,
    pub ideas: Option<Vec<Idea>>,
    pub brand_context: Option<BrandContext>,
    pub current_step: Option<ThreadStatus>,
    pub error: Patch<String>,
    pub hitl_status: Patch<HitlStatus>,
}

impl StateUpdate {
    /// Update that records a fatal step failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Patch::Set(message.into()),
            current_step: Some(ThreadStatus::Error),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend(title: &str) -> Trend {
        Trend {
            title: title.into(),
            summary: "s".into(),
            why_it_matters: "w".into(),
            confidence: Confidence::Medium,
            sources: vec![],
        }
    }

    #[test]
    fn replace_fields_overwrite() {
        let mut state = WorkflowState::new("t1", "prompt");
        state.apply(StateUpdate {
            trends: Some(vec![trend("a"), trend("b")]),
            ..Default::default()
        });
        state.apply(StateUpdate {
            trends: Some(vec![trend("c")]),
            ..Default::default()
        });
        assert_eq!(state.trends.len(), 1);
        assert_eq!(state.trends[0].title, "c");
    }

    #[test]
    fn ideas_accumulate() {
        let mut state = WorkflowState::new("t1", "prompt");
        let idea = Idea {
            trend_index: 0,
            platform: Platform::Twitter,
            hook: "h".into(),
            format: "f".into(),
            angle: "a".into(),
            description: "d".into(),
        };
        state.apply(StateUpdate {
            ideas: Some(vec![idea.clone()]),
            ..Default::default()
        });
        state.apply(StateUpdate {
            ideas: Some(vec![idea]),
            ..Default::default()
        });
        assert_eq!(state.ideas.len(), 2);
    }

    #[test]
    fn patch_clear_resets_to_null() {
        let mut state = WorkflowState::new("t1", "prompt");
        state.apply(StateUpdate {
            error: Patch::Set("boom".into()),
            refinement_feedback: Patch::Set("focus on B2B".into()),
            ..Default::default()
        });
        assert!(state.error.is_some());
        state.apply(StateUpdate {
            error: Patch::Clear,
            ..Default::default()
        });
        assert!(state.error.is_none());
        // Keep leaves fields alone.
        assert_eq!(state.refinement_feedback.as_deref(), Some("focus on B2B"));
    }

    #[test]
    fn state_serde_round_trip() {
        let mut state = WorkflowState::new("t1", "prompt");
        state.apply(StateUpdate {
            research_plan: Patch::Set(ResearchPlan {
                keywords: vec!["ai".into()],
                timeframe: "30d".into(),
                domain: None,
                region: Some("EU".into()),
            }),
            current_step: Some(ThreadStatus::Planning),
            ..Default::default()
        });
        let json = serde_json::to_string(&state).unwrap();
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
