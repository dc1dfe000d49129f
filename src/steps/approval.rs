//! Human-in-the-loop approval step and the interrupt/resume wire types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::{Patch, StateUpdate, WorkflowState};
use crate::types::{HitlStatus, ThreadStatus};

use super::{Step, StepContext, StepError};

/// Menu of allowed decision strings surfaced with the interrupt payload.
pub const DECISION_OPTIONS: [&str; 3] = ["approved", "refine", "restart"];

/// Trend digest embedded in the interrupt payload for human review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub title: String,
    pub summary: String,
    pub why_it_matters: String,
    pub confidence: String,
    pub sources: Vec<SourceLink>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceLink {
    pub url: String,
    pub title: String,
}

/// Payload surfaced to the external caller when the graph suspends: what is
/// being reviewed and which responses are allowed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterruptPayload {
    pub trends: Vec<TrendSummary>,
    pub message: String,
    pub options: Vec<String>,
}

/// Closed set of resume actions. Out-of-set wire values deserialize to
/// `Unknown` instead of failing, so the step can record the error and return
/// the graph to pending rather than crash the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Approved,
    Refine,
    Restart,
    #[serde(other)]
    Unknown,
}

impl Serialize for DecisionAction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = match self {
            Self::Approved => "approved",
            Self::Refine => "refine",
            Self::Restart => "restart",
            // Round-trips back to Unknown through the `other` arm.
            Self::Unknown => "unknown",
        };
        serializer.serialize_str(s)
    }
}

/// Wire payload supplied by the external caller to unblock the graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResumeDecision {
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl ResumeDecision {
    pub fn approved() -> Self {
        Self {
            action: DecisionAction::Approved,
            feedback: None,
        }
    }

    pub fn refine(feedback: impl Into<String>) -> Self {
        Self {
            action: DecisionAction::Refine,
            feedback: Some(feedback.into()),
        }
    }

    pub fn restart() -> Self {
        Self {
            action: DecisionAction::Restart,
            feedback: None,
        }
    }
}

/// Builds the review payload from the synthesized trends and blocks via the
/// interrupt primitive; on resume, applies the decision table.
///
/// Decision handling:
/// - `approved`: hitl approved, error cleared
/// - `refine`: hitl refine, feedback stored, trends and search results
///   cleared so the next plan incorporates the feedback
/// - `restart`: hitl restart, plan/feedback/trends/results all cleared
/// - anything else: hitl pending plus an unknown-action error
pub struct AwaitApprovalStep;

#[async_trait]
impl Step for AwaitApprovalStep {
    async fn run(
        &self,
        state: &WorkflowState,
        ctx: &mut StepContext,
    ) -> Result<StateUpdate, StepError> {
        tracing::debug!(
            thread = %state.thread_id,
            trends = state.trends.len(),
            "preparing approval checkpoint"
        );

        let payload = InterruptPayload {
            trends: state
                .trends
                .iter()
                .map(|t| TrendSummary {
                    title: t.title.clone(),
                    summary: t.summary.clone(),
                    why_it_matters: t.why_it_matters.clone(),
                    confidence: serde_json::to_value(t.confidence)
                        .ok()
                        .and_then(|v| v.as_str().map(String::from))
                        .unwrap_or_default(),
                    sources: t
                        .sources
                        .iter()
                        .map(|s| SourceLink {
                            url: s.url.clone(),
                            title: s.title.clone(),
                        })
                        .collect(),
                })
                .collect(),
            message: "Research complete! Please review the trends and decide how to proceed."
                .into(),
            options: DECISION_OPTIONS.map(String::from).to_vec(),
        };

        let decision: ResumeDecision = ctx.interrupt(&payload)?;

        tracing::debug!(thread = %state.thread_id, action = ?decision.action, "resumed");

        let update = match decision.action {
            DecisionAction::Approved => StateUpdate {
                hitl_status: Patch::Set(HitlStatus::Approved),
                current_step: Some(ThreadStatus::AwaitingApproval),
                error: Patch::Clear,
                ..Default::default()
            },
            DecisionAction::Refine => StateUpdate {
                hitl_status: Patch::Set(HitlStatus::Refine),
                refinement_feedback: Patch::Set(decision.feedback.unwrap_or_default()),
                current_step: Some(ThreadStatus::AwaitingApproval),
                error: Patch::Clear,
                trends: Some(Vec::new()),
                search_results: Some(Vec::new()),
                ..Default::default()
            },
            DecisionAction::Restart => StateUpdate {
                hitl_status: Patch::Set(HitlStatus::Restart),
                current_step: Some(ThreadStatus::AwaitingApproval),
                error: Patch::Clear,
                trends: Some(Vec::new()),
                search_results: Some(Vec::new()),
                research_plan: Patch::Clear,
                refinement_feedback: Patch::Clear,
                ..Default::default()
            },
            DecisionAction::Unknown => StateUpdate {
                hitl_status: Patch::Set(HitlStatus::Pending),
                error: Patch::Set("Unknown HITL action".into()),
                ..Default::default()
            },
        };
        Ok(update)
    }
}
