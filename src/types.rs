//! Core enums shared across the Trendloom crate.
//!
//! Every enum here is a closed set that also exists on the wire (persisted
//! thread statuses, stream event partitions, resume decisions), so each one
//! derives serde with stable snake_case encodings and implements [`Display`]
//! for logging.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a workflow thread.
///
/// Persisted on the thread record and driven by the coordinator as execution
/// progresses. `AwaitingApproval` is the only status from which a resume
/// decision is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Idle,
    Planning,
    Searching,
    Synthesizing,
    AwaitingApproval,
    GeneratingIdeas,
    Completed,
    Error,
}

impl Default for ThreadStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Searching => "searching",
            Self::Synthesizing => "synthesizing",
            Self::AwaitingApproval => "awaiting_approval",
            Self::GeneratingIdeas => "generating_ideas",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Human-in-the-loop decision state carried inside the workflow state.
///
/// `Pending` means an interrupt was raised but no usable decision has been
/// applied yet; the router suspends the graph in that case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlStatus {
    Pending,
    Approved,
    Refine,
    Restart,
}

impl fmt::Display for HitlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Refine => "refine",
            Self::Restart => "restart",
        };
        write!(f, "{s}")
    }
}

/// Confidence grade attached to a synthesized trend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Target platform for a generated content idea.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linkedin,
    Twitter,
    Tiktok,
    Instagram,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Linkedin => "linkedin",
            Self::Twitter => "twitter",
            Self::Tiktok => "tiktok",
            Self::Instagram => "instagram",
        };
        write!(f, "{s}")
    }
}

/// Platforms targeted by idea generation, in scheduling order.
pub const IDEA_PLATFORMS: [Platform; 3] = [Platform::Linkedin, Platform::Twitter, Platform::Tiktok];

/// Identifies one step in the fixed pipeline topology.
///
/// The topology is small and static, so steps are a closed enum rather than
/// free-form node names; the engine maps each kind to its handler through an
/// explicit table.
///
/// # Examples
///
/// ```
/// use trendloom::types::{StepKind, ThreadStatus};
///
/// assert_eq!(StepKind::Search.to_string(), "search");
/// assert_eq!(StepKind::Search.status(), ThreadStatus::Searching);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    PlanResearch,
    Search,
    Synthesize,
    AwaitApproval,
    GenerateIdeas,
}

impl StepKind {
    /// Thread status a thread transitions to when this step starts.
    #[must_use]
    pub fn status(&self) -> ThreadStatus {
        match self {
            Self::PlanResearch => ThreadStatus::Planning,
            Self::Search => ThreadStatus::Searching,
            Self::Synthesize => ThreadStatus::Synthesizing,
            Self::AwaitApproval => ThreadStatus::AwaitingApproval,
            Self::GenerateIdeas => ThreadStatus::GeneratingIdeas,
        }
    }

    /// Human-readable progress message emitted when this step starts.
    #[must_use]
    pub fn start_message(&self) -> &'static str {
        match self {
            Self::PlanResearch => "Planning research strategy...",
            Self::Search => "Searching for trends...",
            Self::Synthesize => "Analyzing and synthesizing results...",
            Self::AwaitApproval => "Research complete! Please review the trends.",
            Self::GenerateIdeas => "Generating content ideas...",
        }
    }

    /// Stream partition this step's events belong to.
    #[must_use]
    pub fn stream(&self) -> StreamKind {
        match self {
            Self::GenerateIdeas => StreamKind::Ideas,
            _ => StreamKind::Research,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PlanResearch => "plan_research",
            Self::Search => "search",
            Self::Synthesize => "synthesize",
            Self::AwaitApproval => "await_approval",
            Self::GenerateIdeas => "generate_ideas",
        };
        write!(f, "{s}")
    }
}

/// Partition key for progress-event streams: one sequence space per
/// (thread, stream kind).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Research,
    Ideas,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Research => write!(f, "research"),
            Self::Ideas => write!(f, "ideas"),
        }
    }
}
