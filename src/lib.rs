//! # Trendloom: Resumable Human-in-the-Loop Research Workflows
//!
//! Trendloom executes a fixed research pipeline (plan, search, synthesize,
//! await approval, generate ideas) as a resumable step function over a shared
//! [`state::WorkflowState`]. Execution can suspend mid-step to wait for a human
//! decision, persist its exact position to a durable checkpoint store, and
//! later resume from that point, re-routing based on the decision.
//!
//! ## Core Concepts
//!
//! - **Steps**: Async units of work that read a state snapshot and return a
//!   partial update ([`state::StateUpdate`]) merged by per-field reducers
//! - **Checkpoints**: Immutable-once-written snapshots keyed by
//!   (thread, namespace, checkpoint id) with parent-pointer lineage
//! - **Interrupts**: A step-initiated suspension that externalizes a request
//!   for human input and halts progress until resumed
//! - **Coordinator**: Maps external triggers onto engine invocations and fans
//!   out per-platform idea generation behind a counting barrier
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trendloom::checkpoint::InMemoryCheckpointStore;
//! use trendloom::coordinator::{Coordinator, CoordinatorBuilder};
//!
//! # async fn example(
//! #     model: Arc<dyn trendloom::clients::LanguageModel>,
//! #     search: Arc<dyn trendloom::clients::SearchProvider>,
//! # ) -> miette::Result<()> {
//! let (coordinator, tasks) = CoordinatorBuilder::new(model, search)
//!     .checkpoint_store(Arc::new(InMemoryCheckpointStore::new()))
//!     .build();
//! let coordinator = Arc::new(coordinator);
//! let _worker = Coordinator::serve(coordinator.clone(), tasks);
//!
//! let thread = coordinator.create_thread("AI trends in developer tooling").await;
//! coordinator.start_research(&thread.id).await?;
//! // ... later, once the thread is awaiting approval:
//! coordinator.approve(&thread.id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Closed enums shared across the crate (statuses, steps, platforms)
//! - [`state`] - Workflow state, partial updates, and per-field reducers
//! - [`serde_ext`] - Tagged JSON codec for collection types that are not JSON-native
//! - [`checkpoint`] - Durable checkpoint store contract and backends
//! - [`steps`] - Step trait, interrupt primitive, and the five pipeline steps
//! - [`engine`] - The resumable step-function engine
//! - [`events`] - Ordered progress-event stream and per-thread event log
//! - [`coordinator`] - Trigger handling, deferred tasks, and idea fan-out
//! - [`clients`] - Dependency-injected LLM and search provider seams

pub mod checkpoint;
pub mod clients;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod events;
pub mod prompts;
pub mod serde_ext;
pub mod state;
pub mod steps;
pub mod telemetry;
pub mod types;
