//! DAG workflow orchestration: validation, scheduling, retries, progress and analytics.
//!
//! A workflow is a set of tasks with dependency edges. The engine validates
//! the graph once at create time, then drives tasks through a pluggable
//! [`TaskExecutor`] either concurrently or one at a time, retrying failed
//! attempts with exponential backoff and persisting every state change.
//!
//! # Main types
//!
//! - [`WorkflowEngine`] — Top-level façade: create, start, cancel, observe.
//! - [`GraphValidator`] — Structural checks and topological ordering of a task list.
//! - [`Scheduler`] — Dispatches ready tasks according to the workflow's [`ExecutionMode`].
//! - [`TaskRunner`] — Runs one task through its [`RetryPolicy`].
//! - [`ProgressTracker`] — Status and progress counters for a workflow snapshot.
//! - [`AnalyticsAggregator`] — Success rates and bottlenecks across workflows.
//! - [`WorkflowStore`] — Persistence seam, with in-memory and JSON-file backends.

/// Cross-workflow statistics.
pub mod analytics;
/// Cooperative cancellation signal.
pub mod cancellation;
/// Workflow engine façade.
pub mod engine;
/// Task executor trait and built-in executors.
pub mod executor;
/// Task graph validation and topology.
pub mod graph;
/// Per-workflow progress reporting.
pub mod progress;
/// Capability-based agent lookup.
pub mod registry;
/// Single-task retry loop.
pub mod runner;
/// Dependency-ordered task dispatch.
pub mod scheduler;
/// Workflow persistence.
pub mod store;
/// Parallel and sequential dispatch strategies.
pub mod strategy;
/// Workflow, task and state types.
pub mod types;

pub use analytics::{AnalyticsAggregator, Bottleneck, WorkflowAnalytics, DEFAULT_BOTTLENECK_LIMIT};
pub use cancellation::CancellationToken;
pub use engine::WorkflowEngine;
pub use executor::{NoopExecutor, SimulatedExecutor, TaskExecutor, TaskInvocation};
pub use graph::{GraphNode, GraphValidator, Topology};
pub use progress::{Progress, ProgressTracker, WorkflowStatusReport};
pub use registry::{AgentDescriptor, AgentRegistry, InMemoryAgentRegistry};
pub use runner::{TaskOutcome, TaskRunner};
pub use scheduler::Scheduler;
pub use store::{FileWorkflowStore, InMemoryWorkflowStore, Transition, WorkflowStore};
pub use strategy::{DispatchStrategy, ParallelDispatch, SequentialDispatch};
pub use types::{
    CreateWorkflowRequest, ExecutionMode, RetryPolicy, Task, TaskSpec, TaskState, TaskStatus,
    Workflow, WorkflowStatus, MAX_BACKOFF_MS,
};
