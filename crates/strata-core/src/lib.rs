//! Core error types for the Strata workflow engine.
//!
//! Every Strata crate reports failures through [`StrataError`]. Structural
//! problems with a submitted task graph are described by [`ValidationError`],
//! which is kept separate so callers can tell a rejected definition apart
//! from a lookup or state failure.
//!
//! # Main types
//!
//! - [`StrataError`] — Unified error enum for the engine, stores and gateway.
//! - [`StrataResult`] — Convenience alias for `Result<T, StrataError>`.
//! - [`ValidationError`] — Reasons a workflow definition is rejected at create time.

// --- Error types ---

/// A structural problem with a submitted task list.
///
/// Variants are checked in declaration order; the first violated rule wins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The task list was empty.
    #[error("workflow must contain at least one task")]
    Empty,

    /// Two or more tasks share an id.
    #[error("task ids must be unique: '{0}' appears more than once")]
    DuplicateId(String),

    /// A task lists its own id in `dependsOn`.
    #[error("task '{0}' cannot depend on itself")]
    SelfDependency(String),

    /// A task lists an id that is not part of the workflow.
    #[error("task '{task}' depends on an unknown task '{dependency}'")]
    UnknownDependency {
        /// The task declaring the dependency.
        task: String,
        /// The id that could not be found.
        dependency: String,
    },

    /// The dependency relation is not acyclic.
    #[error("dependency graph contains a cycle involving: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Top-level error type for the Strata engine.
#[derive(Debug, thiserror::Error)]
pub enum StrataError {
    /// A workflow definition failed structural validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced workflow does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation is not allowed in the workflow's current status.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The state store failed to read or write a record.
    #[error("Store error: {0}")]
    Store(String),

    /// A background run ended without reporting a result.
    #[error("Internal error: {0}")]
    Internal(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`StrataError`].
pub type StrataResult<T> = Result<T, StrataError>;
