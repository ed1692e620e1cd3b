//! HTTP gateway for the Strata workflow engine.
//!
//! Exposes the orchestration API under `/orchestration` plus a `/health`
//! liveness route. All state lives in the injected [`WorkflowEngine`](strata_orchestrator::WorkflowEngine).

/// API error type and its JSON rendering.
pub mod error;
/// Router construction and request handlers.
pub mod server;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use server::{AppState, GatewayServer, WorkflowList};
