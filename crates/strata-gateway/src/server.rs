use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strata_orchestrator::{
    CreateWorkflowRequest, Workflow, WorkflowAnalytics, WorkflowEngine, WorkflowStatus,
    WorkflowStatusReport,
};
use tracing::info;
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the router for the orchestration API.
    pub fn build(engine: Arc<WorkflowEngine>) -> Router {
        let state = Arc::new(AppState { engine });

        Router::new()
            .route("/health", get(health_handler))
            .route(
                "/orchestration/workflows",
                post(create_workflow).get(list_workflows),
            )
            .route("/orchestration/workflows/{id}", get(get_workflow))
            .route("/orchestration/workflows/{id}/start", post(start_workflow))
            .route("/orchestration/workflows/{id}/cancel", post(cancel_workflow))
            .route("/orchestration/workflows/{id}/status", get(workflow_status))
            .route("/orchestration/analytics", get(analytics))
            .with_state(state)
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    status: Option<String>,
}

/// Body of the list endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkflowList {
    pub workflows: Vec<Workflow>,
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "strata"}))
}

async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateWorkflowRequest>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    let workflow = state.engine.create(request).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

async fn list_workflows(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<WorkflowList>> {
    let status = params.status.as_deref().map(parse_status).transpose()?;
    let workflows = state.engine.list(status).await?;
    Ok(Json(WorkflowList { workflows }))
}

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine.get(id).await?))
}

async fn start_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    let id = parse_id(&id)?;
    info!(workflow_id = %id, "Start requested");
    Ok(Json(state.engine.start(id).await?))
}

async fn cancel_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    let id = parse_id(&id)?;
    info!(workflow_id = %id, "Cancel requested");
    Ok(Json(state.engine.cancel(id).await?))
}

async fn workflow_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkflowStatusReport>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine.status(id).await?))
}

async fn analytics(State(state): State<Arc<AppState>>) -> ApiResult<Json<WorkflowAnalytics>> {
    Ok(Json(state.engine.analytics().await?))
}

/// Ids that are not UUIDs cannot name a workflow.
fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("workflow {raw}")))
}

fn parse_status(raw: &str) -> ApiResult<WorkflowStatus> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| ApiError::BadRequest(format!("unknown workflow status '{raw}'")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        GatewayServer::build(Arc::new(WorkflowEngine::in_memory()))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "strata");
    }

    #[tokio::test]
    async fn test_create_then_start_then_status() {
        let app = app();
        let (status, created) = call(
            &app,
            "POST",
            "/orchestration/workflows",
            Some(json!({
                "name": "open",
                "tasks": [
                    {"id": "a", "name": "A"},
                    {"id": "b", "name": "B", "dependsOn": ["a"]}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        assert_eq!(created["mode"], "parallel");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, started) =
            call(&app, "POST", &format!("/orchestration/workflows/{id}/start"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["status"], "completed");

        let (status, report) =
            call(&app, "GET", &format!("/orchestration/workflows/{id}/status"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["progress"]["completed"], 2);
        assert_eq!(report["progress"]["percentComplete"], 100);

        let (status, again) =
            call(&app, "POST", &format!("/orchestration/workflows/{id}/start"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(again["code"], "INVALID_STATE");
    }

    #[tokio::test]
    async fn test_validation_error_body() {
        let (status, body) = call(
            &app(),
            "POST",
            "/orchestration/workflows",
            Some(json!({"name": "empty", "tasks": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["error"].as_str().unwrap().contains("at least one task"));
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let (status, _) = call(
            &app(),
            "POST",
            "/orchestration/workflows",
            Some(json!({"name": "no tasks"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids_are_404() {
        let app = app();
        for uri in [
            format!("/orchestration/workflows/{}/status", Uuid::new_v4()),
            "/orchestration/workflows/not-a-uuid/status".to_string(),
            "/orchestration/workflows/not-a-uuid".to_string(),
        ] {
            let (status, body) = call(&app, "GET", &uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["code"], "NOT_FOUND");
        }
        let (status, _) = call(
            &app,
            "POST",
            &format!("/orchestration/workflows/{}/start", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_filter() {
        let app = app();
        for name in ["one", "two"] {
            call(
                &app,
                "POST",
                "/orchestration/workflows",
                Some(json!({"name": name, "tasks": [{"id": "t", "name": "T"}]})),
            )
            .await;
        }

        let (status, body) = call(&app, "GET", "/orchestration/workflows", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["workflows"].as_array().unwrap().len(), 2);

        let (_, body) = call(&app, "GET", "/orchestration/workflows?status=completed", None).await;
        assert!(body["workflows"].as_array().unwrap().is_empty());

        let (status, body) = call(&app, "GET", "/orchestration/workflows?status=bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_cancel_pending() {
        let app = app();
        let (_, created) = call(
            &app,
            "POST",
            "/orchestration/workflows",
            Some(json!({"name": "c", "tasks": [{"id": "t", "name": "T"}]})),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, body) =
            call(&app, "POST", &format!("/orchestration/workflows/{id}/cancel"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "cancelled");

        let (status, body) =
            call(&app, "POST", &format!("/orchestration/workflows/{id}/cancel"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("already finished"));
    }

    #[tokio::test]
    async fn test_analytics_empty() {
        let (status, body) = call(&app(), "GET", "/orchestration/analytics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalWorkflows"], 0);
        assert_eq!(body["successRate"], 0.0);
    }
}
