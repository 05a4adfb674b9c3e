use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use taskbox_core::sync::{BatchRequest, BatchResponse, ItemStatus, ProcessedItem};
use taskbox_core::{
    CycleOutcome, DatabaseService, HttpBatchTransport, HttpProbe, NewTask, SyncEngine,
    SyncReport, SyncStatusSnapshot, Task, TaskId, TaskUpdate,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;

pub type ApiSyncEngine = SyncEngine<DatabaseService, HttpBatchTransport, HttpProbe>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    db: DatabaseService,
    engine: Arc<ApiSyncEngine>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DatabaseService) -> Result<Self, AppError> {
        let transport = HttpBatchTransport::new(&config.sync)
            .map_err(|error| AppError::internal(error.to_string()))?;
        let probe =
            HttpProbe::new(&config.sync).map_err(|error| AppError::internal(error.to_string()))?;
        let engine = SyncEngine::new(config.sync.clone(), db.clone(), transport, probe)
            .map_err(|error| AppError::internal(error.to_string()))?;
        Ok(Self {
            config,
            db,
            engine: Arc::new(engine),
        })
    }
}

pub fn app_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/sync", post(run_sync))
        .route("/sync/batch", post(sync_batch))
        .route("/status", get(sync_status))
        .route("/health", get(health));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

fn parse_task_id(raw: &str) -> Result<TaskId, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("invalid task id: {raw}")))
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, AppError> {
    Ok(Json(state.db.list_tasks().await?))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let id = parse_task_id(&id)?;
    state
        .db
        .get_task(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("task {id}")))
}

async fn create_task(
    State(state): State<AppState>,
    Json(input): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let task = state.db.create_task(&input).await?;
    tracing::info!(task = %task.id, "Created task");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<Task>, AppError> {
    let id = parse_task_id(&id)?;
    Ok(Json(state.db.update_task(&id, update).await?))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_task_id(&id)?;
    state.db.delete_task(&id).await?;
    tracing::info!(task = %id, "Deleted task");
    Ok(StatusCode::NO_CONTENT)
}

async fn run_sync(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    let report = state.engine.run_cycle().await;
    if report.outcome == CycleOutcome::Unreachable {
        return Err(AppError::unavailable("Server not reachable"));
    }
    Ok(Json(report))
}

async fn sync_status(State(state): State<AppState>) -> Result<Json<SyncStatusSnapshot>, AppError> {
    Ok(Json(state.engine.status().await?))
}

/// Loopback remote authority: acknowledges every item with a fresh server id.
async fn sync_batch(Json(body): Json<Value>) -> Result<Json<BatchResponse>, AppError> {
    if body.get("items").is_none() || body.get("client_timestamp").is_none() {
        return Err(AppError::bad_request(
            "items and client_timestamp are required",
        ));
    }
    let request: BatchRequest =
        serde_json::from_value(body).map_err(|error| AppError::bad_request(error.to_string()))?;

    let processed_items = request
        .items
        .iter()
        .map(|item| ProcessedItem {
            entry_id: Some(item.id.to_string()),
            server_id: Some(Uuid::now_v7().to_string()),
            status: ItemStatus::Success,
            resolved_payload: None,
            error: None,
        })
        .collect();
    tracing::debug!(items = request.items.len(), "Acknowledged sync batch");
    Ok(Json(BatchResponse { processed_items }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use taskbox_core::SyncConfig;

    use super::*;

    struct TestServer {
        base: String,
        client: reqwest::Client,
    }

    impl TestServer {
        fn url(&self, path: &str) -> String {
            format!("{}{path}", self.base)
        }
    }

    /// Serve the app on an ephemeral port. `remote` overrides the sync base
    /// URL; by default the app syncs against its own loopback endpoint.
    async fn spawn_app(remote: Option<String>) -> TestServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = format!("http://{addr}/api");

        let sync = SyncConfig::new(remote.as_deref().unwrap_or(&base))
            .unwrap()
            .with_probe_timeout(std::time::Duration::from_secs(1));
        let config = Arc::new(AppConfig {
            bind_addr: addr.to_string(),
            db_path: PathBuf::from(":memory:"),
            sync,
        });
        let db = DatabaseService::open_in_memory().await.unwrap();
        let router = app_router(AppState::new(config, db).unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TestServer {
            base,
            client: reqwest::Client::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn task_crud_lifecycle() {
        let app = spawn_app(None).await;

        let response = app
            .client
            .post(app.url("/tasks"))
            .json(&json!({ "title": "Buy milk", "description": "oat" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let created: Value = response.json().await.unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["sync_status"], "pending");

        let listed: Vec<Value> = app
            .client
            .get(app.url("/tasks"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let updated: Value = app
            .client
            .put(app.url(&format!("/tasks/{id}")))
            .json(&json!({ "completed": true }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(updated["completed"], true);
        assert_eq!(updated["title"], "Buy milk");

        let response = app
            .client
            .delete(app.url(&format!("/tasks/{id}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 204);

        let response = app
            .client
            .get(app.url(&format!("/tasks/{id}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);

        let response = app
            .client
            .delete(app.url(&format!("/tasks/{id}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_title_is_rejected() {
        let app = spawn_app(None).await;

        let response = app
            .client
            .post(app.url("/tasks"))
            .json(&json!({ "title": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("title"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_task_id_is_a_bad_request() {
        let app = spawn_app(None).await;

        let response = app
            .client
            .get(app.url("/tasks/not-a-uuid"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn manual_sync_against_loopback_authority() {
        let app = spawn_app(None).await;

        let mut ids = Vec::new();
        for title in ["first", "second"] {
            let created: Value = app
                .client
                .post(app.url("/tasks"))
                .json(&json!({ "title": title }))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            ids.push(created["id"].as_str().unwrap().to_string());
        }

        let response = app.client.post(app.url("/sync")).send().await.unwrap();
        assert_eq!(response.status(), 200);
        let report: Value = response.json().await.unwrap();
        assert_eq!(report["succeeded_count"], 2);
        assert_eq!(report["failed_count"], 0);
        assert_eq!(report["outcome"], "completed");

        for id in ids {
            let task: Value = app
                .client
                .get(app.url(&format!("/tasks/{id}")))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(task["sync_status"], "synced");
            assert!(task["server_id"].is_string());
        }

        let status: Value = app
            .client
            .get(app.url("/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["pending_items"], 0);
        assert_eq!(status["server_reachable"], true);
        assert_eq!(status["phase"], "idle");
        assert!(status["last_sync"].is_string());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_reports_unreachable_remote() {
        let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote = format!("http://{}/api", closed.local_addr().unwrap());
        drop(closed);
        let app = spawn_app(Some(remote)).await;

        app.client
            .post(app.url("/tasks"))
            .json(&json!({ "title": "offline" }))
            .send()
            .await
            .unwrap();

        let response = app.client.post(app.url("/sync")).send().await.unwrap();
        assert_eq!(response.status(), 503);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "error": "Server not reachable" }));

        let status: Value = app
            .client
            .get(app.url("/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["pending_items"], 1);
        assert_eq!(status["server_reachable"], false);
        assert!(status["last_sync"].is_null());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_endpoint_requires_items_and_timestamp() {
        let app = spawn_app(None).await;

        let response = app
            .client
            .post(app.url("/sync/batch"))
            .json(&json!({ "items": [] }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let response = app
            .client
            .post(app.url("/sync/batch"))
            .json(&json!({ "items": [], "client_timestamp": Utc::now() }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "processed_items": [] }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn health_reports_ok() {
        let app = spawn_app(None).await;

        let body: Value = app
            .client
            .get(app.url("/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_i64());
    }
}
