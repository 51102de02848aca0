//! HTTP API server
//!
//! Exposes the task store and the AI collaborator over JSON/HTTP. Store
//! endpoints mutate directly; AI endpoints are a stateless passthrough plus
//! explicit accept endpoints that run the corresponding merge, so the
//! review step stays client-side. A server-sent event stream notifies
//! connected clients after every store mutation.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ai::{
    AiError, BreakDownRequest, DayPlanRequest, ScheduleItem, SuggestScheduleRequest,
    SuggestTasksRequest, SuggestionService,
};
use crate::flows;
use crate::models::{Category, StoreHandle, TaskId, TaskPatch};
use crate::reconcile;

/// Request to create a new task
#[derive(Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default = "default_category")]
    pub category: Category,
}

fn default_category() -> Category {
    Category::Today
}

/// Optional category filter for task listing
#[derive(Deserialize)]
pub struct ListTasksQuery {
    pub category: Option<Category>,
}

/// Request to accept suggested task titles into the store
#[derive(Serialize, Deserialize)]
pub struct AcceptSuggestionsRequest {
    pub tasks: Vec<String>,
}

/// Request to accept generated subtasks for one task
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptBreakdownRequest {
    pub task_id: TaskId,
    pub subtasks: Vec<String>,
}

/// Request to accept a schedule suggestion for one task
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptScheduleRequest {
    pub task_id: TaskId,
    pub suggested_schedule: String,
    pub reminder_interval: String,
}

/// Request to accept a generated day plan
#[derive(Serialize, Deserialize)]
pub struct AcceptDayPlanRequest {
    pub schedule: Vec<ScheduleItem>,
}

/// Request to prioritize every task in one category
#[derive(Serialize, Deserialize)]
pub struct PrioritizeCategoryRequest {
    pub category: Category,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 3000).into(),
        }
    }
}

/// Shared handler state: the store plus the collaborator backend
#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
    pub ai: Arc<dyn SuggestionService>,
}

/// API responses
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Maps collaborator results to responses; collaborator failures surface
/// as 502 so clients can tell them from store errors
fn map_ai_result<T: Serialize>(result: Result<T, AiError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::<T>::error(format!("AI service error: {}", e))),
        )
            .into_response(),
    }
}

/// Builds the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // --- Task store --- //
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/:id", post(update_task).delete(delete_task))
        .route("/api/tasks/:id/toggle", post(toggle_task))
        .route(
            "/api/tasks/:id/subtasks/:subtask_id/toggle",
            post(toggle_subtask),
        )
        // --- AI passthrough --- //
        .route("/api/ai/suggest-tasks", post(ai_suggest_tasks))
        .route("/api/ai/breakdown", post(ai_breakdown))
        .route("/api/ai/schedule", post(ai_schedule))
        .route("/api/ai/prioritize-tasks", post(ai_prioritize_tasks))
        .route("/api/ai/plan-day", post(ai_plan_day))
        // --- Accept (merge) endpoints --- //
        .route("/api/ai/suggest-tasks/accept", post(accept_suggestions))
        .route("/api/ai/breakdown/accept", post(accept_breakdown))
        .route("/api/ai/schedule/accept", post(accept_schedule))
        .route("/api/ai/plan-day/accept", post(accept_day_plan))
        // --- Prioritization (server-side round-trip) --- //
        .route("/api/ai/prioritize", post(prioritize_category))
        // --- Events --- //
        .route("/api/events", get(events_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the API server
pub async fn serve(state: AppState, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let app = router(state);

    tracing::info!("Starting server on {}", config.address);
    let listener = TcpListener::bind(config.address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Task Store Handlers --- //

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> impl IntoResponse {
    let tasks = match query.category {
        Some(category) => state.store.in_category(category),
        None => state.store.snapshot(),
    };
    (StatusCode::OK, Json(ApiResponse::success(tasks)))
}

async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskRequest>,
) -> impl IntoResponse {
    match state.store.create(payload.title, payload.category) {
        Some(task) => (StatusCode::OK, Json(ApiResponse::success(task))).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<crate::models::Task>::error(
                "Task title must not be blank".to_string(),
            )),
        )
            .into_response(),
    }
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> impl IntoResponse {
    let id = TaskId::from_string(id);
    // Absent ids are a silent no-op, matching store semantics
    state.store.update(&id, patch);
    (StatusCode::OK, Json(ApiResponse::success(state.store.get(&id))))
}

async fn delete_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = TaskId::from_string(id);
    state.store.delete(&id);
    (StatusCode::OK, Json(ApiResponse::success(())))
}

async fn toggle_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let id = TaskId::from_string(id);
    state.store.toggle_completed(&id);
    (StatusCode::OK, Json(ApiResponse::success(state.store.get(&id))))
}

async fn toggle_subtask(
    State(state): State<AppState>,
    Path((id, subtask_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let id = TaskId::from_string(id);
    let subtask_id = crate::models::SubtaskId::from_string(subtask_id);
    state.store.toggle_subtask(&id, &subtask_id);
    (StatusCode::OK, Json(ApiResponse::success(state.store.get(&id))))
}

// --- AI Passthrough Handlers --- //

async fn ai_suggest_tasks(
    State(state): State<AppState>,
    Json(req): Json<SuggestTasksRequest>,
) -> impl IntoResponse {
    map_ai_result(state.ai.suggest_tasks(req).await)
}

async fn ai_breakdown(
    State(state): State<AppState>,
    Json(req): Json<BreakDownRequest>,
) -> impl IntoResponse {
    map_ai_result(state.ai.break_down_task(req).await)
}

async fn ai_schedule(
    State(state): State<AppState>,
    Json(req): Json<SuggestScheduleRequest>,
) -> impl IntoResponse {
    map_ai_result(state.ai.suggest_schedule(req).await)
}

async fn ai_prioritize_tasks(
    State(state): State<AppState>,
    Json(req): Json<crate::ai::PrioritizeRequest>,
) -> impl IntoResponse {
    map_ai_result(state.ai.prioritize_tasks(req).await)
}

async fn ai_plan_day(
    State(state): State<AppState>,
    Json(req): Json<DayPlanRequest>,
) -> impl IntoResponse {
    map_ai_result(state.ai.generate_day_schedule(req).await)
}

// --- Accept Handlers --- //

async fn accept_suggestions(
    State(state): State<AppState>,
    Json(payload): Json<AcceptSuggestionsRequest>,
) -> impl IntoResponse {
    let created = reconcile::merge_suggested_tasks(&state.store, payload.tasks);
    (StatusCode::OK, Json(ApiResponse::success(created)))
}

async fn accept_breakdown(
    State(state): State<AppState>,
    Json(payload): Json<AcceptBreakdownRequest>,
) -> impl IntoResponse {
    let applied = reconcile::merge_breakdown(&state.store, &payload.task_id, payload.subtasks);
    (StatusCode::OK, Json(ApiResponse::success(applied)))
}

async fn accept_schedule(
    State(state): State<AppState>,
    Json(payload): Json<AcceptScheduleRequest>,
) -> impl IntoResponse {
    state.store.update(
        &payload.task_id,
        TaskPatch {
            suggested_schedule: Some(payload.suggested_schedule),
            reminder_interval: Some(payload.reminder_interval),
            ..Default::default()
        },
    );
    (
        StatusCode::OK,
        Json(ApiResponse::success(state.store.get(&payload.task_id))),
    )
}

async fn accept_day_plan(
    State(state): State<AppState>,
    Json(payload): Json<AcceptDayPlanRequest>,
) -> impl IntoResponse {
    let created = reconcile::merge_day_plan(&state.store, payload.schedule);
    (StatusCode::OK, Json(ApiResponse::success(created)))
}

// --- Prioritization Handler --- //

async fn prioritize_category(
    State(state): State<AppState>,
    Json(payload): Json<PrioritizeCategoryRequest>,
) -> impl IntoResponse {
    map_ai_result(flows::prioritize(&state.store, &state.ai, payload.category).await)
}

// --- Event Handler --- //

async fn events_handler(State(state): State<AppState>) -> impl IntoResponse {
    let receiver = state.store.subscribe();
    let stream = EventStream::new(state.store.clone(), receiver);

    let headers = [
        (
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("text/event-stream"),
        ),
        (
            axum::http::header::CACHE_CONTROL,
            axum::http::HeaderValue::from_static("no-cache"),
        ),
    ];

    (headers, axum::body::Body::from_stream(stream))
}

struct EventStream {
    store: StoreHandle,
    receiver: tokio::sync::broadcast::Receiver<()>,
}

impl EventStream {
    fn new(store: StoreHandle, receiver: tokio::sync::broadcast::Receiver<()>) -> Self {
        Self { store, receiver }
    }
}

impl Stream for EventStream {
    type Item = Result<String, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Try to receive from the broadcast channel with a non-blocking approach
        match self.receiver.try_recv() {
            Ok(()) => Poll::Ready(Some(Ok("event: update\ndata: change\n\n".to_string()))),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty) => {
                // No updates available now, register the waker to be notified later
                let waker = cx.waker().clone();
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    waker.wake();
                });
                Poll::Pending
            }
            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_)) => {
                // Some notifications were missed; a single change event suffices
                Poll::Ready(Some(Ok("event: update\ndata: change\n\n".to_string())))
            }
            Err(tokio::sync::broadcast::error::TryRecvError::Closed) => {
                // Channel closed, try to resubscribe
                self.receiver = self.store.subscribe();
                Poll::Pending
            }
        }
    }
}
