//! HTTP client for the task API server
//!
//! Covers every server endpoint, and doubles as a [`SuggestionService`] by
//! delegating the five AI operations to the server's passthrough routes, so
//! the flows in [`crate::flows`] can run against a remote server unchanged.

use reqwest::Client as ReqwestClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ai::{
    AiError, BreakDownRequest, BreakdownReply, DayPlanRequest, DayPlanResponse, PrioritizeRequest,
    ScheduleItem, ScheduleSuggestion, ScoredTask, SuggestScheduleRequest, SuggestTasksRequest,
    SuggestTasksResponse, SuggestionService,
};
use crate::api::server::{
    AcceptBreakdownRequest, AcceptDayPlanRequest, AcceptScheduleRequest, AcceptSuggestionsRequest,
    CreateTaskRequest, PrioritizeCategoryRequest,
};
use crate::models::{Category, Task, TaskId, TaskPatch};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("missing data in response")]
    MissingData,
}

impl From<ClientError> for AiError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Http(e) => AiError::Http(e),
            ClientError::Api(msg) => AiError::Api(msg),
            ClientError::MissingData => AiError::MissingData,
        }
    }
}

/// Generic API response structure
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// HTTP client for the task API server
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: ReqwestClient,
    config: ClientConfig,
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            http_client: ReqwestClient::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn unwrap_envelope<R>(response: ApiResponse<R>) -> Result<R, ClientError> {
        Self::unwrap_optional(response)?.ok_or(ClientError::MissingData)
    }

    /// Like [`Self::unwrap_envelope`] but treats a successful response with
    /// no data as `None`. Used where the server reports a silent no-op
    /// (e.g. patching a task that no longer exists).
    fn unwrap_optional<R>(response: ApiResponse<R>) -> Result<Option<R>, ClientError> {
        if response.success {
            Ok(response.data)
        } else {
            Err(ClientError::Api(
                response
                    .error
                    .unwrap_or_else(|| "Unknown server error".to_string()),
            ))
        }
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, ClientError> {
        let response = self
            .http_client
            .get(self.url(path))
            .query(query)
            .send()
            .await?;
        Self::unwrap_envelope(response.json().await?)
    }

    async fn post_json<Q, R>(&self, path: &str, request: &Q) -> Result<R, ClientError>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(self.url(path))
            .json(request)
            .send()
            .await?;
        Self::unwrap_envelope(response.json().await?)
    }

    async fn post_json_opt<Q, R>(&self, path: &str, request: &Q) -> Result<Option<R>, ClientError>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(self.url(path))
            .json(request)
            .send()
            .await?;
        Self::unwrap_optional(response.json().await?)
    }

    async fn post_empty_opt<R: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<R>, ClientError> {
        let response = self.http_client.post(self.url(path)).send().await?;
        Self::unwrap_optional(response.json().await?)
    }

    // --- Task store --- //

    pub async fn list_tasks(&self, category: Option<Category>) -> Result<Vec<Task>, ClientError> {
        let mut query = Vec::new();
        if let Some(category) = category {
            query.push(("category", category.to_string()));
        }
        self.get_json("/api/tasks", &query).await
    }

    pub async fn create_task(
        &self,
        title: String,
        category: Category,
    ) -> Result<Task, ClientError> {
        self.post_json("/api/tasks", &CreateTaskRequest { title, category })
            .await
    }

    pub async fn update_task(
        &self,
        id: &TaskId,
        patch: TaskPatch,
    ) -> Result<Option<Task>, ClientError> {
        self.post_json_opt(&format!("/api/tasks/{}", id.as_str()), &patch)
            .await
    }

    pub async fn delete_task(&self, id: &TaskId) -> Result<(), ClientError> {
        let response = self
            .http_client
            .delete(self.url(&format!("/api/tasks/{}", id.as_str())))
            .send()
            .await?;
        Self::unwrap_optional::<()>(response.json().await?)?;
        Ok(())
    }

    pub async fn toggle_task(&self, id: &TaskId) -> Result<Option<Task>, ClientError> {
        self.post_empty_opt(&format!("/api/tasks/{}/toggle", id.as_str()))
            .await
    }

    pub async fn toggle_subtask(
        &self,
        id: &TaskId,
        subtask_id: &str,
    ) -> Result<Option<Task>, ClientError> {
        self.post_empty_opt(&format!(
            "/api/tasks/{}/subtasks/{}/toggle",
            id.as_str(),
            subtask_id
        ))
        .await
    }

    // --- Accept (merge) endpoints --- //

    pub async fn accept_suggestions(&self, tasks: Vec<String>) -> Result<Vec<Task>, ClientError> {
        self.post_json(
            "/api/ai/suggest-tasks/accept",
            &AcceptSuggestionsRequest { tasks },
        )
        .await
    }

    pub async fn accept_breakdown(
        &self,
        task_id: TaskId,
        subtasks: Vec<String>,
    ) -> Result<bool, ClientError> {
        self.post_json(
            "/api/ai/breakdown/accept",
            &AcceptBreakdownRequest { task_id, subtasks },
        )
        .await
    }

    pub async fn accept_schedule(
        &self,
        task_id: TaskId,
        suggested_schedule: String,
        reminder_interval: String,
    ) -> Result<Option<Task>, ClientError> {
        self.post_json_opt(
            "/api/ai/schedule/accept",
            &AcceptScheduleRequest {
                task_id,
                suggested_schedule,
                reminder_interval,
            },
        )
        .await
    }

    pub async fn accept_day_plan(
        &self,
        schedule: Vec<ScheduleItem>,
    ) -> Result<Vec<Task>, ClientError> {
        self.post_json("/api/ai/plan-day/accept", &AcceptDayPlanRequest { schedule })
            .await
    }

    /// Prioritizes one category server-side, returning how many tasks were
    /// annotated
    pub async fn prioritize(&self, category: Category) -> Result<usize, ClientError> {
        self.post_json("/api/ai/prioritize", &PrioritizeCategoryRequest { category })
            .await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SuggestionService for ApiClient {
    async fn suggest_tasks(
        &self,
        req: SuggestTasksRequest,
    ) -> Result<SuggestTasksResponse, AiError> {
        Ok(self.post_json("/api/ai/suggest-tasks", &req).await?)
    }

    async fn break_down_task(&self, req: BreakDownRequest) -> Result<BreakdownReply, AiError> {
        Ok(self.post_json("/api/ai/breakdown", &req).await?)
    }

    async fn suggest_schedule(
        &self,
        req: SuggestScheduleRequest,
    ) -> Result<ScheduleSuggestion, AiError> {
        Ok(self.post_json("/api/ai/schedule", &req).await?)
    }

    async fn prioritize_tasks(&self, req: PrioritizeRequest) -> Result<Vec<ScoredTask>, AiError> {
        Ok(self.post_json("/api/ai/prioritize-tasks", &req).await?)
    }

    async fn generate_day_schedule(
        &self,
        req: DayPlanRequest,
    ) -> Result<DayPlanResponse, AiError> {
        Ok(self.post_json("/api/ai/plan-day", &req).await?)
    }
}
