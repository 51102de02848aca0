//! HTTP-backed suggestion service
//!
//! This module provides a [`SuggestionService`] implementation that talks to
//! a remote suggestion backend over JSON/HTTP.

use std::sync::Arc;

use reqwest::Client as ReqwestClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::contract::{
    AiError, BreakDownRequest, BreakdownReply, DayPlanRequest, DayPlanResponse, PrioritizeRequest,
    ScheduleSuggestion, ScoredTask, SuggestScheduleRequest, SuggestTasksRequest,
    SuggestTasksResponse, SuggestionService,
};

/// Suggestion service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000".to_string(),
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

/// A [`SuggestionService`] backed by a remote HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpSuggestionService {
    http_client: Arc<ReqwestClient>,
    config: ServiceConfig,
}

impl HttpSuggestionService {
    /// Create a new service with default configuration
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    /// Create a new service with custom configuration
    pub fn with_config(config: ServiceConfig) -> Self {
        Self {
            http_client: Arc::new(ReqwestClient::new()),
            config,
        }
    }

    async fn post<Q, R>(&self, path: &str, request: &Q) -> Result<R, AiError>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self.http_client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(AiError::Api(format!("HTTP error: {}", response.status())));
        }

        let api_response: ApiResponse<R> = response.json().await?;

        if api_response.success {
            api_response.data.ok_or(AiError::MissingData)
        } else {
            Err(AiError::Api(
                api_response
                    .error
                    .unwrap_or_else(|| "Unknown service error".to_string()),
            ))
        }
    }
}

impl Default for HttpSuggestionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SuggestionService for HttpSuggestionService {
    async fn suggest_tasks(
        &self,
        req: SuggestTasksRequest,
    ) -> Result<SuggestTasksResponse, AiError> {
        self.post("/api/suggest-tasks", &req).await
    }

    async fn break_down_task(&self, req: BreakDownRequest) -> Result<BreakdownReply, AiError> {
        self.post("/api/break-down-task", &req).await
    }

    async fn suggest_schedule(
        &self,
        req: SuggestScheduleRequest,
    ) -> Result<ScheduleSuggestion, AiError> {
        self.post("/api/suggest-schedule", &req).await
    }

    async fn prioritize_tasks(&self, req: PrioritizeRequest) -> Result<Vec<ScoredTask>, AiError> {
        self.post("/api/prioritize-tasks", &req).await
    }

    async fn generate_day_schedule(
        &self,
        req: DayPlanRequest,
    ) -> Result<DayPlanResponse, AiError> {
        self.post("/api/generate-day-schedule", &req).await
    }
}
