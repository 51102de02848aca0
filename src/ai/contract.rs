//! Typed request/response contracts for the AI suggestion service
//!
//! The core is agnostic to how these are transported; it only requires the
//! five operations to be asynchronous, to resolve with the shapes below, and
//! to fail with an [`AiError`] on any malformed or unavailable response.

use serde::{Deserialize, Serialize};

use crate::models::{Priority, TaskId};

/// Errors raised at the collaborator boundary
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service error: {0}")]
    Api(String),

    #[error("missing data in response")]
    MissingData,

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Request for task ideas based on the user's projects and habits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestTasksRequest {
    pub projects: String,
    pub past_habits: String,
}

/// Suggested task titles, in the order the collaborator returned them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestTasksResponse {
    pub tasks: Vec<String>,
}

/// Request to break one task into subtasks; `user_response` carries the
/// answer to a previous clarification round, if any
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakDownRequest {
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_response: Option<String>,
}

/// Wire shape of a breakdown reply: exactly one of the two lists populated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<String>>,
}

/// A breakdown reply after boundary validation
#[derive(Debug, Clone, PartialEq)]
pub enum BreakdownOutcome {
    /// The collaborator needs more information before producing subtasks
    Questions(Vec<String>),
    /// Final subtask titles for the target task
    Subtasks(Vec<String>),
}

impl BreakdownReply {
    pub fn questions(questions: Vec<String>) -> Self {
        Self {
            questions: Some(questions),
            subtasks: None,
        }
    }

    pub fn subtasks(subtasks: Vec<String>) -> Self {
        Self {
            questions: None,
            subtasks: Some(subtasks),
        }
    }

    /// Enforces the exactly-one-populated contract
    pub fn into_outcome(self) -> Result<BreakdownOutcome, AiError> {
        match (self.questions, self.subtasks) {
            (Some(questions), None) => Ok(BreakdownOutcome::Questions(questions)),
            (None, Some(subtasks)) => Ok(BreakdownOutcome::Subtasks(subtasks)),
            (Some(_), Some(_)) => Err(AiError::Malformed(
                "breakdown reply carries both questions and subtasks".to_string(),
            )),
            (None, None) => Err(AiError::Malformed(
                "breakdown reply carries neither questions nor subtasks".to_string(),
            )),
        }
    }
}

/// Request for an optimal schedule and reminder for a single task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestScheduleRequest {
    pub task_name: String,
    pub deadline: String,
    pub user_availability: String,
    pub priority: Priority,
}

/// Schedule suggestion for a single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSuggestion {
    pub suggested_schedule: String,
    pub reminder_interval: String,
    pub reasoning: String,
}

/// One task as submitted for prioritization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskForScoring {
    pub id: TaskId,
    pub description: String,
    pub deadline: String,
    pub importance: Priority,
    pub user_criteria: String,
}

/// Request to score and rank a batch of tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizeRequest {
    pub tasks: Vec<TaskForScoring>,
}

/// A scored task in a prioritization response; the response is a subset of
/// the submitted ids
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredTask {
    pub id: TaskId,
    pub priority_score: f64,
    pub reasoning: String,
}

/// Request for a full-day schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlanRequest {
    pub main_goal: String,
    pub wake_up_time: String,
    pub sleep_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_appointments: Option<String>,
    pub water_intake_liters: f64,
}

/// One line of a generated day plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub time: String,
    pub task: String,
    pub priority: Priority,
}

/// A generated day plan, in display order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlanResponse {
    pub schedule: Vec<ScheduleItem>,
}

/// The external AI collaborator, seen by the core as five async operations
#[async_trait::async_trait]
pub trait SuggestionService: Send + Sync {
    /// Suggest new task titles from the user's projects and habits
    async fn suggest_tasks(&self, req: SuggestTasksRequest)
        -> Result<SuggestTasksResponse, AiError>;

    /// Break a task down, either asking clarifying questions or returning
    /// final subtask titles
    async fn break_down_task(&self, req: BreakDownRequest) -> Result<BreakdownReply, AiError>;

    /// Suggest a schedule and reminder interval for one task
    async fn suggest_schedule(
        &self,
        req: SuggestScheduleRequest,
    ) -> Result<ScheduleSuggestion, AiError>;

    /// Score a batch of tasks; the response covers a subset of submitted ids
    async fn prioritize_tasks(&self, req: PrioritizeRequest) -> Result<Vec<ScoredTask>, AiError>;

    /// Generate a full-day schedule
    async fn generate_day_schedule(&self, req: DayPlanRequest)
        -> Result<DayPlanResponse, AiError>;
}
