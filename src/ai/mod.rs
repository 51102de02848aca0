//! AI collaborator module
//!
//! This module defines the typed contract with the external AI suggestion
//! service and an HTTP-backed implementation of it.

pub mod contract;
pub mod http;

// Re-export commonly used types
pub use contract::{
    AiError, BreakDownRequest, BreakdownOutcome, BreakdownReply, DayPlanRequest, DayPlanResponse,
    PrioritizeRequest, ScheduleItem, ScheduleSuggestion, ScoredTask, SuggestScheduleRequest,
    SuggestTasksRequest, SuggestTasksResponse, SuggestionService, TaskForScoring,
};
pub use http::{HttpSuggestionService, ServiceConfig};
