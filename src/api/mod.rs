//! API module
//!
//! HTTP surface of the task manager: the axum server exposing the store and
//! AI collaborator, and the client used by the CLI to talk to it.

pub mod client;
pub mod server;

// Re-export commonly used types
pub use client::{ApiClient, ClientConfig, ClientError};
pub use server::{router, serve, ApiResponse, AppState, ServerConfig};
