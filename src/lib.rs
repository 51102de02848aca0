//! Taskwise library crate
//!
//! An AI-augmented personal task manager. The task store and its
//! reconciliation rules live in [`models`] and [`reconcile`]; the
//! asynchronous AI interactions are modeled as state machines in [`flows`]
//! against the collaborator contract in [`ai`]; [`api`] exposes everything
//! over HTTP; [`cli`] ties it together for the terminal.

pub mod ai;
pub mod api;
pub mod cli;
pub mod flows;
pub mod models;
pub mod reconcile;

pub use models::{Category, Priority, Store, StoreHandle, Subtask, Task, TaskId, TaskPatch};
