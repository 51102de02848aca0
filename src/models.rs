//! Core models for the taskwise library
//!
//! This module contains the task/subtask entity model and the authoritative
//! in-memory task store. All mutation paths funnel through [`Store`] (and its
//! shared wrapper [`StoreHandle`]) so the collection invariants are checkable
//! in one place.

use chrono::{Duration, NaiveDate, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

lazy_static! {
    /// Seed tasks used by `serve --example` for demos and UI testing.
    /// Deadlines are relative to today so the seed never goes stale.
    static ref EXAMPLE_TASKS: Vec<(&'static str, Priority, Category, Option<NaiveDate>)> = {
        let today = Utc::now().date_naive();
        vec![
            (
                "Plan company offsite event",
                Priority::High,
                Category::ThisWeek,
                Some(today + Duration::days(21)),
            ),
            (
                "Develop Q3 marketing strategy",
                Priority::High,
                Category::ThisWeek,
                Some(today + Duration::days(7)),
            ),
            (
                "Finalize Q2 performance reviews",
                Priority::Medium,
                Category::Today,
                Some(today + Duration::days(1)),
            ),
            (
                "Book flight for leadership summit",
                Priority::High,
                Category::Today,
                Some(today + Duration::days(3)),
            ),
            (
                "Outline 2025 product roadmap",
                Priority::Low,
                Category::LongTerm,
                Some(today + Duration::days(60)),
            ),
        ]
    };
}

/// Task priority, also forwarded to the AI collaborator as an importance hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// The partition used for filtered views; a task belongs to exactly one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Today,
    #[serde(rename = "This Week")]
    ThisWeek,
    #[serde(rename = "Long Term")]
    LongTerm,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Today => write!(f, "Today"),
            Category::ThisWeek => write!(f, "This Week"),
            Category::LongTerm => write!(f, "Long Term"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', " ").as_str() {
            "today" => Ok(Category::Today),
            "this week" | "week" => Ok(Category::ThisWeek),
            "long term" | "long" => Ok(Category::LongTerm),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// Opaque task identifier, unique across the collection for the task's
/// lifetime. Derived from a millisecond timestamp plus a random suffix;
/// uniqueness is the only required property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh id
    pub fn fresh() -> Self {
        Self(format!(
            "task-{}-{:04x}",
            Utc::now().timestamp_millis(),
            rand::random::<u16>()
        ))
    }

    /// Wraps an existing id string (e.g. one received over the wire)
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subtask identifier, unique within its parent task only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubtaskId(String);

impl SubtaskId {
    pub fn fresh() -> Self {
        Self(format!(
            "sub-{}-{:04x}",
            Utc::now().timestamp_millis(),
            rand::random::<u16>()
        ))
    }

    /// Wraps an existing id string (e.g. one received over the wire)
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubtaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A child checklist item belonging to exactly one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub title: String,
    pub completed: bool,
}

impl Subtask {
    /// Creates a new incomplete subtask with a fresh id
    pub fn new(title: String) -> Self {
        Self {
            id: SubtaskId::fresh(),
            title,
            completed: false,
        }
    }
}

/// A user-visible to-do item.
///
/// `priority_score` and `reasoning` are set only by the prioritization flow
/// and are present together or absent together. `suggested_schedule` and
/// `reminder_interval` are set only by the scheduling flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub completed: bool,
    pub priority: Priority,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    pub subtasks: Vec<Subtask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_criteria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Task {
    /// Creates a new incomplete task with a fresh id, default Medium priority
    /// and an empty subtask list
    pub fn new(title: String, category: Category) -> Self {
        Self::with_priority(title, category, Priority::Medium)
    }

    /// Creates a new task with an explicit priority (used by the day-plan merge)
    pub fn with_priority(title: String, category: Category, priority: Priority) -> Self {
        Self {
            id: TaskId::fresh(),
            title,
            completed: false,
            priority,
            category,
            deadline: None,
            subtasks: Vec::new(),
            user_criteria: None,
            suggested_schedule: None,
            reminder_interval: None,
            priority_score: None,
            reasoning: None,
        }
    }
}

/// A partial update applied by [`Store::update`]. Absent fields are left
/// unchanged; `clear_deadline` removes the deadline explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub deadline: Option<NaiveDate>,
    pub clear_deadline: bool,
    pub user_criteria: Option<String>,
    pub suggested_schedule: Option<String>,
    pub reminder_interval: Option<String>,
}

/// The authoritative in-memory task collection, most-recent-first.
///
/// Every operation is synchronous and total: targeting an absent id is a
/// silent no-op, never an error, because the UI may race a deletion against a
/// pending async suggestion.
#[derive(Debug, Default)]
pub struct Store {
    tasks: Vec<Task>,
}

impl Store {
    /// Creates an empty store
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Creates a store pre-populated with the example seed tasks
    pub fn with_examples() -> Self {
        let mut store = Self::new();
        // Seed in reverse so the listing order matches the seed table
        for (title, priority, category, deadline) in EXAMPLE_TASKS.iter().rev() {
            let mut task = Task::with_priority((*title).to_string(), *category, *priority);
            task.deadline = *deadline;
            store.tasks.insert(0, task);
        }
        if let Some(task) = store.tasks.first_mut() {
            task.user_criteria = Some("Must be budget-friendly".to_string());
        }
        store
    }

    /// Creates a new task and prepends it to the collection
    /// (most-recent-first is the display contract).
    ///
    /// Titles are non-empty by contract; a blank title stores nothing and
    /// returns `None`.
    pub fn create(&mut self, title: String, category: Category) -> Option<Task> {
        let title = title.trim().to_string();
        if title.is_empty() {
            tracing::debug!("blank title, skipping create");
            return None;
        }
        let task = Task::new(title, category);
        self.tasks.insert(0, task.clone());
        Some(task)
    }

    /// Inserts a batch of tasks ahead of all existing tasks, preserving the
    /// batch's internal order. Used by the suggestion and day-plan merges.
    pub fn insert_front(&mut self, batch: Vec<Task>) {
        for task in batch.into_iter().rev() {
            self.tasks.insert(0, task);
        }
    }

    /// Applies a patch to the task with the given id; no-op if absent
    pub fn update(&mut self, id: &TaskId, patch: TaskPatch) {
        let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) else {
            tracing::debug!(task = %id, "update target vanished, skipping");
            return;
        };
        if let Some(title) = patch.title {
            let trimmed = title.trim().to_string();
            if !trimmed.is_empty() {
                task.title = trimmed;
            }
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(category) = patch.category {
            task.category = category;
        }
        if patch.clear_deadline {
            task.deadline = None;
        } else if let Some(deadline) = patch.deadline {
            task.deadline = Some(deadline);
        }
        if let Some(criteria) = patch.user_criteria {
            task.user_criteria = if criteria.is_empty() {
                None
            } else {
                Some(criteria)
            };
        }
        if let Some(schedule) = patch.suggested_schedule {
            task.suggested_schedule = Some(schedule);
        }
        if let Some(interval) = patch.reminder_interval {
            task.reminder_interval = Some(interval);
        }
    }

    /// Flips the completion flag of a task; no-op if absent
    pub fn toggle_completed(&mut self, id: &TaskId) {
        if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) {
            task.completed = !task.completed;
        }
    }

    /// Flips the completion flag of a subtask; no-op if either id fails to resolve
    pub fn toggle_subtask(&mut self, id: &TaskId, subtask_id: &SubtaskId) {
        if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) {
            if let Some(subtask) = task.subtasks.iter_mut().find(|s| &s.id == subtask_id) {
                subtask.completed = !subtask.completed;
            }
        }
    }

    /// Removes the task and all its subtasks; no-op if absent
    pub fn delete(&mut self, id: &TaskId) {
        self.tasks.retain(|t| &t.id != id);
    }

    /// Gets a task by id
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Returns an immutable snapshot of the whole collection
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    /// Returns a snapshot of the tasks in one category, in display order
    pub fn in_category(&self, category: Category) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.category == category)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    // Direct access for the reconciliation engine's batch-local resort.
    // Fine since we're in the same crate.
    pub(crate) fn tasks_mut(&mut self) -> &mut Vec<Task> {
        &mut self.tasks
    }
}

/// Shared, cloneable handle to the task store.
///
/// Mutations are serialized through the inner mutex and observers are
/// notified on every change via a broadcast channel.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<Mutex<Store>>,
    update_tx: Arc<tokio::sync::broadcast::Sender<()>>,
}

impl StoreHandle {
    pub fn new(store: Store) -> Self {
        // Capacity covers bursts of merges; lagged receivers just coalesce
        let (tx, _rx) = tokio::sync::broadcast::channel(100);

        Self {
            inner: Arc::new(Mutex::new(store)),
            update_tx: Arc::new(tx),
        }
    }

    /// Runs a mutation against the store and notifies observers
    pub fn with_store<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Store) -> R,
    {
        let mut store = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let result = f(&mut store);

        let _ = self.update_tx.send(());

        result
    }

    /// Runs a read-only closure against the store without notifying observers
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Store) -> R,
    {
        let store = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&store)
    }

    pub fn create(&self, title: String, category: Category) -> Option<Task> {
        tracing::debug!(%category, "creating task");
        self.with_store(|store| store.create(title, category))
    }

    pub fn update(&self, id: &TaskId, patch: TaskPatch) {
        self.with_store(|store| store.update(id, patch))
    }

    pub fn toggle_completed(&self, id: &TaskId) {
        self.with_store(|store| store.toggle_completed(id))
    }

    pub fn toggle_subtask(&self, id: &TaskId, subtask_id: &SubtaskId) {
        self.with_store(|store| store.toggle_subtask(id, subtask_id))
    }

    pub fn delete(&self, id: &TaskId) {
        tracing::debug!(task = %id, "deleting task");
        self.with_store(|store| store.delete(id))
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.read(|store| store.get(id).cloned())
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.read(|store| store.snapshot())
    }

    pub fn in_category(&self, category: Category) -> Vec<Task> {
        self.read(|store| store.in_category(category))
    }

    // Subscribe to state updates
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.update_tx.subscribe()
    }
}
