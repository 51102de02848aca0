//! Flow orchestrator
//!
//! Each AI-assisted feature is modeled as a short-lived state machine, one
//! instance per open interaction. A flow owns its in-flight request as a
//! spawned task handle: dropping the flow (closing the dialog) aborts the
//! request, so a late result can never be applied to the store. At most one
//! request is in flight per flow; starting another while `Requesting` fails
//! with [`FlowError::Busy`]. A failed call transitions the flow to `Failed`
//! and leaves the store untouched.
//!
//! The breakdown clarification loop is unbounded: termination depends on the
//! collaborator eventually returning subtasks instead of more questions.

use std::future::Future;
use std::mem;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;

use crate::ai::{
    AiError, BreakDownRequest, BreakdownOutcome, DayPlanRequest, PrioritizeRequest, ScheduleItem,
    ScheduleSuggestion, SuggestScheduleRequest, SuggestTasksRequest, SuggestionService,
    TaskForScoring,
};
use crate::models::{Category, StoreHandle, Task, TaskId, TaskPatch};
use crate::reconcile;

/// Orchestrator misuse errors; collaborator failures are [`AiError`]s held
/// in the flow's `Failed` state instead
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("a request is already in flight for this flow")]
    Busy,

    #[error("invalid flow state: {0}")]
    InvalidState(&'static str),
}

/// Externally visible flow phase, for UIs and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Requesting,
    AwaitingClarification,
    Ready,
    Failed,
}

/// One AI round-trip: Idle -> Requesting -> Ready | Failed.
/// Shared by the single-shot flows; breakdown has its own state machine.
enum Pending<T> {
    Idle,
    Requesting(JoinHandle<Result<T, AiError>>),
    Ready(T),
    Failed(AiError),
}

impl<T: Send + 'static> Pending<T> {
    fn phase(&self) -> Phase {
        match self {
            Pending::Idle => Phase::Idle,
            Pending::Requesting(_) => Phase::Requesting,
            Pending::Ready(_) => Phase::Ready,
            Pending::Failed(_) => Phase::Failed,
        }
    }

    /// Spawns the request, entering `Requesting`
    fn begin<F>(&mut self, fut: F) -> Result<(), FlowError>
    where
        F: Future<Output = Result<T, AiError>> + Send + 'static,
    {
        if matches!(self, Pending::Requesting(_)) {
            return Err(FlowError::Busy);
        }
        *self = Pending::Requesting(tokio::spawn(fut));
        Ok(())
    }

    /// Awaits the in-flight request, entering `Ready` or `Failed`.
    /// No-op unless `Requesting`.
    async fn resolve(&mut self) {
        if !matches!(self, Pending::Requesting(_)) {
            return;
        }
        if let Pending::Requesting(handle) = mem::replace(self, Pending::Idle) {
            *self = match handle.await {
                Ok(Ok(value)) => Pending::Ready(value),
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "collaborator call failed");
                    Pending::Failed(err)
                }
                Err(join_err) => {
                    Pending::Failed(AiError::Api(format!("request task failed: {}", join_err)))
                }
            };
        }
    }

    fn abort_in_flight(&self) {
        if let Pending::Requesting(handle) = self {
            handle.abort();
        }
    }

    fn ready(&self) -> Option<&T> {
        match self {
            Pending::Ready(value) => Some(value),
            _ => None,
        }
    }

    fn error(&self) -> Option<&AiError> {
        match self {
            Pending::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Suggest-tasks flow: Idle -> Requesting -> Ready(titles) | Failed
pub struct SuggestTasksFlow {
    state: Pending<Vec<String>>,
}

impl SuggestTasksFlow {
    pub fn new() -> Self {
        Self {
            state: Pending::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn suggestions(&self) -> Option<&[String]> {
        self.state.ready().map(|titles| titles.as_slice())
    }

    pub fn error(&self) -> Option<&AiError> {
        self.state.error()
    }

    /// Sends the request to the collaborator
    pub fn begin(
        &mut self,
        svc: Arc<dyn SuggestionService>,
        req: SuggestTasksRequest,
    ) -> Result<(), FlowError> {
        self.state
            .begin(async move { svc.suggest_tasks(req).await.map(|r| r.tasks) })
    }

    /// Awaits the in-flight request
    pub async fn resolve(&mut self) -> Phase {
        self.state.resolve().await;
        self.phase()
    }

    /// Accepts the suggestions, merging them into the store and consuming
    /// the flow instance
    pub fn accept(mut self, store: &StoreHandle) -> Result<Vec<Task>, FlowError> {
        match mem::replace(&mut self.state, Pending::Idle) {
            Pending::Ready(titles) => Ok(reconcile::merge_suggested_tasks(store, titles)),
            _ => Err(FlowError::InvalidState("suggestions not ready")),
        }
    }
}

impl Default for SuggestTasksFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SuggestTasksFlow {
    fn drop(&mut self) {
        self.state.abort_in_flight();
    }
}

/// Breakdown flow for one target task, with an unbounded clarification loop:
/// Idle -> Requesting -> AwaitingClarification <-> Requesting -> Ready | Failed
pub struct BreakdownFlow {
    task_id: TaskId,
    task_title: String,
    state: BreakdownState,
}

enum BreakdownState {
    Idle,
    Requesting(JoinHandle<Result<BreakdownOutcome, AiError>>),
    AwaitingClarification(Vec<String>),
    Ready(Vec<String>),
    Failed(AiError),
}

impl BreakdownFlow {
    /// Creates a flow keyed to the target task
    pub fn new(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            state: BreakdownState::Idle,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn phase(&self) -> Phase {
        match &self.state {
            BreakdownState::Idle => Phase::Idle,
            BreakdownState::Requesting(_) => Phase::Requesting,
            BreakdownState::AwaitingClarification(_) => Phase::AwaitingClarification,
            BreakdownState::Ready(_) => Phase::Ready,
            BreakdownState::Failed(_) => Phase::Failed,
        }
    }

    pub fn questions(&self) -> Option<&[String]> {
        match &self.state {
            BreakdownState::AwaitingClarification(questions) => Some(questions),
            _ => None,
        }
    }

    pub fn subtasks(&self) -> Option<&[String]> {
        match &self.state {
            BreakdownState::Ready(subtasks) => Some(subtasks),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AiError> {
        match &self.state {
            BreakdownState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Sends the initial breakdown request
    pub fn begin(&mut self, svc: Arc<dyn SuggestionService>) -> Result<(), FlowError> {
        match self.state {
            BreakdownState::Idle => self.request(svc, None),
            BreakdownState::Requesting(_) => Err(FlowError::Busy),
            _ => Err(FlowError::InvalidState("breakdown already started")),
        }
    }

    /// Submits a clarification response, re-entering `Requesting`
    pub fn respond(
        &mut self,
        svc: Arc<dyn SuggestionService>,
        answer: String,
    ) -> Result<(), FlowError> {
        match self.state {
            BreakdownState::AwaitingClarification(_) => self.request(svc, Some(answer)),
            BreakdownState::Requesting(_) => Err(FlowError::Busy),
            _ => Err(FlowError::InvalidState("no clarification pending")),
        }
    }

    fn request(
        &mut self,
        svc: Arc<dyn SuggestionService>,
        user_response: Option<String>,
    ) -> Result<(), FlowError> {
        let req = BreakDownRequest {
            task: self.task_title.clone(),
            user_response,
        };
        self.state = BreakdownState::Requesting(tokio::spawn(async move {
            svc.break_down_task(req).await.and_then(|r| r.into_outcome())
        }));
        Ok(())
    }

    /// Awaits the in-flight request; questions loop back to
    /// `AwaitingClarification`, subtasks are terminal. No-op unless
    /// `Requesting`.
    pub async fn resolve(&mut self) -> Phase {
        if !matches!(self.state, BreakdownState::Requesting(_)) {
            return self.phase();
        }
        if let BreakdownState::Requesting(handle) =
            mem::replace(&mut self.state, BreakdownState::Idle)
        {
            self.state = match handle.await {
                Ok(Ok(BreakdownOutcome::Questions(questions))) => {
                    BreakdownState::AwaitingClarification(questions)
                }
                Ok(Ok(BreakdownOutcome::Subtasks(subtasks))) => BreakdownState::Ready(subtasks),
                Ok(Err(err)) => {
                    tracing::warn!(task = %self.task_id, error = %err, "breakdown call failed");
                    BreakdownState::Failed(err)
                }
                Err(join_err) => BreakdownState::Failed(AiError::Api(format!(
                    "request task failed: {}",
                    join_err
                ))),
            };
        }
        self.phase()
    }

    /// Accepts the generated subtasks, appending them to the target task.
    /// Returns false if the target was deleted while the flow was running.
    pub fn accept(mut self, store: &StoreHandle) -> Result<bool, FlowError> {
        match mem::replace(&mut self.state, BreakdownState::Idle) {
            BreakdownState::Ready(titles) => {
                Ok(reconcile::merge_breakdown(store, &self.task_id, titles))
            }
            _ => Err(FlowError::InvalidState("subtasks not ready")),
        }
    }
}

impl Drop for BreakdownFlow {
    fn drop(&mut self) {
        if let BreakdownState::Requesting(handle) = &self.state {
            handle.abort();
        }
    }
}

/// Schedule-suggestion flow for one target task:
/// Idle -> Requesting -> Ready(suggestion) | Failed
pub struct ScheduleFlow {
    task_id: TaskId,
    state: Pending<ScheduleSuggestion>,
}

impl ScheduleFlow {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: Pending::Idle,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn suggestion(&self) -> Option<&ScheduleSuggestion> {
        self.state.ready()
    }

    pub fn error(&self) -> Option<&AiError> {
        self.state.error()
    }

    pub fn begin(
        &mut self,
        svc: Arc<dyn SuggestionService>,
        req: SuggestScheduleRequest,
    ) -> Result<(), FlowError> {
        self.state
            .begin(async move { svc.suggest_schedule(req).await })
    }

    pub async fn resolve(&mut self) -> Phase {
        self.state.resolve().await;
        self.phase()
    }

    /// Applies the suggestion as a direct update to the one known target;
    /// a deleted target makes this a silent no-op
    pub fn accept(mut self, store: &StoreHandle) -> Result<(), FlowError> {
        match mem::replace(&mut self.state, Pending::Idle) {
            Pending::Ready(suggestion) => {
                store.update(
                    &self.task_id,
                    TaskPatch {
                        suggested_schedule: Some(suggestion.suggested_schedule),
                        reminder_interval: Some(suggestion.reminder_interval),
                        ..Default::default()
                    },
                );
                Ok(())
            }
            _ => Err(FlowError::InvalidState("suggestion not ready")),
        }
    }
}

impl Drop for ScheduleFlow {
    fn drop(&mut self) {
        self.state.abort_in_flight();
    }
}

/// Day-plan flow: Idle -> Requesting -> Ready(schedule) | Failed
pub struct PlanDayFlow {
    state: Pending<Vec<ScheduleItem>>,
}

impl PlanDayFlow {
    pub fn new() -> Self {
        Self {
            state: Pending::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn schedule(&self) -> Option<&[ScheduleItem]> {
        self.state.ready().map(|items| items.as_slice())
    }

    pub fn error(&self) -> Option<&AiError> {
        self.state.error()
    }

    pub fn begin(
        &mut self,
        svc: Arc<dyn SuggestionService>,
        req: DayPlanRequest,
    ) -> Result<(), FlowError> {
        self.state
            .begin(async move { svc.generate_day_schedule(req).await.map(|r| r.schedule) })
    }

    pub async fn resolve(&mut self) -> Phase {
        self.state.resolve().await;
        self.phase()
    }

    /// Accepts the plan, creating one task per schedule line
    pub fn accept(mut self, store: &StoreHandle) -> Result<Vec<Task>, FlowError> {
        match mem::replace(&mut self.state, Pending::Idle) {
            Pending::Ready(items) => Ok(reconcile::merge_day_plan(store, items)),
            _ => Err(FlowError::InvalidState("schedule not ready")),
        }
    }
}

impl Default for PlanDayFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PlanDayFlow {
    fn drop(&mut self) {
        self.state.abort_in_flight();
    }
}

/// Prioritizes the tasks of one category in a single round-trip.
///
/// Snapshots the category, submits it (defaulting missing deadlines to a
/// week out), and applies the batch-local resort. Returns how many tasks
/// were annotated. An empty category skips the collaborator entirely.
pub async fn prioritize(
    store: &StoreHandle,
    svc: &Arc<dyn SuggestionService>,
    category: Category,
) -> Result<usize, AiError> {
    let batch = store.in_category(category);
    if batch.is_empty() {
        return Ok(0);
    }

    let default_deadline = (Utc::now().date_naive() + Duration::days(7))
        .format("%Y-%m-%d")
        .to_string();
    let tasks = batch
        .iter()
        .map(|t| TaskForScoring {
            id: t.id.clone(),
            description: t.title.clone(),
            deadline: t
                .deadline
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| default_deadline.clone()),
            importance: t.priority,
            user_criteria: t.user_criteria.clone().unwrap_or_default(),
        })
        .collect();

    let scored = svc.prioritize_tasks(PrioritizeRequest { tasks }).await?;
    Ok(reconcile::merge_prioritization(store, scored))
}

/// Which dialog is open, as a closed sum type so invalid combinations are
/// unrepresentable. `Edit` carries no flow: editing is a local form that
/// ends in a plain `update`.
pub enum OpenDialog {
    None,
    SuggestTasks(SuggestTasksFlow),
    Breakdown(BreakdownFlow),
    Schedule(ScheduleFlow),
    Edit(TaskId),
    PlanDay(PlanDayFlow),
}

/// Owner of the currently open dialog. Opening a dialog discards any prior
/// instance (aborting its in-flight request); closing discards
/// unconditionally. No partial progress survives close/reopen.
pub struct Session {
    dialog: OpenDialog,
}

impl Session {
    pub fn new() -> Self {
        Self {
            dialog: OpenDialog::None,
        }
    }

    pub fn dialog(&self) -> &OpenDialog {
        &self.dialog
    }

    pub fn dialog_mut(&mut self) -> &mut OpenDialog {
        &mut self.dialog
    }

    /// Takes the open dialog for acceptance, leaving `None`
    pub fn take(&mut self) -> OpenDialog {
        mem::replace(&mut self.dialog, OpenDialog::None)
    }

    pub fn open_suggest_tasks(&mut self) {
        self.dialog = OpenDialog::SuggestTasks(SuggestTasksFlow::new());
    }

    pub fn open_breakdown(&mut self, task: &Task) {
        self.dialog = OpenDialog::Breakdown(BreakdownFlow::new(task));
    }

    pub fn open_schedule(&mut self, task_id: TaskId) {
        self.dialog = OpenDialog::Schedule(ScheduleFlow::new(task_id));
    }

    pub fn open_edit(&mut self, task_id: TaskId) {
        self.dialog = OpenDialog::Edit(task_id);
    }

    pub fn open_plan_day(&mut self) {
        self.dialog = OpenDialog::PlanDay(PlanDayFlow::new());
    }

    pub fn close(&mut self) {
        self.dialog = OpenDialog::None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{BreakdownReply, DayPlanResponse, ScoredTask, SuggestTasksResponse};
    use crate::models::{Priority, Store};
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A collaborator scripted with canned replies, popped in order
    #[derive(Default)]
    struct ScriptedService {
        suggest: Mutex<VecDeque<Result<SuggestTasksResponse, AiError>>>,
        breakdown: Mutex<VecDeque<Result<BreakdownReply, AiError>>>,
        schedule: Mutex<VecDeque<Result<ScheduleSuggestion, AiError>>>,
        prioritize: Mutex<VecDeque<Result<Vec<ScoredTask>, AiError>>>,
        day: Mutex<VecDeque<Result<DayPlanResponse, AiError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedService {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn pop<T>(queue: &Mutex<VecDeque<Result<T, AiError>>>) -> Result<T, AiError> {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AiError::Api("unscripted call".to_string())))
        }
    }

    #[async_trait::async_trait]
    impl SuggestionService for ScriptedService {
        async fn suggest_tasks(
            &self,
            _req: SuggestTasksRequest,
        ) -> Result<SuggestTasksResponse, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Self::pop(&self.suggest)
        }

        async fn break_down_task(
            &self,
            _req: BreakDownRequest,
        ) -> Result<BreakdownReply, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Self::pop(&self.breakdown)
        }

        async fn suggest_schedule(
            &self,
            _req: SuggestScheduleRequest,
        ) -> Result<ScheduleSuggestion, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Self::pop(&self.schedule)
        }

        async fn prioritize_tasks(
            &self,
            _req: PrioritizeRequest,
        ) -> Result<Vec<ScoredTask>, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Self::pop(&self.prioritize)
        }

        async fn generate_day_schedule(
            &self,
            _req: DayPlanRequest,
        ) -> Result<DayPlanResponse, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Self::pop(&self.day)
        }
    }

    fn suggest_req() -> SuggestTasksRequest {
        SuggestTasksRequest {
            projects: "launch website".to_string(),
            past_habits: "morning runs".to_string(),
        }
    }

    #[tokio::test]
    async fn test_suggest_flow_happy_path() {
        let store = StoreHandle::new(Store::new());
        let svc = Arc::new(ScriptedService::default());
        svc.suggest.lock().unwrap().push_back(Ok(SuggestTasksResponse {
            tasks: vec!["Set up hosting".to_string(), "Go for a run".to_string()],
        }));
        let svc: Arc<dyn SuggestionService> = svc;

        let mut flow = SuggestTasksFlow::new();
        assert_eq!(flow.phase(), Phase::Idle);
        flow.begin(svc.clone(), suggest_req()).unwrap();
        assert_eq!(flow.phase(), Phase::Requesting);

        assert_eq!(flow.resolve().await, Phase::Ready);
        assert_eq!(flow.suggestions().unwrap().len(), 2);

        let created = flow.accept(&store).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(store.snapshot()[0].title, "Set up hosting");
    }

    #[tokio::test]
    async fn test_busy_flag_rejects_second_request() {
        let svc: Arc<dyn SuggestionService> = Arc::new(ScriptedService::default());
        let mut flow = SuggestTasksFlow::new();
        flow.begin(svc.clone(), suggest_req()).unwrap();

        assert!(matches!(
            flow.begin(svc, suggest_req()),
            Err(FlowError::Busy)
        ));
    }

    #[tokio::test]
    async fn test_failed_flow_leaves_store_untouched() {
        let store = StoreHandle::new(Store::new());
        store.create("Untouched".to_string(), Category::Today).unwrap();
        let before = store.snapshot();

        let svc: Arc<dyn SuggestionService> = Arc::new(ScriptedService::default());
        let mut flow = SuggestTasksFlow::new();
        flow.begin(svc, suggest_req()).unwrap();

        assert_eq!(flow.resolve().await, Phase::Failed);
        assert!(flow.error().is_some());
        assert!(flow.accept(&store).is_err());
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_breakdown_clarification_loop() {
        let store = StoreHandle::new(Store::new());
        let task = store.create("Plan trip".to_string(), Category::Today).unwrap();

        let svc = Arc::new(ScriptedService::default());
        svc.breakdown
            .lock()
            .unwrap()
            .push_back(Ok(BreakdownReply::questions(vec![
                "Where are you going?".to_string(),
            ])));
        svc.breakdown
            .lock()
            .unwrap()
            .push_back(Ok(BreakdownReply::subtasks(vec![
                "Book flight".to_string(),
                "Book hotel".to_string(),
            ])));
        let svc: Arc<dyn SuggestionService> = svc;

        let mut flow = BreakdownFlow::new(&task);
        flow.begin(svc.clone()).unwrap();
        assert_eq!(flow.resolve().await, Phase::AwaitingClarification);
        assert_eq!(flow.questions().unwrap(), ["Where are you going?"]);

        flow.respond(svc, "Lisbon, next month".to_string()).unwrap();
        assert_eq!(flow.resolve().await, Phase::Ready);
        assert_eq!(flow.subtasks().unwrap().len(), 2);

        assert!(flow.accept(&store).unwrap());
        let subtasks = &store.get(&task.id).unwrap().subtasks;
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[0].title, "Book flight");
        assert_eq!(subtasks[1].title, "Book hotel");
        assert!(!subtasks[0].completed);
        assert_ne!(subtasks[0].id, subtasks[1].id);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent_once_ready() {
        let store = StoreHandle::new(Store::new());
        let svc = Arc::new(ScriptedService::default());
        svc.suggest.lock().unwrap().push_back(Ok(SuggestTasksResponse {
            tasks: vec!["Water the plants".to_string()],
        }));
        let svc: Arc<dyn SuggestionService> = svc;

        let mut flow = SuggestTasksFlow::new();
        flow.begin(svc, suggest_req()).unwrap();
        assert_eq!(flow.resolve().await, Phase::Ready);

        // Polling again must not discard the result
        assert_eq!(flow.resolve().await, Phase::Ready);
        assert_eq!(flow.suggestions().unwrap(), ["Water the plants"]);
        assert_eq!(flow.accept(&store).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_breakdown_resolve_keeps_pending_questions() {
        let store = StoreHandle::new(Store::new());
        let task = store.create("Plan trip".to_string(), Category::Today).unwrap();

        let svc = Arc::new(ScriptedService::default());
        svc.breakdown
            .lock()
            .unwrap()
            .push_back(Ok(BreakdownReply::questions(vec![
                "When do you leave?".to_string(),
            ])));
        let svc: Arc<dyn SuggestionService> = svc;

        let mut flow = BreakdownFlow::new(&task);
        flow.begin(svc).unwrap();
        assert_eq!(flow.resolve().await, Phase::AwaitingClarification);

        // Polling again must not reset the dialog
        assert_eq!(flow.resolve().await, Phase::AwaitingClarification);
        assert_eq!(flow.questions().unwrap(), ["When do you leave?"]);
    }

    #[tokio::test]
    async fn test_breakdown_respond_requires_pending_questions() {
        let store = StoreHandle::new(Store::new());
        let task = store.create("Plan trip".to_string(), Category::Today).unwrap();
        let svc: Arc<dyn SuggestionService> = Arc::new(ScriptedService::default());

        let mut flow = BreakdownFlow::new(&task);
        assert!(matches!(
            flow.respond(svc, "eager answer".to_string()),
            Err(FlowError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_breakdown_does_not_resurrect_deleted_task() {
        let store = StoreHandle::new(Store::new());
        let task = store.create("Doomed".to_string(), Category::Today).unwrap();

        let svc = Arc::new(ScriptedService::default());
        svc.breakdown
            .lock()
            .unwrap()
            .push_back(Ok(BreakdownReply::subtasks(vec!["Step".to_string()])));
        let svc: Arc<dyn SuggestionService> = svc;

        let mut flow = BreakdownFlow::new(&task);
        flow.begin(svc).unwrap();
        // Deleted while the request is in flight
        store.delete(&task.id);

        assert_eq!(flow.resolve().await, Phase::Ready);
        assert!(!flow.accept(&store).unwrap());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_flow_applies_direct_update() {
        let store = StoreHandle::new(Store::new());
        let task = store.create("Write talk".to_string(), Category::ThisWeek).unwrap();

        let svc = Arc::new(ScriptedService::default());
        svc.schedule.lock().unwrap().push_back(Ok(ScheduleSuggestion {
            suggested_schedule: "2026-09-01 09:00".to_string(),
            reminder_interval: "1 day before".to_string(),
            reasoning: "morning focus".to_string(),
        }));
        let svc: Arc<dyn SuggestionService> = svc;

        let mut flow = ScheduleFlow::new(task.id.clone());
        flow.begin(
            svc,
            SuggestScheduleRequest {
                task_name: task.title.clone(),
                deadline: "2026-09-02 17:00".to_string(),
                user_availability: "Weekdays 9am to 5pm".to_string(),
                priority: Priority::Medium,
            },
        )
        .unwrap();
        assert_eq!(flow.resolve().await, Phase::Ready);
        flow.accept(&store).unwrap();

        let updated = store.get(&task.id).unwrap();
        assert_eq!(
            updated.suggested_schedule.as_deref(),
            Some("2026-09-01 09:00")
        );
        assert_eq!(updated.reminder_interval.as_deref(), Some("1 day before"));
    }

    #[tokio::test]
    async fn test_schedule_accept_with_deleted_target_is_noop() {
        let store = StoreHandle::new(Store::new());
        let task = store.create("Gone soon".to_string(), Category::Today).unwrap();

        let svc = Arc::new(ScriptedService::default());
        svc.schedule.lock().unwrap().push_back(Ok(ScheduleSuggestion {
            suggested_schedule: "tomorrow".to_string(),
            reminder_interval: "1 hour before".to_string(),
            reasoning: "n/a".to_string(),
        }));
        let svc: Arc<dyn SuggestionService> = svc;

        let mut flow = ScheduleFlow::new(task.id.clone());
        flow.begin(
            svc,
            SuggestScheduleRequest {
                task_name: task.title.clone(),
                deadline: "2026-09-02".to_string(),
                user_availability: "anytime".to_string(),
                priority: Priority::Low,
            },
        )
        .unwrap();
        store.delete(&task.id);
        flow.resolve().await;

        // Stale target: accept succeeds as a no-op
        flow.accept(&store).unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_plan_day_flow() {
        let store = StoreHandle::new(Store::new());
        let svc = Arc::new(ScriptedService::default());
        svc.day.lock().unwrap().push_back(Ok(DayPlanResponse {
            schedule: vec![
                ScheduleItem {
                    time: "9:00 AM".to_string(),
                    task: "Proposal draft".to_string(),
                    priority: Priority::High,
                },
                ScheduleItem {
                    time: "3:00 PM".to_string(),
                    task: "Inbox zero".to_string(),
                    priority: Priority::Low,
                },
            ],
        }));
        let svc: Arc<dyn SuggestionService> = svc;

        let mut flow = PlanDayFlow::new();
        flow.begin(
            svc,
            DayPlanRequest {
                main_goal: "Finish the proposal".to_string(),
                wake_up_time: "8:00 AM".to_string(),
                sleep_time: "11:00 PM".to_string(),
                fixed_appointments: None,
                water_intake_liters: 3.0,
            },
        )
        .unwrap();
        assert_eq!(flow.resolve().await, Phase::Ready);

        let created = flow.accept(&store).unwrap();
        assert_eq!(created.len(), 2);
        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].title, "9:00 AM: Proposal draft");
        assert_eq!(snapshot[1].title, "3:00 PM: Inbox zero");
    }

    #[tokio::test]
    async fn test_prioritize_helper_scopes_to_category() {
        let store = StoreHandle::new(Store::new());
        let weekly = store.create("Weekly chore".to_string(), Category::ThisWeek).unwrap();
        let b = store.create("B".to_string(), Category::Today).unwrap();
        let a = store.create("A".to_string(), Category::Today).unwrap();

        let svc = Arc::new(ScriptedService::default());
        svc.prioritize.lock().unwrap().push_back(Ok(vec![
            ScoredTask {
                id: b.id.clone(),
                priority_score: 80.0,
                reasoning: "deadline near".to_string(),
            },
            ScoredTask {
                id: a.id.clone(),
                priority_score: 20.0,
                reasoning: "low stakes".to_string(),
            },
        ]));
        let svc: Arc<dyn SuggestionService> = svc;

        let merged = prioritize(&store, &svc, Category::Today).await.unwrap();
        assert_eq!(merged, 2);

        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].id, b.id);
        assert_eq!(snapshot[1].id, a.id);
        assert_eq!(snapshot[2].id, weekly.id);
        assert_eq!(snapshot[2].priority_score, None);
    }

    #[tokio::test]
    async fn test_prioritize_empty_category_skips_collaborator() {
        let store = StoreHandle::new(Store::new());
        store.create("Elsewhere".to_string(), Category::LongTerm).unwrap();

        let scripted = Arc::new(ScriptedService::default());
        let svc: Arc<dyn SuggestionService> = scripted.clone();

        let merged = prioritize(&store, &svc, Category::Today).await.unwrap();
        assert_eq!(merged, 0);
        assert_eq!(scripted.calls(), 0);
    }

    #[tokio::test]
    async fn test_session_open_replaces_and_close_discards() {
        let store = StoreHandle::new(Store::new());
        let task = store.create("Target".to_string(), Category::Today).unwrap();

        let mut session = Session::new();
        assert!(matches!(session.dialog(), OpenDialog::None));

        session.open_suggest_tasks();
        assert!(matches!(session.dialog(), OpenDialog::SuggestTasks(_)));

        // Opening another dialog discards the previous instance
        session.open_breakdown(&task);
        assert!(matches!(session.dialog(), OpenDialog::Breakdown(_)));

        // Closing discards unconditionally; reopening starts from Idle
        session.close();
        assert!(matches!(session.dialog(), OpenDialog::None));
        session.open_breakdown(&task);
        if let OpenDialog::Breakdown(flow) = session.dialog() {
            assert_eq!(flow.phase(), Phase::Idle);
        } else {
            panic!("expected breakdown dialog");
        }
    }
}
