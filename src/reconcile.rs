//! Reconciliation engine
//!
//! Merges asynchronous AI results back into the task store without losing
//! concurrent local edits or duplicating entities. Every merge tolerates its
//! target having vanished: a task deleted while a call was in flight is
//! skipped, never resurrected.
//!
//! None of the merges deduplicate by content; replaying the same payload
//! twice produces two sets of entities with distinct ids. Id matching happens
//! only where the collaborator echoes ids back (prioritization).

use crate::ai::{ScheduleItem, ScoredTask};
use crate::models::{Category, StoreHandle, Subtask, Task, TaskId};

/// Case 1: suggested new tasks. Each title becomes a new task with default
/// Medium priority and category Today, inserted as a batch ahead of existing
/// tasks in the order the collaborator returned them.
pub fn merge_suggested_tasks(store: &StoreHandle, titles: Vec<String>) -> Vec<Task> {
    let batch: Vec<Task> = titles
        .into_iter()
        .map(|title| Task::new(title, Category::Today))
        .collect();

    tracing::info!(count = batch.len(), "merging suggested tasks");
    store.with_store(|s| s.insert_front(batch.clone()));
    batch
}

/// Case 2: breakdown subtasks for one target task. Fresh subtasks are
/// appended after any pre-existing entries. If the target was deleted before
/// the result arrived, the result is discarded.
pub fn merge_breakdown(store: &StoreHandle, task_id: &TaskId, titles: Vec<String>) -> bool {
    store.with_store(|s| {
        let Some(task) = s.tasks_mut().iter_mut().find(|t| &t.id == task_id) else {
            tracing::info!(task = %task_id, "breakdown target deleted, discarding result");
            return false;
        };
        task.subtasks
            .extend(titles.into_iter().map(Subtask::new));
        true
    })
}

/// Case 3: prioritization scores for a submitted batch.
///
/// Tasks still present get their score and reasoning merged, then the
/// submitted subset is resorted by score descending (stable on the prior
/// order for ties) and placed ahead of all tasks outside the batch, which
/// keep their relative order. Ids absent from the store are skipped; tasks
/// absent from the response keep whatever annotations they had.
pub fn merge_prioritization(store: &StoreHandle, mut scored: Vec<ScoredTask>) -> usize {
    scored.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    store.with_store(|s| {
        let tasks = s.tasks_mut();
        let mut batch = Vec::new();
        for entry in &scored {
            let Some(pos) = tasks.iter().position(|t| t.id == entry.id) else {
                tracing::info!(task = %entry.id, "scored task no longer present, skipping");
                continue;
            };
            let mut task = tasks.remove(pos);
            task.priority_score = Some(entry.priority_score);
            task.reasoning = Some(entry.reasoning.clone());
            batch.push(task);
        }
        let merged = batch.len();
        // Batch-local resort: scored subset first, everything else untouched
        let rest = std::mem::take(tasks);
        *tasks = batch;
        tasks.extend(rest);
        tracing::info!(merged, "applied prioritization result");
        merged
    })
}

/// Case 4: a generated day plan. Each line becomes a new task titled
/// `"{time}: {task}"` with the given priority and category Today, inserted
/// as a batch ahead of existing tasks in schedule order.
pub fn merge_day_plan(store: &StoreHandle, items: Vec<ScheduleItem>) -> Vec<Task> {
    let batch: Vec<Task> = items
        .into_iter()
        .map(|item| {
            Task::with_priority(
                format!("{}: {}", item.time, item.task),
                Category::Today,
                item.priority,
            )
        })
        .collect();

    tracing::info!(count = batch.len(), "merging day plan");
    store.with_store(|s| s.insert_front(batch.clone()));
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, Store};
    use pretty_assertions::assert_eq;

    fn handle() -> StoreHandle {
        StoreHandle::new(Store::new())
    }

    #[test]
    fn test_suggested_tasks_keep_collaborator_order() {
        let store = handle();
        store.create("Pre-existing".to_string(), Category::ThisWeek).unwrap();

        let created = merge_suggested_tasks(
            &store,
            vec!["Water the plants".to_string(), "Call the bank".to_string()],
        );
        assert_eq!(created.len(), 2);

        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].title, "Water the plants");
        assert_eq!(snapshot[1].title, "Call the bank");
        assert_eq!(snapshot[2].title, "Pre-existing");
        assert_eq!(snapshot[0].priority, Priority::Medium);
        assert_eq!(snapshot[0].category, Category::Today);
    }

    #[test]
    fn test_suggested_tasks_replay_duplicates_with_fresh_ids() {
        let store = handle();
        let titles = vec!["Do taxes".to_string()];

        let first = merge_suggested_tasks(&store, titles.clone());
        let second = merge_suggested_tasks(&store, titles);

        // Content dedup is explicitly not guaranteed
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(first[0].title, second[0].title);
        assert_ne!(first[0].id, second[0].id);
    }

    #[test]
    fn test_breakdown_appends_after_existing_subtasks() {
        let store = handle();
        let task = store.create("Plan trip".to_string(), Category::Today).unwrap();
        store.with_store(|s| {
            s.tasks_mut()[0]
                .subtasks
                .push(Subtask::new("Pick dates".to_string()));
        });

        let applied = merge_breakdown(
            &store,
            &task.id,
            vec!["Book flight".to_string(), "Book hotel".to_string()],
        );
        assert!(applied);

        let subtasks = &store.get(&task.id).unwrap().subtasks;
        assert_eq!(subtasks.len(), 3);
        assert_eq!(subtasks[0].title, "Pick dates");
        assert_eq!(subtasks[1].title, "Book flight");
        assert_eq!(subtasks[2].title, "Book hotel");
        assert!(!subtasks[1].completed);
        assert_ne!(subtasks[1].id, subtasks[2].id);
    }

    #[test]
    fn test_breakdown_discarded_for_deleted_target() {
        let store = handle();
        let task = store.create("Short-lived".to_string(), Category::Today).unwrap();
        store.delete(&task.id);
        let before = store.snapshot();

        let applied = merge_breakdown(&store, &task.id, vec!["Orphan step".to_string()]);

        assert!(!applied);
        // No resurrection, structurally unchanged
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_prioritization_batch_local_resort() {
        let store = handle();
        // Created in reverse so display order is A, B, C, then two outsiders
        let outsider2 = store.create("Outsider 2".to_string(), Category::ThisWeek).unwrap();
        let outsider1 = store.create("Outsider 1".to_string(), Category::ThisWeek).unwrap();
        let c = store.create("C".to_string(), Category::Today).unwrap();
        let b = store.create("B".to_string(), Category::Today).unwrap();
        let a = store.create("A".to_string(), Category::Today).unwrap();

        let merged = merge_prioritization(
            &store,
            vec![
                ScoredTask {
                    id: a.id.clone(),
                    priority_score: 90.0,
                    reasoning: "due first".to_string(),
                },
                ScoredTask {
                    id: b.id.clone(),
                    priority_score: 40.0,
                    reasoning: "can wait".to_string(),
                },
                ScoredTask {
                    id: c.id.clone(),
                    priority_score: 70.0,
                    reasoning: "important".to_string(),
                },
            ],
        );
        assert_eq!(merged, 3);

        let snapshot = store.snapshot();
        let order: Vec<&TaskId> = snapshot.iter().map(|t| &t.id).collect();
        // A, then C, then B, ahead of tasks outside the batch in prior order
        assert_eq!(
            order,
            vec![&a.id, &c.id, &b.id, &outsider1.id, &outsider2.id]
        );
        assert_eq!(snapshot[0].priority_score, Some(90.0));
        assert_eq!(snapshot[0].reasoning.as_deref(), Some("due first"));
        assert_eq!(snapshot[1].reasoning.as_deref(), Some("important"));
        assert_eq!(snapshot[2].reasoning.as_deref(), Some("can wait"));
        // Outsiders carry no fabricated annotations
        assert_eq!(snapshot[3].priority_score, None);
    }

    #[test]
    fn test_prioritization_skips_deleted_ids_and_ties_are_stable() {
        let store = handle();
        let c = store.create("C".to_string(), Category::Today).unwrap();
        let b = store.create("B".to_string(), Category::Today).unwrap();
        let a = store.create("A".to_string(), Category::Today).unwrap();
        store.delete(&b.id);

        let merged = merge_prioritization(
            &store,
            vec![
                ScoredTask {
                    id: a.id.clone(),
                    priority_score: 50.0,
                    reasoning: "tie one".to_string(),
                },
                ScoredTask {
                    id: b.id.clone(),
                    priority_score: 99.0,
                    reasoning: "gone".to_string(),
                },
                ScoredTask {
                    id: c.id.clone(),
                    priority_score: 50.0,
                    reasoning: "tie two".to_string(),
                },
            ],
        );
        // Deleted id is skipped, not an error
        assert_eq!(merged, 2);

        let snapshot = store.snapshot();
        // Tied scores keep the response order (stable sort)
        assert_eq!(snapshot[0].id, a.id);
        assert_eq!(snapshot[1].id, c.id);
    }

    #[test]
    fn test_day_plan_creates_one_task_per_line() {
        let store = handle();
        let existing = store.create("Existing".to_string(), Category::LongTerm).unwrap();

        let created = merge_day_plan(
            &store,
            vec![
                ScheduleItem {
                    time: "9:00 AM".to_string(),
                    task: "Deep work".to_string(),
                    priority: Priority::High,
                },
                ScheduleItem {
                    time: "12:30 PM".to_string(),
                    task: "Lunch walk".to_string(),
                    priority: Priority::Low,
                },
                ScheduleItem {
                    time: "2:00 PM".to_string(),
                    task: "Team sync".to_string(),
                    priority: Priority::Medium,
                },
            ],
        );
        assert_eq!(created.len(), 3);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot[0].title, "9:00 AM: Deep work");
        assert_eq!(snapshot[1].title, "12:30 PM: Lunch walk");
        assert_eq!(snapshot[2].title, "2:00 PM: Team sync");
        assert_eq!(snapshot[3].id, existing.id);
        assert_eq!(snapshot[0].priority, Priority::High);
        assert_eq!(snapshot[0].category, Category::Today);
        assert!(snapshot[0].subtasks.is_empty());
    }
}
