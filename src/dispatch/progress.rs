use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::errors::{DispatchError, DispatchResult};
use crate::domain::task::{Subtask, SubtaskStatus, Task, TaskEvent, TaskStatus};
use crate::domain::{SubtaskId, TaskId};

/// Progress snapshot of one task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskProgress {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Completed share of subtasks, 0 to 100
    pub percent: f64,
    pub subtasks: Vec<Subtask>,
}

/// Aggregate status of a subtask list
///
/// An empty list is pending. Failed subtasks keep a task in progress.
pub fn aggregate_status(subtasks: &[Subtask]) -> TaskStatus {
    if subtasks.is_empty() || subtasks.iter().all(|s| s.status() == SubtaskStatus::Pending) {
        TaskStatus::Pending
    } else if subtasks.iter().all(|s| s.status() == SubtaskStatus::Completed) {
        TaskStatus::Completed
    } else {
        TaskStatus::InProgress
    }
}

/// Percentage of completed subtasks; 0 for an empty list
pub fn completion_percent(subtasks: &[Subtask]) -> f64 {
    if subtasks.is_empty() {
        return 0.0;
    }
    let completed = subtasks
        .iter()
        .filter(|s| s.status() == SubtaskStatus::Completed)
        .count();
    completed as f64 / subtasks.len() as f64 * 100.0
}

/// Criteria for listing tasks; unset fields match every task
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct TaskFilter {
    /// Derived aggregate status
    pub status: Option<TaskStatus>,
    pub priority: Option<u32>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.status
            .map_or(true, |status| aggregate_status(task.subtasks()) == status)
            && self.priority.map_or(true, |priority| task.priority() == priority)
    }
}

/// Owner of the task table
///
/// Task status is never stored; every `progress` call derives it from the
/// current subtask states.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new task
    pub fn insert(&self, task: Task) -> DispatchResult<()> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.id()) {
            return Err(DispatchError::InvalidState(format!(
                "Task {} already exists",
                task.id()
            )));
        }
        tasks.insert(task.id(), task);
        Ok(())
    }

    /// Run `f` on a stored task while holding the table's write lock
    pub fn with_task_mut<T>(
        &self,
        task_id: TaskId,
        f: impl FnOnce(&mut Task) -> DispatchResult<T>,
    ) -> DispatchResult<T> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(&task_id)
            .ok_or(DispatchError::TaskNotFound(task_id))?;
        f(task)
    }

    /// Run `f` on a task, creating it with `create` first if it is unknown
    pub fn with_task_or_insert<T>(
        &self,
        task_id: TaskId,
        create: impl FnOnce() -> DispatchResult<Task>,
        f: impl FnOnce(&mut Task) -> DispatchResult<T>,
    ) -> DispatchResult<T> {
        let mut tasks = self.tasks.write();
        let task = match tasks.entry(task_id) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => entry.insert(create()?),
        };
        f(task)
    }

    /// Copy of a stored task
    pub fn get(&self, task_id: TaskId) -> Option<Task> {
        self.tasks.read().get(&task_id).cloned()
    }

    /// Update one subtask's status and result
    pub fn record_subtask_status(
        &self,
        task_id: TaskId,
        subtask_id: SubtaskId,
        status: SubtaskStatus,
        result: Option<serde_json::Value>,
    ) -> DispatchResult<Vec<TaskEvent>> {
        let events = self.with_task_mut(task_id, |task| {
            task.record_status(subtask_id, status, result)
        })?;
        tracing::info!(%task_id, %subtask_id, %status, "Subtask status recorded");
        Ok(events)
    }

    /// Aggregate progress of a task, `None` if the task is unknown
    pub fn progress(&self, task_id: TaskId) -> Option<TaskProgress> {
        let tasks = self.tasks.read();
        let task = tasks.get(&task_id)?;
        let subtasks = task.subtasks();

        Some(TaskProgress {
            task_id,
            status: aggregate_status(subtasks),
            percent: completion_percent(subtasks),
            subtasks: subtasks.to_vec(),
        })
    }

    /// Tasks matching `filter`, most urgent first, then oldest first
    pub fn list(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.created_at().cmp(&b.created_at()))
                .then_with(|| a.id().cmp(&b.id()))
        });
        tasks
    }

    /// Number of stored tasks
    pub(crate) fn len(&self) -> usize {
        self.tasks.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::{SubtaskSpec, DEFAULT_PRIORITY};
    use chrono::Utc;
    use uuid::Uuid;

    fn tracked_task(tracker: &ProgressTracker, kinds: &[&str]) -> TaskId {
        tracked_task_with_priority(tracker, kinds, DEFAULT_PRIORITY)
    }

    fn tracked_task_with_priority(
        tracker: &ProgressTracker,
        kinds: &[&str],
        priority: u32,
    ) -> TaskId {
        let specs = kinds.iter().map(|k| SubtaskSpec::new(*k, 1)).collect();
        let (task, _) = Task::new(
            Uuid::new_v4(),
            "task".to_string(),
            "task".to_string(),
            priority,
            specs,
        )
        .unwrap();
        let task_id = task.id();
        tracker.insert(task).unwrap();
        task_id
    }

    fn assign_all(tracker: &ProgressTracker, task_id: TaskId) -> Vec<SubtaskId> {
        tracker
            .with_task_mut(task_id, |task| {
                let mut ids = Vec::new();
                for subtask in task.subtasks_mut() {
                    subtask.assign(Uuid::new_v4(), Utc::now())?;
                    ids.push(subtask.id());
                }
                Ok(ids)
            })
            .unwrap()
    }

    #[test]
    fn empty_task_is_pending_at_zero() {
        let tracker = ProgressTracker::new();
        let task_id = tracked_task(&tracker, &[]);

        let progress = tracker.progress(task_id).unwrap();

        assert_eq!(progress.status, TaskStatus::Pending);
        assert_eq!(progress.percent, 0.0);
        assert!(progress.subtasks.is_empty());
    }

    #[test]
    fn unknown_task_has_no_progress() {
        let tracker = ProgressTracker::new();

        assert!(tracker.progress(Uuid::new_v4()).is_none());
    }

    #[test]
    fn partial_completion_is_in_progress() {
        let tracker = ProgressTracker::new();
        let task_id = tracked_task(&tracker, &["research", "outline", "write", "edit"]);
        let ids = assign_all(&tracker, task_id);

        tracker
            .record_subtask_status(task_id, ids[0], SubtaskStatus::Completed, None)
            .unwrap();

        let progress = tracker.progress(task_id).unwrap();
        assert_eq!(progress.status, TaskStatus::InProgress);
        assert_eq!(progress.percent, 25.0);
    }

    #[test]
    fn failed_subtask_keeps_task_in_progress() {
        let tracker = ProgressTracker::new();
        let task_id = tracked_task(&tracker, &["write", "edit"]);
        let ids = assign_all(&tracker, task_id);

        tracker
            .record_subtask_status(task_id, ids[0], SubtaskStatus::Completed, None)
            .unwrap();
        tracker
            .record_subtask_status(task_id, ids[1], SubtaskStatus::Failed, None)
            .unwrap();

        let progress = tracker.progress(task_id).unwrap();
        assert_eq!(progress.status, TaskStatus::InProgress);
        assert_eq!(progress.percent, 50.0);
    }

    #[test]
    fn all_completed_is_completed() {
        let tracker = ProgressTracker::new();
        let task_id = tracked_task(&tracker, &["design", "implement"]);
        let ids = assign_all(&tracker, task_id);

        let mut events = Vec::new();
        for id in &ids {
            events = tracker
                .record_subtask_status(task_id, *id, SubtaskStatus::Completed, None)
                .unwrap();
        }

        let progress = tracker.progress(task_id).unwrap();
        assert_eq!(progress.status, TaskStatus::Completed);
        assert_eq!(progress.percent, 100.0);
        assert_eq!(events.last(), Some(&TaskEvent::Completed { task_id }));
    }

    #[test]
    fn progress_is_idempotent() {
        let tracker = ProgressTracker::new();
        let task_id = tracked_task(&tracker, &["test", "document", "design"]);
        let ids = assign_all(&tracker, task_id);
        tracker
            .record_subtask_status(task_id, ids[1], SubtaskStatus::InProgress, None)
            .unwrap();

        let first = tracker.progress(task_id).unwrap();
        let second = tracker.progress(task_id).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn record_status_unknown_ids() {
        let tracker = ProgressTracker::new();
        let task_id = tracked_task(&tracker, &["write"]);
        let unknown_task = Uuid::new_v4();
        let unknown_subtask = Uuid::new_v4();

        let missing_task =
            tracker.record_subtask_status(unknown_task, unknown_subtask, SubtaskStatus::Failed, None);
        assert_eq!(missing_task.unwrap_err(), DispatchError::TaskNotFound(unknown_task));

        let missing_subtask =
            tracker.record_subtask_status(task_id, unknown_subtask, SubtaskStatus::Failed, None);
        assert!(matches!(
            missing_subtask,
            Err(DispatchError::SubtaskNotFound { .. })
        ));
    }

    #[test]
    fn result_payload_is_kept() {
        let tracker = ProgressTracker::new();
        let task_id = tracked_task(&tracker, &["research"]);
        let ids = assign_all(&tracker, task_id);
        let payload = serde_json::json!({"sources": 3});

        tracker
            .record_subtask_status(task_id, ids[0], SubtaskStatus::Completed, Some(payload.clone()))
            .unwrap();

        let progress = tracker.progress(task_id).unwrap();
        assert_eq!(progress.subtasks[0].result(), Some(&payload));
    }

    #[test]
    fn duplicate_task_is_rejected() {
        let tracker = ProgressTracker::new();
        let (task, _) =
            Task::new(Uuid::new_v4(), "x".to_string(), "x".to_string(), 1, vec![]).unwrap();

        tracker.insert(task.clone()).unwrap();

        assert!(matches!(tracker.insert(task), Err(DispatchError::InvalidState(_))));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn insert_on_demand() {
        let tracker = ProgressTracker::new();
        let task_id = Uuid::new_v4();

        let count = tracker
            .with_task_or_insert(
                task_id,
                || {
                    Task::new(task_id, String::new(), String::new(), 1, vec![])
                        .map(|(task, _)| task)
                },
                |task| Ok(task.subtasks().len()),
            )
            .unwrap();

        assert_eq!(count, 0);
        assert!(tracker.get(task_id).is_some());
    }

    #[test]
    fn list_filters_on_derived_status() {
        let tracker = ProgressTracker::new();
        let untouched = tracked_task(&tracker, &["write"]);
        let started = tracked_task(&tracker, &["write", "edit"]);
        let ids = assign_all(&tracker, started);
        tracker
            .record_subtask_status(started, ids[0], SubtaskStatus::Completed, None)
            .unwrap();

        let pending = tracker.list(&TaskFilter {
            status: Some(TaskStatus::Pending),
            priority: None,
        });
        let in_progress = tracker.list(&TaskFilter {
            status: Some(TaskStatus::InProgress),
            priority: None,
        });

        assert_eq!(pending.iter().map(|t| t.id()).collect::<Vec<_>>(), vec![untouched]);
        assert_eq!(in_progress.iter().map(|t| t.id()).collect::<Vec<_>>(), vec![started]);
        assert_eq!(tracker.list(&TaskFilter::default()).len(), 2);
    }

    #[test]
    fn list_filters_and_orders_by_priority() {
        let tracker = ProgressTracker::new();
        let low = tracked_task_with_priority(&tracker, &["write"], 3);
        let urgent = tracked_task_with_priority(&tracker, &["write"], 1);
        let also_low = tracked_task_with_priority(&tracker, &[], 3);

        let all: Vec<TaskId> = tracker
            .list(&TaskFilter::default())
            .iter()
            .map(|t| t.id())
            .collect();
        let only_low: Vec<TaskId> = tracker
            .list(&TaskFilter {
                status: None,
                priority: Some(3),
            })
            .iter()
            .map(|t| t.id())
            .collect();

        assert_eq!(all[0], urgent);
        assert_eq!(all.len(), 3);
        assert_eq!(only_low.len(), 2);
        assert!(only_low.contains(&low) && only_low.contains(&also_low));
    }

    #[test]
    fn filter_deserializes_from_query_fields() {
        let filter: TaskFilter =
            serde_json::from_str(r#"{"status": "in_progress", "priority": 2}"#).unwrap();

        assert_eq!(
            filter,
            TaskFilter {
                status: Some(TaskStatus::InProgress),
                priority: Some(2),
            }
        );
    }
}
