use serde::Serialize;

use super::value_objects::SubtaskStatus;
use crate::domain::{AgentId, SubtaskId, TaskId};

/// Domain events that occur within the Task aggregate
///
/// # Example
/// ```
/// use dispatch_api::domain::task::TaskEvent;
/// use uuid::Uuid;
///
/// let task_id = Uuid::new_v4();
/// let event = TaskEvent::Created { task_id, subtask_count: 4 };
///
/// assert_eq!(event.task_id(), task_id);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Fired when a task is created
    Created { task_id: TaskId, subtask_count: usize },
    /// Fired when subtasks are appended to an existing task
    SubtasksAdded { task_id: TaskId, count: usize },
    /// Fired when an agent is reserved for a subtask
    SubtaskAssigned {
        task_id: TaskId,
        subtask_id: SubtaskId,
        agent_id: AgentId,
    },
    /// Fired on every accepted subtask status change
    SubtaskStatusChanged {
        task_id: TaskId,
        subtask_id: SubtaskId,
        from: SubtaskStatus,
        to: SubtaskStatus,
    },
    /// Fired once the last subtask of a task completes
    Completed { task_id: TaskId },
}

impl TaskEvent {
    /// Returns the task_id for this event
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::Created { task_id, .. } => *task_id,
            TaskEvent::SubtasksAdded { task_id, .. } => *task_id,
            TaskEvent::SubtaskAssigned { task_id, .. } => *task_id,
            TaskEvent::SubtaskStatusChanged { task_id, .. } => *task_id,
            TaskEvent::Completed { task_id } => *task_id,
        }
    }
}
