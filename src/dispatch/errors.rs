use thiserror::Error;

use crate::domain::{AgentId, SubtaskId, TaskId};

/// Errors that can occur in the dispatch engine
///
/// None of these are fatal. Partial assignment is not an error at all; it
/// shows up as missing entries in an `Assignment`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Subtask {subtask_id} not found in task {task_id}")]
    SubtaskNotFound { task_id: TaskId, subtask_id: SubtaskId },

    #[error("Agent already registered: {0}")]
    DuplicateAgent(AgentId),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DispatchError {
    /// Whether the error signals an unknown agent, task or subtask id
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DispatchError::AgentNotFound(_)
                | DispatchError::TaskNotFound(_)
                | DispatchError::SubtaskNotFound { .. }
        )
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn not_found_family() {
        let id = Uuid::new_v4();
        assert!(DispatchError::AgentNotFound(id).is_not_found());
        assert!(DispatchError::TaskNotFound(id).is_not_found());
        assert!(DispatchError::SubtaskNotFound {
            task_id: id,
            subtask_id: id
        }
        .is_not_found());
        assert!(!DispatchError::DuplicateAgent(id).is_not_found());
        assert!(!DispatchError::InvalidState("busy".to_string()).is_not_found());
    }

    #[test]
    fn messages_name_the_id() {
        let id = Uuid::new_v4();
        let message = DispatchError::DuplicateAgent(id).to_string();
        assert!(message.contains(&id.to_string()));
    }
}
