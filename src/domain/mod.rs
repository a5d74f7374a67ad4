// Domain layer module exports
// Agents and tasks are plain typed records; all mutation goes through the
// dispatch engine so the busy/current-task invariant holds.

pub mod agent;
pub mod task;

use uuid::Uuid;

/// Identifier of a registered agent
pub type AgentId = Uuid;

/// Identifier of a top-level task
pub type TaskId = Uuid;

/// Identifier of a subtask within a task
pub type SubtaskId = Uuid;
