use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{AgentStatus, Performance};
use crate::domain::{AgentId, TaskId};

/// A worker that executes subtasks matching its capabilities
///
/// Records are owned by the `AgentRegistry`; callers only ever see clones.
/// `current_task` is a back-reference to the task the agent works on, not
/// ownership of it.
///
/// # Example
/// ```
/// use dispatch_api::domain::agent::{Agent, AgentStatus};
/// use uuid::Uuid;
///
/// let agent = Agent::new(Uuid::new_v4(), ["write".to_string()]);
///
/// assert_eq!(agent.status, AgentStatus::Available);
/// assert!(agent.has_capability("write"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub capabilities: BTreeSet<String>,
    pub status: AgentStatus,
    pub current_task: Option<TaskId>,
    pub performance: Performance,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    /// Creates an available agent with default performance
    pub fn new(id: AgentId, capabilities: impl IntoIterator<Item = String>) -> Self {
        Self {
            id,
            capabilities: capabilities.into_iter().collect(),
            status: AgentStatus::Available,
            current_task: None,
            performance: Performance::default(),
            registered_at: Utc::now(),
        }
    }

    /// Exact-match capability check
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn is_available(&self) -> bool {
        self.status == AgentStatus::Available
    }

    /// Makes the agent available again if it is still bound to `task_id`
    ///
    /// Returns whether the agent was released. An agent working on another
    /// task, or on none, is left untouched.
    pub fn release(&mut self, task_id: TaskId) -> bool {
        if self.current_task != Some(task_id) {
            return false;
        }
        self.status = AgentStatus::Available;
        self.current_task = None;
        true
    }
}
