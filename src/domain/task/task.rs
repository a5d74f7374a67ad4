use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::TaskEvent;
use super::value_objects::SubtaskStatus;
use crate::dispatch::errors::{DispatchError, DispatchResult};
use crate::domain::{AgentId, SubtaskId, TaskId};

/// Priority given to subtasks and tasks that do not specify one
pub const DEFAULT_PRIORITY: u32 = 1;

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

/// Template for a subtask as produced by decomposition
///
/// Priority follows one fixed convention: lower value means earlier and
/// more urgent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

impl SubtaskSpec {
    pub fn new(kind: impl Into<String>, priority: u32) -> Self {
        Self {
            kind: kind.into(),
            priority,
        }
    }
}

/// One unit of decomposed work belonging to exactly one task
///
/// `kind` and `priority` never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subtask {
    id: SubtaskId,
    task_id: TaskId,
    #[serde(rename = "type")]
    kind: String,
    priority: u32,
    status: SubtaskStatus,
    agent_id: Option<AgentId>,
    result: Option<serde_json::Value>,
    assigned_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Subtask {
    /// Creates a pending subtask from its template
    pub fn new(task_id: TaskId, spec: SubtaskSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_id,
            kind: spec.kind,
            priority: spec.priority,
            status: SubtaskStatus::Pending,
            agent_id: None,
            result: None,
            assigned_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Binds an agent to a pending subtask
    pub fn assign(&mut self, agent_id: AgentId, at: DateTime<Utc>) -> DispatchResult<()> {
        if self.status != SubtaskStatus::Pending {
            return Err(DispatchError::InvalidState(format!(
                "Subtask {} is {}, only pending subtasks can be assigned",
                self.id, self.status
            )));
        }

        self.status = SubtaskStatus::Assigned;
        self.agent_id = Some(agent_id);
        self.assigned_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// Moves the subtask to `next`, storing `result` when one is given
    ///
    /// Returns the previous status. Moving back to `Pending` unassigns the
    /// subtask and clears its agent. `Assigned` is only reached through
    /// `assign`, which records the agent.
    pub fn transition(
        &mut self,
        next: SubtaskStatus,
        result: Option<serde_json::Value>,
    ) -> DispatchResult<SubtaskStatus> {
        if next == SubtaskStatus::Assigned {
            return Err(DispatchError::InvalidState(format!(
                "Subtask {} can only be assigned together with an agent",
                self.id
            )));
        }
        if !self.status.can_transition_to(next) {
            return Err(DispatchError::InvalidState(format!(
                "Invalid subtask transition from {} to {}",
                self.status, next
            )));
        }

        let previous = self.status;
        self.status = next;
        if next == SubtaskStatus::Pending {
            self.agent_id = None;
            self.assigned_at = None;
        }
        if result.is_some() {
            self.result = result;
        }
        self.updated_at = Utc::now();
        Ok(previous)
    }

    pub fn id(&self) -> SubtaskId {
        self.id
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn status(&self) -> SubtaskStatus {
        self.status
    }

    pub fn agent_id(&self) -> Option<AgentId> {
        self.agent_id
    }

    pub fn result(&self) -> Option<&serde_json::Value> {
        self.result.as_ref()
    }

    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assigned_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Task aggregate root
///
/// Holds subtasks in decomposition order, which is not necessarily priority
/// order. The aggregate status is never stored; it is recomputed from the
/// subtasks whenever it is asked for.
///
/// # Invariants
/// - Every subtask's `task_id` equals the task's id
/// - Subtask types are non-empty
///
/// # Example
/// ```
/// use dispatch_api::domain::task::{SubtaskSpec, Task};
/// use uuid::Uuid;
///
/// let (task, events) = Task::new(
///     Uuid::new_v4(),
///     "Blog post".to_string(),
///     "Write a blog post".to_string(),
///     1,
///     vec![SubtaskSpec::new("research", 1), SubtaskSpec::new("write", 2)],
/// )
/// .expect("valid task");
///
/// assert_eq!(task.subtasks().len(), 2);
/// assert_eq!(events.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    title: String,
    description: String,
    priority: u32,
    subtasks: Vec<Subtask>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task whose subtasks are all pending
    ///
    /// `priority` orders tasks for listing and filtering; like subtask
    /// priority, a lower value is more urgent.
    ///
    /// # Returns
    /// * `Ok((Task, Vec<TaskEvent>))` - New task and a Created event
    /// * `Err(DispatchError::InvalidInput)` - If a subtask type is empty
    pub fn new(
        id: TaskId,
        title: String,
        description: String,
        priority: u32,
        specs: Vec<SubtaskSpec>,
    ) -> DispatchResult<(Self, Vec<TaskEvent>)> {
        validate_specs(&specs)?;

        let now = Utc::now();
        let subtasks: Vec<Subtask> = specs.into_iter().map(|spec| Subtask::new(id, spec)).collect();
        let event = TaskEvent::Created {
            task_id: id,
            subtask_count: subtasks.len(),
        };

        let task = Self {
            id,
            title,
            description,
            priority,
            subtasks,
            created_at: now,
            updated_at: now,
        };

        Ok((task, vec![event]))
    }

    /// Appends pending subtasks and returns the index range they occupy
    pub fn add_subtasks(
        &mut self,
        specs: Vec<SubtaskSpec>,
    ) -> DispatchResult<(Range<usize>, TaskEvent)> {
        validate_specs(&specs)?;

        let start = self.subtasks.len();
        let id = self.id;
        self.subtasks
            .extend(specs.into_iter().map(|spec| Subtask::new(id, spec)));
        self.updated_at = Utc::now();

        let range = start..self.subtasks.len();
        let event = TaskEvent::SubtasksAdded {
            task_id: self.id,
            count: range.len(),
        };
        Ok((range, event))
    }

    /// Applies a status change to one subtask
    ///
    /// Emits a `Completed` event when this change completes the last
    /// outstanding subtask.
    pub fn record_status(
        &mut self,
        subtask_id: SubtaskId,
        next: SubtaskStatus,
        result: Option<serde_json::Value>,
    ) -> DispatchResult<Vec<TaskEvent>> {
        let task_id = self.id;
        let subtask = self
            .subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or(DispatchError::SubtaskNotFound {
                task_id,
                subtask_id,
            })?;

        let from = subtask.transition(next, result)?;
        self.updated_at = Utc::now();

        let mut events = vec![TaskEvent::SubtaskStatusChanged {
            task_id,
            subtask_id,
            from,
            to: next,
        }];
        if next == SubtaskStatus::Completed
            && self
                .subtasks
                .iter()
                .all(|s| s.status == SubtaskStatus::Completed)
        {
            events.push(TaskEvent::Completed { task_id });
        }
        Ok(events)
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn subtasks_mut(&mut self) -> &mut [Subtask] {
        &mut self.subtasks
    }

    pub fn subtask(&self, subtask_id: SubtaskId) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == subtask_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn validate_specs(specs: &[SubtaskSpec]) -> DispatchResult<()> {
    if specs.iter().any(|spec| spec.kind.trim().is_empty()) {
        return Err(DispatchError::InvalidInput(
            "Subtask type cannot be empty".to_string(),
        ));
    }
    Ok(())
}
