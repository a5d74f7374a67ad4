use std::ops::Range;
use std::sync::Arc;

use uuid::Uuid;

use super::coordinator::{Assignment, AssignmentCoordinator};
use super::decomposer::{Decomposer, KeywordDecomposer};
use super::errors::{DispatchError, DispatchResult};
use super::events::{AgentEvent, EventLog, RecordedEvent};
use super::metrics::{validate_execution_time, MetricsOutcome, MetricsUpdater};
use super::progress::{ProgressTracker, TaskFilter, TaskProgress};
use super::registry::AgentRegistry;
use crate::domain::agent::{Agent, AgentStatus};
use crate::domain::task::{SubtaskSpec, SubtaskStatus, Task, TaskEvent, DEFAULT_PRIORITY};
use crate::domain::{AgentId, SubtaskId, TaskId};

/// Default number of retained dispatch events
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 1000;

/// Entry point of the dispatch engine
///
/// Owns the agent registry and the task table and wires the coordinator,
/// progress tracker and metrics updater around them. Lock order is always
/// task table, then agent table, then a single agent.
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    coordinator: AssignmentCoordinator,
    tracker: ProgressTracker,
    metrics: MetricsUpdater,
    decomposer: Arc<dyn Decomposer>,
    events: EventLog,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(KeywordDecomposer), DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl Dispatcher {
    pub fn new(decomposer: Arc<dyn Decomposer>, event_log_capacity: usize) -> Self {
        let registry = Arc::new(AgentRegistry::new());
        Self {
            coordinator: AssignmentCoordinator::new(registry.clone()),
            metrics: MetricsUpdater::new(registry.clone()),
            tracker: ProgressTracker::new(),
            registry,
            decomposer,
            events: EventLog::new(event_log_capacity),
        }
    }

    /// Register an agent under a freshly generated id
    pub fn register_agent(&self, capabilities: Vec<String>) -> DispatchResult<Agent> {
        self.register_agent_with_id(Uuid::new_v4(), capabilities)
    }

    /// Register an agent under a caller-chosen id
    pub fn register_agent_with_id(
        &self,
        agent_id: AgentId,
        capabilities: Vec<String>,
    ) -> DispatchResult<Agent> {
        let agent = self.registry.register(agent_id, capabilities)?;
        self.events.record(AgentEvent::AgentRegistered { agent_id });
        tracing::debug!(%agent_id, pool_size = self.registry.len(), "Agent pool grew");
        Ok(agent)
    }

    pub fn agent(&self, agent_id: AgentId) -> DispatchResult<Agent> {
        self.registry.get(agent_id)
    }

    /// All agents, ordered by id
    pub fn agents(&self) -> Vec<Agent> {
        self.registry.snapshot()
    }

    /// Take an idle agent offline or bring it back
    ///
    /// Busy agents are rejected with `InvalidState`; they are released by
    /// reporting their subtask's result or unassigning the subtask.
    pub fn set_agent_status(&self, agent_id: AgentId, status: AgentStatus) -> DispatchResult<Agent> {
        let agent = self.registry.set_status(agent_id, status)?;
        self.events
            .record(AgentEvent::AgentStatusChanged { agent_id, status });
        Ok(agent)
    }

    /// Decompose a description into a new task with pending subtasks
    ///
    /// The description doubles as the title and the task gets the default
    /// priority.
    pub async fn create_task(&self, description: &str) -> DispatchResult<Task> {
        self.create_task_with_details(description, description, DEFAULT_PRIORITY)
            .await
    }

    /// Decompose a description into a new titled task with a priority
    pub async fn create_task_with_details(
        &self,
        title: &str,
        description: &str,
        priority: u32,
    ) -> DispatchResult<Task> {
        if description.trim().is_empty() {
            return Err(DispatchError::InvalidInput(
                "Task description cannot be empty".to_string(),
            ));
        }

        let specs = self.decomposer.decompose(description).await?;
        let (task, events) = Task::new(
            Uuid::new_v4(),
            title.to_string(),
            description.to_string(),
            priority,
            specs,
        )?;
        self.tracker.insert(task.clone())?;
        self.events.record_all(events);

        tracing::info!(
            task_id = %task.id(),
            subtasks = task.subtasks().len(),
            tracked_tasks = self.tracker.len(),
            "Task created"
        );
        Ok(task)
    }

    pub fn task(&self, task_id: TaskId) -> DispatchResult<Task> {
        self.tracker
            .get(task_id)
            .ok_or(DispatchError::TaskNotFound(task_id))
    }

    /// Stored tasks matching `filter`, most urgent first
    pub fn tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        self.tracker.list(filter)
    }

    /// Add subtasks to a task and assign agents to them
    ///
    /// An unknown `task_id` starts a new task. Subtask types missing from the
    /// returned map found no eligible agent and remain pending.
    pub fn assign_subtasks(
        &self,
        task_id: TaskId,
        subtasks: Vec<SubtaskSpec>,
    ) -> DispatchResult<Assignment> {
        let mut created = Vec::new();
        let (assignment, events) = self.tracker.with_task_or_insert(
            task_id,
            || {
                let (task, events) = Task::new(
                    task_id,
                    String::new(),
                    String::new(),
                    DEFAULT_PRIORITY,
                    Vec::new(),
                )?;
                created = events;
                Ok(task)
            },
            |task| {
                let (range, added) = task.add_subtasks(subtasks)?;
                let (assignment, mut events) = self.assign_range(task, range);
                events.insert(0, added);
                Ok((assignment, events))
            },
        )?;

        self.events.record_all(created);
        self.events.record_all(events);
        Ok(assignment)
    }

    /// Retry assignment for the pending subtasks of a stored task
    pub fn assign_pending(&self, task_id: TaskId) -> DispatchResult<Assignment> {
        let (assignment, events) = self.tracker.with_task_mut(task_id, |task| {
            let range = 0..task.subtasks().len();
            Ok(self.assign_range(task, range))
        })?;

        self.events.record_all(events);
        Ok(assignment)
    }

    pub fn task_progress(&self, task_id: TaskId) -> DispatchResult<TaskProgress> {
        self.tracker
            .progress(task_id)
            .ok_or(DispatchError::TaskNotFound(task_id))
    }

    /// Record a status change reported by an execution collaborator
    ///
    /// Moving a subtask back to `Pending` unassigns it and releases its
    /// agent. Other changes do not touch agents; terminal results that should
    /// release the agent and update its statistics go through
    /// `report_subtask_result`.
    pub fn record_subtask_status(
        &self,
        task_id: TaskId,
        subtask_id: SubtaskId,
        status: SubtaskStatus,
        result: Option<serde_json::Value>,
    ) -> DispatchResult<()> {
        if status == SubtaskStatus::Pending {
            return self.unassign_subtask(task_id, subtask_id);
        }

        let events = self
            .tracker
            .record_subtask_status(task_id, subtask_id, status, result)?;
        self.events.record_all(events);
        Ok(())
    }

    /// Close a subtask with its result and fold it into the agent's metrics
    ///
    /// The subtask must be assigned to `agent_id`. It becomes completed or
    /// failed, then the agent's statistics are updated and the agent is
    /// released.
    pub fn report_subtask_result(
        &self,
        agent_id: AgentId,
        task_id: TaskId,
        subtask_id: SubtaskId,
        success: bool,
        execution_time: f64,
        result: Option<serde_json::Value>,
    ) -> DispatchResult<MetricsOutcome> {
        validate_execution_time(execution_time)?;
        self.registry.get(agent_id)?;

        let status = if success {
            SubtaskStatus::Completed
        } else {
            SubtaskStatus::Failed
        };
        let events = self.tracker.with_task_mut(task_id, |task| {
            let owner = task
                .subtask(subtask_id)
                .ok_or(DispatchError::SubtaskNotFound {
                    task_id,
                    subtask_id,
                })?
                .agent_id();
            if owner != Some(agent_id) {
                return Err(DispatchError::InvalidState(format!(
                    "Subtask {} is not assigned to agent {}",
                    subtask_id, agent_id
                )));
            }
            task.record_status(subtask_id, status, result)
        })?;
        self.events.record_all(events);

        let outcome = self
            .metrics
            .record_result(agent_id, task_id, success, execution_time)?;
        if outcome.released {
            self.events
                .record(AgentEvent::AgentReleased { agent_id, task_id });
        }
        Ok(outcome)
    }

    /// Return an assigned subtask to pending and release its agent
    ///
    /// The agent is released while the task table is still locked, so an
    /// assignment never sees the subtask pending with its old agent busy.
    pub fn unassign_subtask(&self, task_id: TaskId, subtask_id: SubtaskId) -> DispatchResult<()> {
        let (events, released) = self.tracker.with_task_mut(task_id, |task| {
            let agent_id = task
                .subtask(subtask_id)
                .ok_or(DispatchError::SubtaskNotFound {
                    task_id,
                    subtask_id,
                })?
                .agent_id();
            let events = task.record_status(subtask_id, SubtaskStatus::Pending, None)?;

            let released = match agent_id {
                Some(agent_id) => self.registry.release(agent_id, task_id)?.then_some(agent_id),
                None => None,
            };
            Ok((events, released))
        })?;

        self.events.record_all(events);
        if let Some(agent_id) = released {
            self.events
                .record(AgentEvent::AgentReleased { agent_id, task_id });
        }
        tracing::info!(%task_id, %subtask_id, released = ?released, "Subtask unassigned");
        Ok(())
    }

    /// Most recent `limit` events across all tasks and agents, oldest first
    pub fn recent_events(&self, limit: usize) -> Vec<RecordedEvent> {
        self.events.recent(limit)
    }

    /// Retained events for a task, oldest first
    pub fn task_events(&self, task_id: TaskId) -> DispatchResult<Vec<RecordedEvent>> {
        if self.tracker.get(task_id).is_none() {
            return Err(DispatchError::TaskNotFound(task_id));
        }
        Ok(self.events.for_task(task_id))
    }

    fn assign_range(&self, task: &mut Task, range: Range<usize>) -> (Assignment, Vec<TaskEvent>) {
        let task_id = task.id();
        let subtasks = &mut task.subtasks_mut()[range];
        let pending: Vec<SubtaskId> = subtasks
            .iter()
            .filter(|s| s.status() == SubtaskStatus::Pending)
            .map(|s| s.id())
            .collect();

        let assignment = self.coordinator.assign(task_id, subtasks);

        let events = subtasks
            .iter()
            .filter(|s| pending.contains(&s.id()))
            .filter_map(|s| {
                s.agent_id().map(|agent_id| TaskEvent::SubtaskAssigned {
                    task_id,
                    subtask_id: s.id(),
                    agent_id,
                })
            })
            .collect();
        (assignment, events)
    }
}
