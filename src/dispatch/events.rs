// Dispatch event log
//
// Keeps a bounded, in-memory history of what the engine did so callers can
// inspect a task's assignment and status history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::agent::AgentStatus;
use crate::domain::task::TaskEvent;
use crate::domain::{AgentId, TaskId};

/// Events about agents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    AgentRegistered { agent_id: AgentId },
    AgentStatusChanged { agent_id: AgentId, status: AgentStatus },
    AgentReleased { agent_id: AgentId, task_id: TaskId },
}

/// Any event the engine records
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DispatchEvent {
    Agent(AgentEvent),
    Task(TaskEvent),
}

impl DispatchEvent {
    /// Task the event concerns, if any
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            DispatchEvent::Task(event) => Some(event.task_id()),
            DispatchEvent::Agent(AgentEvent::AgentReleased { task_id, .. }) => Some(*task_id),
            DispatchEvent::Agent(_) => None,
        }
    }
}

impl From<AgentEvent> for DispatchEvent {
    fn from(event: AgentEvent) -> Self {
        DispatchEvent::Agent(event)
    }
}

impl From<TaskEvent> for DispatchEvent {
    fn from(event: TaskEvent) -> Self {
        DispatchEvent::Task(event)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    pub recorded_at: DateTime<Utc>,
    pub event: DispatchEvent,
}

/// Bounded event history
///
/// Once more than `capacity` events are held, the oldest are dropped down
/// to half the capacity.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    events: Mutex<VecDeque<RecordedEvent>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, event: impl Into<DispatchEvent>) {
        let event = event.into();
        tracing::debug!(?event, "Dispatch event");

        let mut events = self.events.lock();
        events.push_back(RecordedEvent {
            recorded_at: Utc::now(),
            event,
        });
        if events.len() > self.capacity {
            let keep = (self.capacity / 2).max(1);
            let excess = events.len() - keep;
            events.drain(..excess);
        }
    }

    pub fn record_all<E: Into<DispatchEvent>>(&self, events: impl IntoIterator<Item = E>) {
        for event in events {
            self.record(event);
        }
    }

    /// Retained events concerning `task_id`, oldest first
    pub fn for_task(&self, task_id: TaskId) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|recorded| recorded.event.task_id() == Some(task_id))
            .cloned()
            .collect()
    }

    /// The most recent `limit` events, oldest first
    pub fn recent(&self, limit: usize) -> Vec<RecordedEvent> {
        let events = self.events.lock();
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.events.lock().len()
    }
}
