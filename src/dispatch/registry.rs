use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::errors::{DispatchError, DispatchResult};
use crate::domain::agent::{Agent, AgentStatus};
use crate::domain::{AgentId, TaskId};

/// Owner of every agent record
///
/// The table lock only guards membership. Each agent sits behind its own
/// mutex, and every read-then-write on an agent happens under that mutex in
/// one critical section, so two callers can never both reserve the same
/// available agent.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: RwLock<BTreeMap<AgentId, Arc<Mutex<Agent>>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new agent
    ///
    /// Re-registering an existing id is rejected rather than overwriting the
    /// agent's status and performance history.
    pub fn register(
        &self,
        agent_id: AgentId,
        capabilities: impl IntoIterator<Item = String>,
    ) -> DispatchResult<Agent> {
        let mut agents = self.agents.write();
        if agents.contains_key(&agent_id) {
            tracing::warn!(%agent_id, "Rejected duplicate agent registration");
            return Err(DispatchError::DuplicateAgent(agent_id));
        }

        let agent = Agent::new(agent_id, capabilities);
        agents.insert(agent_id, Arc::new(Mutex::new(agent.clone())));
        tracing::info!(%agent_id, capabilities = ?agent.capabilities, "Agent registered");
        Ok(agent)
    }

    /// Get a copy of an agent by ID
    pub fn get(&self, agent_id: AgentId) -> DispatchResult<Agent> {
        let entry = self.entry(agent_id)?;
        let agent = entry.lock().clone();
        Ok(agent)
    }

    /// Toggle an idle agent between available and offline
    ///
    /// Busy agents are rejected: they become busy only through `try_reserve`
    /// and leave that state only through `release` or a recorded result, so
    /// an agent can never hold two subtasks or be bound to a task it is not
    /// working on.
    pub fn set_status(&self, agent_id: AgentId, status: AgentStatus) -> DispatchResult<Agent> {
        self.update(agent_id, |agent| {
            if !agent.status.can_transition_to(status) {
                return Err(DispatchError::InvalidState(format!(
                    "Cannot change agent {} from {} to {}",
                    agent_id, agent.status, status
                )));
            }

            agent.status = status;
            Ok(agent.clone())
        })
    }

    /// Release an agent from `task_id`, returning whether it was bound to it
    pub fn release(&self, agent_id: AgentId, task_id: TaskId) -> DispatchResult<bool> {
        self.update(agent_id, |agent| Ok(agent.release(task_id)))
    }

    /// Reserve an agent for a task if it is still available and capable
    ///
    /// This is the compare-and-set step of assignment: eligibility is checked
    /// again under the agent's lock, and the agent becomes busy in the same
    /// critical section.
    pub fn try_reserve(
        &self,
        agent_id: AgentId,
        task_id: TaskId,
        capability: &str,
    ) -> DispatchResult<()> {
        self.update(agent_id, |agent| {
            if !agent.is_available() {
                return Err(DispatchError::InvalidState(format!(
                    "Agent {} is {}",
                    agent_id, agent.status
                )));
            }
            if !agent.has_capability(capability) {
                return Err(DispatchError::InvalidState(format!(
                    "Agent {} lacks capability {}",
                    agent_id, capability
                )));
            }

            agent.status = AgentStatus::Busy;
            agent.current_task = Some(task_id);
            Ok(())
        })
    }

    /// Run `f` on an agent while holding its lock
    pub fn update<T>(
        &self,
        agent_id: AgentId,
        f: impl FnOnce(&mut Agent) -> DispatchResult<T>,
    ) -> DispatchResult<T> {
        let entry = self.entry(agent_id)?;
        let mut agent = entry.lock();
        f(&mut *agent)
    }

    /// Visit every agent in id order without copying it
    ///
    /// Each agent is locked only for the duration of its own visit.
    pub fn for_each(&self, mut f: impl FnMut(&Agent)) {
        let agents = self.agents.read();
        for entry in agents.values() {
            f(&*entry.lock());
        }
    }

    /// Point-in-time copy of all agents, ordered by id
    pub fn snapshot(&self) -> Vec<Agent> {
        let mut agents = Vec::new();
        self.for_each(|agent| agents.push(agent.clone()));
        agents
    }

    /// Number of registered agents
    pub(crate) fn len(&self) -> usize {
        self.agents.read().len()
    }

    fn entry(&self, agent_id: AgentId) -> DispatchResult<Arc<Mutex<Agent>>> {
        self.agents
            .read()
            .get(&agent_id)
            .cloned()
            .ok_or(DispatchError::AgentNotFound(agent_id))
    }
}
