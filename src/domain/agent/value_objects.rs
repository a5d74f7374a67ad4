use serde::{Deserialize, Serialize};

/// Availability of an agent for new work
///
/// An agent is `Busy` exactly when it holds a current task reference.
/// Only `Available` agents are eligible for assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Idle and eligible for assignment
    Available,
    /// Working on a task
    Busy,
    /// Not accepting work
    Offline,
}

impl AgentStatus {
    /// Whether a direct status change from `self` to `next` is allowed
    ///
    /// Only idle agents can be toggled between `Available` and `Offline`.
    /// `Busy` is entered by reserving the agent for a subtask and left by
    /// releasing it from that task, never by a direct change.
    ///
    /// # Example
    /// ```
    /// use dispatch_api::domain::agent::AgentStatus;
    ///
    /// assert!(AgentStatus::Available.can_transition_to(AgentStatus::Offline));
    /// assert!(!AgentStatus::Busy.can_transition_to(AgentStatus::Available));
    /// assert!(!AgentStatus::Available.can_transition_to(AgentStatus::Busy));
    /// ```
    pub fn can_transition_to(&self, next: AgentStatus) -> bool {
        use AgentStatus::*;

        matches!((self, next), (Available | Offline, Available | Offline))
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Available => write!(f, "available"),
            AgentStatus::Busy => write!(f, "busy"),
            AgentStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Running performance statistics of an agent
///
/// `success_rate` is a percentage in `[0, 100]`, `avg_response_time` is the
/// mean execution time of recorded results and never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub total_tasks: u64,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            success_rate: 100.0,
            avg_response_time: 0.0,
            total_tasks: 0,
        }
    }
}
