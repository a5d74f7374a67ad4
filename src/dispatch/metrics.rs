use std::sync::Arc;

use serde::Serialize;

use super::errors::{DispatchError, DispatchResult};
use super::registry::AgentRegistry;
use crate::domain::agent::Performance;
use crate::domain::{AgentId, TaskId};

/// Success rate contribution of one successful result
const SUCCESS_VALUE: f64 = 100.0;

/// Fold one result into running performance statistics
///
/// Uses the incremental mean `avg += (value - avg) / n`, which matches the
/// batch mean without ever multiplying the old average back up by `n - 1`.
/// A success counts as 100 and a failure as 0 so the rate stays a
/// percentage.
pub fn fold_result(performance: &mut Performance, success: bool, execution_time: f64) {
    performance.total_tasks += 1;
    let n = performance.total_tasks as f64;
    let outcome = if success { SUCCESS_VALUE } else { 0.0 };

    performance.success_rate += (outcome - performance.success_rate) / n;
    performance.success_rate = performance.success_rate.clamp(0.0, SUCCESS_VALUE);
    performance.avg_response_time += (execution_time - performance.avg_response_time) / n;
    performance.avg_response_time = performance.avg_response_time.max(0.0);
}

/// Execution times must be finite and non-negative
pub fn validate_execution_time(execution_time: f64) -> DispatchResult<()> {
    if !execution_time.is_finite() || execution_time < 0.0 {
        return Err(DispatchError::InvalidInput(format!(
            "Execution time must be a non-negative number, got {}",
            execution_time
        )));
    }
    Ok(())
}

/// What recording a result changed on the agent
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsOutcome {
    pub performance: Performance,
    /// Whether the agent was released back to available
    pub released: bool,
}

/// Folds subtask results back into agent performance
///
/// Recording a result and releasing the agent happen under the agent's lock
/// in one step, so a scoring scan sees either the old record with the agent
/// busy or the new record with the agent available.
#[derive(Debug, Clone)]
pub struct MetricsUpdater {
    registry: Arc<AgentRegistry>,
}

impl MetricsUpdater {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    /// Record a terminal subtask result for `agent_id`
    ///
    /// The agent is released only while it is still bound to `task_id`; a
    /// late report for an older task updates statistics without touching the
    /// agent's current work.
    pub fn record_result(
        &self,
        agent_id: AgentId,
        task_id: TaskId,
        success: bool,
        execution_time: f64,
    ) -> DispatchResult<MetricsOutcome> {
        validate_execution_time(execution_time)?;

        let outcome = self.registry.update(agent_id, |agent| {
            fold_result(&mut agent.performance, success, execution_time);

            let released = agent.release(task_id);

            Ok(MetricsOutcome {
                performance: agent.performance,
                released,
            })
        })?;

        tracing::info!(
            %agent_id,
            %task_id,
            success,
            execution_time,
            success_rate = outcome.performance.success_rate,
            avg_response_time = outcome.performance.avg_response_time,
            released = outcome.released,
            "Agent metrics updated"
        );
        Ok(outcome)
    }
}
