use std::cmp::Ordering;

use crate::domain::agent::Agent;
use crate::domain::AgentId;

/// Weight of the success rate term
pub const SUCCESS_WEIGHT: f64 = 0.6;

/// Weight of the latency term
pub const LATENCY_WEIGHT: f64 = 0.4;

/// Upper bound of any score: a perfect success rate with zero latency
pub const MAX_SCORE: f64 = SUCCESS_WEIGHT * 100.0 + LATENCY_WEIGHT;

/// Ranks agents for a requested capability
///
/// `score = 0.6 * success_rate + 0.4 / (avg_response_time + 1)`
///
/// The score is computed from the agent as it is at call time, so it always
/// reflects the latest recorded results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringPolicy;

impl ScoringPolicy {
    /// Fitness of `agent` for `capability`, or `None` if it is ineligible
    ///
    /// # Example
    /// ```
    /// use dispatch_api::dispatch::scoring::{ScoringPolicy, MAX_SCORE};
    /// use dispatch_api::domain::agent::Agent;
    /// use uuid::Uuid;
    ///
    /// let agent = Agent::new(Uuid::new_v4(), ["write".to_string()]);
    ///
    /// assert_eq!(ScoringPolicy.score(&agent, "write"), Some(MAX_SCORE));
    /// assert_eq!(ScoringPolicy.score(&agent, "test"), None);
    /// ```
    pub fn score(&self, agent: &Agent, capability: &str) -> Option<f64> {
        if !agent.is_available() || !agent.has_capability(capability) {
            return None;
        }

        let perf = &agent.performance;
        let latency = LATENCY_WEIGHT * (1.0 / (perf.avg_response_time + 1.0));
        Some(SUCCESS_WEIGHT * perf.success_rate + latency)
    }

    /// Orders candidates best first: higher score, then lower agent id
    pub fn rank(&self, a: &(f64, AgentId), b: &(f64, AgentId)) -> Ordering {
        b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1))
    }
}
