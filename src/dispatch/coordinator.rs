use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::registry::AgentRegistry;
use super::scoring::ScoringPolicy;
use crate::domain::task::{Subtask, SubtaskStatus};
use crate::domain::{AgentId, SubtaskId, TaskId};

/// Agent reserved for one subtask type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedAgent {
    pub agent_id: AgentId,
    pub subtask_id: SubtaskId,
    pub assigned_at: DateTime<Utc>,
}

/// Result of one assignment call, keyed by subtask type
///
/// Types with no eligible agent are simply absent. The durable record of an
/// assignment is the subtask's agent field and the agent's current task; this
/// map is only a report. When several subtasks share a type, the entry holds
/// the last one assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Assignment {
    entries: BTreeMap<String, AssignedAgent>,
}

impl Assignment {
    pub fn get(&self, kind: &str) -> Option<&AssignedAgent> {
        self.entries.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssignedAgent)> {
        self.entries.iter().map(|(kind, assigned)| (kind.as_str(), assigned))
    }

    /// Requested types that received no agent, in request order
    ///
    /// # Example
    /// ```
    /// use dispatch_api::dispatch::Assignment;
    ///
    /// let assignment = Assignment::default();
    /// assert_eq!(assignment.missing(["research", "write"]), vec!["research", "write"]);
    /// ```
    pub fn missing<'a>(&self, requested: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        let mut missing: Vec<&'a str> = Vec::new();
        for kind in requested {
            if !self.contains(kind) && !missing.contains(&kind) {
                missing.push(kind);
            }
        }
        missing
    }

    fn insert(&mut self, kind: &str, assigned: AssignedAgent) {
        self.entries.insert(kind.to_string(), assigned);
    }
}

/// Greedy best-first matcher of subtasks to agents
///
/// Subtasks are handled in sequence order; priority does not reorder them.
/// Each subtask takes the best-ranked eligible agent at the moment it is
/// processed, with no backtracking, so a later subtask may find its best
/// agent already taken by an earlier one.
#[derive(Debug, Clone)]
pub struct AssignmentCoordinator {
    registry: Arc<AgentRegistry>,
    policy: ScoringPolicy,
}

impl AssignmentCoordinator {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            policy: ScoringPolicy,
        }
    }

    /// Assign every pending subtask in `subtasks` that has an eligible agent
    ///
    /// Assigned subtasks move to `Assigned` with their agent and timestamp;
    /// the rest stay pending. Subtasks that are not pending are left alone.
    pub fn assign(&self, task_id: TaskId, subtasks: &mut [Subtask]) -> Assignment {
        let mut assignment = Assignment::default();

        for subtask in subtasks
            .iter_mut()
            .filter(|s| s.status() == SubtaskStatus::Pending)
        {
            let Some(agent_id) = self.reserve_best(task_id, subtask.kind()) else {
                tracing::debug!(
                    %task_id,
                    subtask_type = subtask.kind(),
                    "No eligible agent, subtask stays pending"
                );
                continue;
            };

            let assigned_at = Utc::now();
            if let Err(e) = subtask.assign(agent_id, assigned_at) {
                tracing::warn!(%task_id, %agent_id, error = %e, "Rolling back reservation");
                match self.registry.release(agent_id, task_id) {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!(
                        %task_id,
                        %agent_id,
                        "Reserved agent no longer bound to task, nothing to roll back"
                    ),
                    Err(e) => tracing::warn!(
                        %task_id,
                        %agent_id,
                        error = %e,
                        "Failed to roll back reservation"
                    ),
                }
                continue;
            }

            tracing::info!(
                %task_id,
                subtask_id = %subtask.id(),
                subtask_type = subtask.kind(),
                %agent_id,
                "Subtask assigned"
            );
            assignment.insert(
                subtask.kind(),
                AssignedAgent {
                    agent_id,
                    subtask_id: subtask.id(),
                    assigned_at,
                },
            );
        }

        assignment
    }

    /// Eligible agents for `capability`, best first
    pub fn candidates(&self, capability: &str) -> Vec<(f64, AgentId)> {
        let mut candidates = Vec::new();
        self.registry.for_each(|agent| {
            if let Some(score) = self.policy.score(agent, capability) {
                candidates.push((score, agent.id));
            }
        });
        candidates.sort_by(|a, b| self.policy.rank(a, b));
        candidates
    }

    /// Reserve the best agent that is still available when we reach it
    fn reserve_best(&self, task_id: TaskId, capability: &str) -> Option<AgentId> {
        self.reserve_first(task_id, capability, self.candidates(capability))
    }

    /// Walk a ranking and reserve the first agent that is still eligible
    ///
    /// The ranking is only a snapshot; the reservation re-checks eligibility
    /// under the agent's own lock. Losing that race to a concurrent caller
    /// moves on to the next candidate.
    fn reserve_first(
        &self,
        task_id: TaskId,
        capability: &str,
        candidates: Vec<(f64, AgentId)>,
    ) -> Option<AgentId> {
        for (score, agent_id) in candidates {
            match self.registry.try_reserve(agent_id, task_id, capability) {
                Ok(()) => {
                    tracing::debug!(%agent_id, score, capability, "Reserved agent");
                    return Some(agent_id);
                }
                Err(e) => {
                    tracing::debug!(%agent_id, error = %e, "Candidate taken, trying next");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{AgentStatus, Performance};
    use crate::domain::task::{SubtaskSpec, Task};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use uuid::Uuid;

    fn registry_with(agents: Vec<(AgentId, Vec<&str>, f64, f64)>) -> Arc<AgentRegistry> {
        let registry = Arc::new(AgentRegistry::new());
        for (id, caps, success_rate, avg_response_time) in agents {
            registry
                .register(id, caps.iter().map(|c| c.to_string()))
                .unwrap();
            registry
                .update(id, |agent| {
                    agent.performance = Performance {
                        success_rate,
                        avg_response_time,
                        total_tasks: 1,
                    };
                    Ok(())
                })
                .unwrap();
        }
        registry
    }

    fn task_with(kinds: &[&str]) -> Task {
        let specs = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| SubtaskSpec::new(*kind, i as u32 + 1))
            .collect();
        Task::new(Uuid::new_v4(), "test".to_string(), "test".to_string(), 1, specs)
            .unwrap()
            .0
    }

    #[test]
    fn picks_highest_scoring_agent() {
        let a = Uuid::from_u128(20);
        let b = Uuid::from_u128(10);
        let registry = registry_with(vec![(a, vec!["write"], 100.0, 0.0), (b, vec!["write"], 80.0, 2.0)]);
        let coordinator = AssignmentCoordinator::new(registry.clone());
        let mut task = task_with(&["write"]);
        let task_id = task.id();

        let assignment = coordinator.assign(task_id, task.subtasks_mut());

        assert_eq!(assignment.get("write").unwrap().agent_id, a);
        let agent = registry.get(a).unwrap();
        assert_eq!(agent.status, AgentStatus::Busy);
        assert_eq!(agent.current_task, Some(task_id));
        assert!(registry.get(b).unwrap().is_available());
    }

    #[test]
    fn unmatched_type_is_absent_and_pending() {
        let writer = Uuid::new_v4();
        let registry = registry_with(vec![(writer, vec!["write"], 100.0, 0.0)]);
        let coordinator = AssignmentCoordinator::new(registry);
        let mut task = task_with(&["research", "write"]);

        let assignment = coordinator.assign(task.id(), task.subtasks_mut());

        assert_eq!(assignment.len(), 1);
        assert!(assignment.contains("write"));
        assert_eq!(assignment.missing(["research", "write"]), vec!["research"]);
        assert_eq!(task.subtasks()[0].status(), SubtaskStatus::Pending);
        assert!(task.subtasks()[0].agent_id().is_none());
        assert_eq!(task.subtasks()[1].status(), SubtaskStatus::Assigned);
        assert_eq!(task.subtasks()[1].agent_id(), Some(writer));
    }

    #[test]
    fn equal_scores_pick_lowest_id() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let registry = registry_with(vec![(high, vec!["test"], 90.0, 1.0), (low, vec!["test"], 90.0, 1.0)]);
        let coordinator = AssignmentCoordinator::new(registry);
        let mut task = task_with(&["test"]);

        let assignment = coordinator.assign(task.id(), task.subtasks_mut());

        assert_eq!(assignment.get("test").unwrap().agent_id, low);
    }

    #[test]
    fn earlier_subtask_takes_shared_best_agent() {
        let generalist = Uuid::from_u128(1);
        let registry = registry_with(vec![(generalist, vec!["design", "test"], 100.0, 0.0)]);
        let coordinator = AssignmentCoordinator::new(registry);
        let mut task = task_with(&["design", "test"]);

        let assignment = coordinator.assign(task.id(), task.subtasks_mut());

        assert_eq!(assignment.get("design").unwrap().agent_id, generalist);
        assert!(!assignment.contains("test"));
    }

    #[test]
    fn same_agent_never_assigned_twice() {
        let registry = registry_with(vec![
            (Uuid::from_u128(1), vec!["write"], 100.0, 0.0),
            (Uuid::from_u128(2), vec!["write"], 50.0, 0.0),
        ]);
        let coordinator = AssignmentCoordinator::new(registry);
        let mut task = task_with(&["write", "write", "write"]);

        coordinator.assign(task.id(), task.subtasks_mut());

        let agents: Vec<AgentId> = task.subtasks().iter().filter_map(|s| s.agent_id()).collect();
        assert_eq!(agents, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
        assert_eq!(task.subtasks()[2].status(), SubtaskStatus::Pending);
    }

    #[test]
    fn offline_agents_are_skipped() {
        let id = Uuid::new_v4();
        let registry = registry_with(vec![(id, vec!["edit"], 100.0, 0.0)]);
        registry.set_status(id, AgentStatus::Offline).unwrap();
        let coordinator = AssignmentCoordinator::new(registry);
        let mut task = task_with(&["edit"]);

        let assignment = coordinator.assign(task.id(), task.subtasks_mut());

        assert!(assignment.is_empty());
    }

    #[test]
    fn candidates_are_ranked() {
        let registry = registry_with(vec![
            (Uuid::from_u128(3), vec!["write"], 10.0, 0.0),
            (Uuid::from_u128(2), vec!["write"], 90.0, 0.0),
            (Uuid::from_u128(1), vec!["edit"], 100.0, 0.0),
        ]);
        let coordinator = AssignmentCoordinator::new(registry);

        let ranked: Vec<AgentId> = coordinator
            .candidates("write")
            .into_iter()
            .map(|(_, id)| id)
            .collect();

        assert_eq!(ranked, vec![Uuid::from_u128(2), Uuid::from_u128(3)]);
    }

    #[test]
    fn taken_candidate_falls_through_to_next() {
        let best = Uuid::from_u128(1);
        let runner_up = Uuid::from_u128(2);
        let registry = registry_with(vec![
            (best, vec!["write"], 100.0, 0.0),
            (runner_up, vec!["write"], 50.0, 0.0),
        ]);
        let coordinator = AssignmentCoordinator::new(registry.clone());
        let ranked = coordinator.candidates("write");
        assert_eq!(ranked[0].1, best);

        // Another caller reserves the best agent after the ranking was taken
        let rival_task = Uuid::new_v4();
        registry.try_reserve(best, rival_task, "write").unwrap();
        let task_id = Uuid::new_v4();

        let reserved = coordinator.reserve_first(task_id, "write", ranked);

        assert_eq!(reserved, Some(runner_up));
        assert_eq!(registry.get(best).unwrap().current_task, Some(rival_task));
        assert_eq!(registry.get(runner_up).unwrap().current_task, Some(task_id));
    }

    #[test]
    fn exhausted_ranking_reserves_nobody() {
        let only = Uuid::from_u128(1);
        let registry = registry_with(vec![(only, vec!["write"], 100.0, 0.0)]);
        let coordinator = AssignmentCoordinator::new(registry.clone());
        let ranked = coordinator.candidates("write");
        registry.try_reserve(only, Uuid::new_v4(), "write").unwrap();

        assert_eq!(coordinator.reserve_first(Uuid::new_v4(), "write", ranked), None);
    }

    #[test]
    fn racing_coordinators_share_registry_safely() {
        let ids: Vec<AgentId> = (1..=3).map(Uuid::from_u128).collect();
        let registry = registry_with(
            ids.iter()
                .map(|id| (*id, vec!["work"], 100.0, 0.0))
                .collect(),
        );
        let held: Vec<AtomicBool> = ids.iter().map(|_| AtomicBool::new(false)).collect();
        let assigned = AtomicUsize::new(0);
        let barrier = Barrier::new(4);

        thread::scope(|scope| {
            for _ in 0..4 {
                let coordinator = AssignmentCoordinator::new(registry.clone());
                let (ids, held, assigned, barrier, registry) =
                    (&ids, &held, &assigned, &barrier, &registry);
                scope.spawn(move || {
                    barrier.wait();
                    for _ in 0..200 {
                        let mut task = task_with(&["work"]);
                        let task_id = task.id();
                        let assignment = coordinator.assign(task_id, task.subtasks_mut());
                        let Some(entry) = assignment.get("work") else {
                            thread::yield_now();
                            continue;
                        };

                        let slot = ids.iter().position(|id| *id == entry.agent_id).unwrap();
                        assert!(
                            !held[slot].swap(true, Ordering::SeqCst),
                            "agent {} handed out twice",
                            entry.agent_id
                        );
                        thread::yield_now();
                        held[slot].store(false, Ordering::SeqCst);

                        assert!(registry.release(entry.agent_id, task_id).unwrap());
                        assigned.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert!(assigned.load(Ordering::SeqCst) > 0);
        assert!(registry.snapshot().iter().all(|a| a.is_available()));
    }

    #[test]
    fn missing_deduplicates_requested_types() {
        let assignment = Assignment::default();

        assert_eq!(assignment.missing(["a", "b", "a"]), vec!["a", "b"]);
    }
}
