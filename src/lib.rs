//! Agent Dispatch API Library
//!
//! Distributes decomposed subtasks across a pool of agents, ranks agents by
//! their recorded performance, and aggregates subtask results into task
//! progress. The HTTP layer in [`api`] is a thin adapter over [`dispatch`].

pub mod api;
pub mod config;
pub mod dispatch;
pub mod domain;
