// Agent domain module
// Contains the agent record and its status/performance value objects

#![allow(clippy::module_inception)]

pub mod agent;
pub mod value_objects;

pub use agent::Agent;
pub use value_objects::{AgentStatus, Performance};
