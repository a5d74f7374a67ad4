// Task domain module
// Contains the task aggregate, its subtasks, value objects and domain events

#![allow(clippy::module_inception)]

pub mod events;
pub mod task;
pub mod value_objects;

pub use events::TaskEvent;
pub use task::{Subtask, SubtaskSpec, Task, DEFAULT_PRIORITY};
pub use value_objects::{SubtaskStatus, TaskStatus};
