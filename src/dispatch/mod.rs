// Dispatch engine modules
//
// Agent selection, reservation, progress aggregation and the performance
// feedback loop that feeds scoring.

pub mod coordinator;
pub mod decomposer;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod progress;
pub mod registry;
pub mod scoring;

// Re-export main types
pub use coordinator::{AssignedAgent, Assignment, AssignmentCoordinator};
pub use decomposer::{Decomposer, KeywordDecomposer};
pub use dispatcher::Dispatcher;
pub use errors::{DispatchError, DispatchResult};
pub use metrics::{MetricsOutcome, MetricsUpdater};
pub use progress::{ProgressTracker, TaskFilter, TaskProgress};
pub use registry::AgentRegistry;
pub use scoring::ScoringPolicy;
