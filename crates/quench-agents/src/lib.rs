//! Agent registry and coordinator: route issues to capability-matched
//! agents, apply fixes under per-file locks and bounded concurrency, and
//! aggregate the results.

pub mod agent;
pub mod builtin;
pub mod coordinator;
pub mod file_locks;
pub mod routing;

pub use agent::{Agent, AgentContext, AgentRegistry};
pub use builtin::{FormatterAgent, ImportCleanerAgent};
pub use coordinator::{AgentCoordinator, CoordinatorOptions};
pub use routing::ConfidenceThresholds;
