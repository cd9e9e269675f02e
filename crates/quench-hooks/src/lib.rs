//! Hook catalog and stage orchestration.
//!
//! A stage run consults the result cache, layers the remaining hooks into
//! dependency waves, fans Safe hooks out under a bounded worker pool, runs
//! Isolated hooks strictly alone, and aggregates everything into a
//! [`StageResult`](quench_core::StageResult).

pub mod catalog;
pub mod dag;
pub mod orchestrator;

pub use catalog::{apply_timeout_overrides, builtin_catalog};
pub use orchestrator::{HookOrchestrator, StageOptions};
