//! Shared data model for the quench quality-orchestration engine.
//!
//! Every record that crosses a crate boundary lives here: issues produced by
//! parsers, hook definitions and results, fix results from agents, stage and
//! run summaries, and the fatal error type. Recoverable failures never become
//! errors; they are captured inside [`HookResult`] and [`FixResult`] records.

pub mod error;
pub mod types;

pub use error::QuenchError;
pub use types::{
    CoordinatorResult, FixPlan, FixResult, HookDefinition, HookResult, HookStatus, Issue,
    IssueKind, PlannedEdit, RiskLevel, RunReport, RunStatus, SecurityLevel, Severity, Stage,
    StageResult, StageSummary,
};
