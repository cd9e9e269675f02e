//! The autofix convergence loop: run hooks, dispatch issues to agents,
//! count applied fixes, and iterate until clean, stuck, or out of budget.
//!
//! Progress means agent-applied fixes, never issue-count deltas. An agent
//! may fix five issues while the next hook run surfaces three new ones —
//! that is still progress, and the no-progress counter resets. Conversely,
//! a shrinking issue count with zero applied fixes (cached re-analysis,
//! flaky tools) does not count as progress.

pub mod adapters;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use quench_core::{CoordinatorResult, Issue, RunReport, RunStatus, Stage, StageResult};

/// Seam over the hook orchestrator, so the loop can be driven by stubs in
/// tests and by [`adapters::OrchestratorStageRunner`] in production.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run_stage(&self, stage: Stage) -> anyhow::Result<StageResult>;
}

/// Seam over the agent coordinator.
#[async_trait]
pub trait FixDispatcher: Send + Sync {
    async fn dispatch(&self, issues: Vec<Issue>) -> CoordinatorResult;
}

#[derive(Clone, Debug)]
pub struct LoopConfig {
    pub max_iterations: u32,
    /// Consecutive zero-fix iterations before declaring convergence.
    pub convergence_threshold: u32,
    /// When false, hooks run but nothing is dispatched to agents.
    pub ai_fix_enabled: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            convergence_threshold: 5,
            ai_fix_enabled: true,
        }
    }
}

/// Loop-local iteration bookkeeping. Owned exclusively by the running loop.
#[derive(Debug, Default)]
struct IterationState {
    iteration: u32,
    previous_count: usize,
    no_progress_count: u32,
    total_fixes: usize,
    modified_files: BTreeSet<PathBuf>,
}

pub struct AutofixLoop {
    runner: Arc<dyn StageRunner>,
    dispatcher: Arc<dyn FixDispatcher>,
    config: LoopConfig,
}

impl AutofixLoop {
    pub fn new(
        runner: Arc<dyn StageRunner>,
        dispatcher: Arc<dyn FixDispatcher>,
        config: LoopConfig,
    ) -> Self {
        Self {
            runner,
            dispatcher,
            config,
        }
    }

    /// Drive iterations to a terminal state. Always terminates within
    /// `max_iterations` hook runs regardless of agent behavior.
    pub async fn run(&self) -> anyhow::Result<RunReport> {
        let mut state = IterationState::default();

        loop {
            let stage = self.runner.run_stage(Stage::Comprehensive).await?;
            let issues = stage.issues;
            let count = issues.len();
            info!(
                iteration = state.iteration,
                issues = count,
                "analysis complete"
            );

            if count == 0 {
                return Ok(self.report(RunStatus::Success, &state, 0));
            }

            let fixes_applied = if self.config.ai_fix_enabled {
                let outcome = self.dispatcher.dispatch(issues).await;
                if !outcome.unhandled.is_empty() {
                    debug!(
                        unhandled = outcome.unhandled.len(),
                        "issues with no qualifying agent"
                    );
                }
                for fix in &outcome.results {
                    state.modified_files.extend(fix.files_modified.iter().cloned());
                }
                outcome.fixes_applied
            } else {
                0
            };

            state.total_fixes += fixes_applied;
            if fixes_applied > 0 {
                state.no_progress_count = 0;
            } else {
                // Only agent-applied fixes reset the counter; a shrinking
                // issue count alone is not progress.
                state.no_progress_count += 1;
            }
            debug!(
                fixes_applied,
                no_progress = state.no_progress_count,
                previous_count = state.previous_count,
                current_count = count,
                "iteration settled"
            );
            state.previous_count = count;

            if state.no_progress_count >= self.config.convergence_threshold {
                return Ok(self.report(RunStatus::Converged, &state, count));
            }
            if state.iteration + 1 >= self.config.max_iterations {
                return Ok(self.report(RunStatus::Exhausted, &state, count));
            }
            state.iteration += 1;
        }
    }

    fn report(
        &self,
        status: RunStatus,
        state: &IterationState,
        final_issue_count: usize,
    ) -> RunReport {
        RunReport {
            status,
            iterations: state.iteration + 1,
            total_fixes_applied: state.total_fixes,
            final_issue_count,
            modified_files: state.modified_files.clone(),
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "termination_tests.rs"]
mod termination_tests;
