//! Production implementations of the loop's seams.

use std::sync::Arc;

use async_trait::async_trait;

use quench_agents::{AgentContext, AgentCoordinator};
use quench_core::{CoordinatorResult, Issue, Stage, StageResult};
use quench_hooks::{HookOrchestrator, StageOptions};

use crate::{FixDispatcher, StageRunner};

/// Drives the hook orchestrator with fixed stage options.
pub struct OrchestratorStageRunner {
    orchestrator: Arc<HookOrchestrator>,
    options: StageOptions,
}

impl OrchestratorStageRunner {
    pub fn new(orchestrator: Arc<HookOrchestrator>, options: StageOptions) -> Self {
        Self {
            orchestrator,
            options,
        }
    }
}

#[async_trait]
impl StageRunner for OrchestratorStageRunner {
    async fn run_stage(&self, stage: Stage) -> anyhow::Result<StageResult> {
        Ok(self.orchestrator.run_stage(stage, &self.options).await)
    }
}

/// Drives the agent coordinator with a shared context.
pub struct CoordinatorFixDispatcher {
    coordinator: Arc<AgentCoordinator>,
    ctx: AgentContext,
}

impl CoordinatorFixDispatcher {
    pub fn new(coordinator: Arc<AgentCoordinator>, ctx: AgentContext) -> Self {
        Self { coordinator, ctx }
    }
}

#[async_trait]
impl FixDispatcher for CoordinatorFixDispatcher {
    async fn dispatch(&self, issues: Vec<Issue>) -> CoordinatorResult {
        self.coordinator.dispatch(issues, &self.ctx).await
    }
}
