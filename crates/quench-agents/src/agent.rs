//! The agent contract and registry.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use quench_core::{FixPlan, FixResult, Issue};

/// Context handed to agents for one `plan`/`apply` call.
#[derive(Clone)]
pub struct AgentContext {
    pub workspace_root: PathBuf,
    /// Cooperative cancellation: agents check between atomic edits and
    /// finish with a partial result.
    pub cancel: CancellationToken,
}

impl AgentContext {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            cancel: CancellationToken::new(),
        }
    }
}

/// An in-process unit that can fix issues, usually by editing files.
///
/// Variation is by capability, not hierarchy: agents are registered values
/// behind this trait, and the coordinator treats planning and direct-fix
/// agents uniformly through the [`FixResult`] contract.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Generalists lose confidence ties against specialists.
    fn generalist(&self) -> bool {
        false
    }

    /// Applicability score in `[0, 1]`. Pure and fast; no side effects.
    fn can_handle(&self, issue: &Issue) -> f64;

    /// Optional read-only planning step. Must not mutate the workspace.
    async fn plan(&self, _issue: &Issue, _ctx: &AgentContext) -> anyhow::Result<Option<FixPlan>> {
        Ok(None)
    }

    /// Apply a fix. May mutate files under the coordinator's per-file lock;
    /// must be idempotent per issue id.
    async fn apply(&self, issue: &Issue, ctx: &AgentContext) -> anyhow::Result<FixResult>;
}

/// Ordered agent list. Registration order breaks routing ties; the registry
/// is populated at startup and immutable afterwards (passed by reference,
/// never a process-wide singleton).
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.push(agent);
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
