//! Issue dispatch: routing, batching, bounded concurrency, per-file locks.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use quench_core::{CoordinatorResult, FixResult, Issue};

use crate::agent::{AgentContext, AgentRegistry};
use crate::file_locks::{FileLockMap, LockKey};
use crate::routing::{route, ConfidenceThresholds};

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 10;

#[derive(Clone, Debug)]
pub struct CoordinatorOptions {
    /// Global bound on in-flight agent applies.
    pub max_concurrency: usize,
    /// Issues submitted per batch, bounding memory and letting the caller
    /// react to partial progress.
    pub batch_size: usize,
    pub thresholds: ConfidenceThresholds,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            thresholds: ConfidenceThresholds::default(),
        }
    }
}

/// Routes issues to capability-matched agents and collects their fixes under
/// strict concurrency discipline: a semaphore bounds global fan-out, and a
/// per-file mutex serializes applies that target the same file.
pub struct AgentCoordinator {
    registry: Arc<AgentRegistry>,
    options: CoordinatorOptions,
    locks: Arc<FileLockMap>,
    semaphore: Arc<Semaphore>,
}

impl AgentCoordinator {
    pub fn new(registry: Arc<AgentRegistry>, options: CoordinatorOptions) -> Self {
        let permits = options.max_concurrency.max(1);
        Self {
            registry,
            options,
            locks: Arc::new(FileLockMap::default()),
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Dispatch a list of issues and aggregate the outcome.
    ///
    /// Issues no agent qualifies for land in `unhandled` — never dropped.
    /// Project-level issues (no file path) are valid input and serialize
    /// through the single project lock.
    pub async fn dispatch(&self, issues: Vec<Issue>, ctx: &AgentContext) -> CoordinatorResult {
        let mut aggregate = CoordinatorResult::default();
        let batch_size = self.options.batch_size.max(1);
        for batch in issues.chunks(batch_size) {
            aggregate.merge(self.dispatch_batch(batch, ctx).await);
            if ctx.cancel.is_cancelled() {
                break;
            }
        }
        aggregate
    }

    async fn dispatch_batch(&self, issues: &[Issue], ctx: &AgentContext) -> CoordinatorResult {
        let mut result = CoordinatorResult::default();
        let mut join_set = JoinSet::new();

        for issue in issues {
            let Some((agent, confidence)) =
                route(&self.registry, &self.options.thresholds, issue)
            else {
                debug!(issue = %issue.id, kind = %issue.kind, "no agent qualified");
                result.unhandled.push(issue.clone());
                continue;
            };
            debug!(
                issue = %issue.id,
                agent = agent.name(),
                confidence,
                "dispatching issue"
            );

            let issue = issue.clone();
            let ctx = ctx.clone();
            let locks = self.locks.clone();
            let semaphore = self.semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("coordinator semaphore never closed");
                let key = LockKey::for_issue(&issue);
                let file_lock = locks.lock_for(&key);
                let outcome = {
                    let _guard = file_lock.lock().await;
                    agent.apply(&issue, &ctx).await
                };
                drop(file_lock);
                locks.release(&key);

                match outcome {
                    Ok(fix) => fix,
                    Err(e) => {
                        warn!(agent = agent.name(), issue = %issue.id, error = %format!("{e:#}"), "agent failed");
                        FixResult::failed(agent.name())
                    }
                }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(fix) => {
                    result.fixes_applied += fix.fixes_applied.len();
                    result.results.push(fix);
                }
                Err(e) => {
                    warn!(error = %e, "agent task aborted");
                    result.results.push(FixResult {
                        success: false,
                        confidence: 0.0,
                        fixes_applied: Vec::new(),
                        files_modified: Default::default(),
                        remaining_issues: Vec::new(),
                        agent: None,
                    });
                }
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
