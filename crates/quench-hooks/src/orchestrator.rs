//! Stage scheduling: cache consultation, dependency waves, bounded
//! parallelism, and security-level isolation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use quench_cache::{compute_key, CachedResult, ResultCache};
use quench_core::{
    HookDefinition, HookResult, HookStatus, QuenchError, SecurityLevel, Stage, StageResult,
    StageSummary,
};
use quench_parsers::{ParserRegistry, RawOutput};
use quench_process::Termination;

use crate::dag;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for one stage run.
#[derive(Clone, Default)]
pub struct StageOptions {
    /// Stage-wide wall-clock budget. Once exceeded, in-flight hooks are
    /// cancelled (their process groups killed) and remaining hooks are
    /// skipped.
    pub budget: Option<Duration>,
    /// External cancellation, propagated down to subprocess kill signals.
    pub cancel: CancellationToken,
}

/// Schedules hooks for a stage. Owns the result cache; nothing else mutates
/// it.
#[derive(Debug)]
pub struct HookOrchestrator {
    hooks: Vec<HookDefinition>,
    parsers: Arc<ParserRegistry>,
    cache: ResultCache,
    workspace: PathBuf,
    parallelism: usize,
}

impl HookOrchestrator {
    /// Validate the catalog against the registry and workspace. All
    /// violations are fatal: the orchestrator refuses to construct.
    pub fn new(
        hooks: Vec<HookDefinition>,
        parsers: Arc<ParserRegistry>,
        cache: ResultCache,
        workspace: PathBuf,
        parallelism: usize,
    ) -> Result<Self, QuenchError> {
        if !workspace.is_dir() {
            return Err(QuenchError::WorkspaceInaccessible { path: workspace });
        }

        let mut errors = Vec::new();
        for hook in &hooks {
            if hook.command.is_empty() {
                errors.push(format!("hook '{}' has an empty command", hook.name));
            }
            if hook.timeout.is_zero() {
                errors.push(format!("hook '{}' has a zero timeout", hook.name));
            }
            if !parsers.contains(&hook.parser_id) {
                return Err(QuenchError::UnknownParser {
                    hook: hook.name.clone(),
                    parser_id: hook.parser_id.clone(),
                });
            }
            for dep in &hook.depends_on {
                if !hooks.iter().any(|h| &h.name == dep) {
                    return Err(QuenchError::UnknownDependency {
                        hook: hook.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        if !errors.is_empty() {
            return Err(QuenchError::InvalidConfig { errors });
        }

        let refs: Vec<&HookDefinition> = hooks.iter().collect();
        dag::waves(&refs)?;

        Ok(Self {
            hooks,
            parsers,
            cache,
            workspace,
            parallelism: parallelism.max(1),
        })
    }

    /// Run every hook of a stage: cache hits replay without executing, the
    /// rest run in dependency waves with Safe hooks fanned out under the
    /// worker bound and Isolated hooks strictly alone.
    ///
    /// Never fails: every per-hook problem is captured in its `HookResult`.
    pub async fn run_stage(&self, stage: Stage, options: &StageOptions) -> StageResult {
        let started = Instant::now();
        let deadline = options.budget.map(|budget| started + budget);
        let stage_hooks: Vec<HookDefinition> = self
            .hooks
            .iter()
            .filter(|h| h.stage == stage)
            .cloned()
            .collect();

        let versions = self.probe_tool_versions(&stage_hooks).await;
        let keys = self.compute_keys(&stage_hooks, &versions).await;

        let mut results: Vec<HookResult> = Vec::new();
        let mut outcomes: HashMap<String, bool> = HashMap::new();

        // Cache consultation: unexpired hits replay without running.
        let mut pending: Vec<&HookDefinition> = Vec::new();
        for def in &stage_hooks {
            let cached = keys.get(&def.name).and_then(|key| self.cache.get(key));
            match cached {
                Some(snapshot) => {
                    debug!(hook = %def.name, "cache hit");
                    let result = HookResult {
                        hook: def.name.clone(),
                        status: HookStatus::CacheHit,
                        duration: Duration::ZERO,
                        exit_code: snapshot.exit_code,
                        stdout: snapshot.stdout,
                        stderr: snapshot.stderr,
                        issues: snapshot.issues,
                        cache_key: keys.get(&def.name).cloned(),
                        failure_reason: None,
                        prior_status: Some(snapshot.status),
                    };
                    outcomes.insert(def.name.clone(), result.counts_as_passed());
                    results.push(result);
                }
                None => pending.push(def),
            }
        }

        let waves = match dag::waves(&pending) {
            Ok(waves) => waves,
            Err(e) => {
                // Construction already proved the full set acyclic; a subset
                // cannot cycle, but stay total regardless.
                warn!(error = %e, "dependency layering failed");
                for def in &pending {
                    let result = HookResult::skipped(&def.name, "dependency_cycle");
                    outcomes.insert(def.name.clone(), false);
                    results.push(result);
                }
                Vec::new()
            }
        };

        for wave in &waves {
            let (safe, isolated): (Vec<&&HookDefinition>, Vec<&&HookDefinition>) = wave
                .iter()
                .partition(|d| d.security_level == SecurityLevel::Safe);

            // Safe hooks fan out, bounded by workers = min(parallelism,
            // cores, wave size).
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            let workers = self.parallelism.min(cores).min(safe.len().max(1));
            let semaphore = Arc::new(Semaphore::new(workers));
            let mut join_set = JoinSet::new();

            for def in safe {
                if budget_exhausted(deadline, &options.cancel) {
                    let result = HookResult::skipped(&def.name, "stage_budget");
                    outcomes.insert(def.name.clone(), false);
                    results.push(result);
                    continue;
                }
                if let Some(reason) = dependency_block(def, &outcomes) {
                    let result = HookResult::skipped(&def.name, reason);
                    outcomes.insert(def.name.clone(), false);
                    results.push(result);
                    continue;
                }
                let def = (*def).clone();
                let workspace = self.workspace.clone();
                let parsers = self.parsers.clone();
                let key = keys.get(&def.name).cloned();
                let semaphore = semaphore.clone();
                let cancel = options.cancel.clone();
                join_set.spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("stage semaphore never closed");
                    run_guarded(def, workspace, parsers, key, deadline, cancel).await
                });
            }
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(result) => self.record(result, &mut results, &mut outcomes),
                    Err(e) => warn!(error = %e, "hook task aborted"),
                }
            }

            // Isolated hooks run with nothing else in flight: the Safe
            // portion has drained and the next wave has not started.
            for def in isolated {
                if budget_exhausted(deadline, &options.cancel) {
                    let result = HookResult::skipped(&def.name, "stage_budget");
                    outcomes.insert(def.name.clone(), false);
                    results.push(result);
                    continue;
                }
                if let Some(reason) = dependency_block(def, &outcomes) {
                    let result = HookResult::skipped(&def.name, reason);
                    outcomes.insert(def.name.clone(), false);
                    results.push(result);
                    continue;
                }
                let result = run_guarded(
                    (*def).clone(),
                    self.workspace.clone(),
                    self.parsers.clone(),
                    keys.get(&def.name).cloned(),
                    deadline,
                    options.cancel.clone(),
                )
                .await;
                self.record(result, &mut results, &mut outcomes);
            }
        }

        let issues = results
            .iter()
            .flat_map(|r| r.issues.iter().cloned())
            .collect();
        let summary = summarize(&results, started.elapsed());
        StageResult {
            hook_results: results,
            issues,
            summary,
        }
    }

    /// Insert a finished result into the cache (when eligible) and record it.
    fn record(
        &self,
        result: HookResult,
        results: &mut Vec<HookResult>,
        outcomes: &mut HashMap<String, bool>,
    ) {
        if cacheable(&result)
            && let Some(key) = &result.cache_key
        {
            self.cache
                .insert(key.clone(), CachedResult::from_result(&result));
        }
        outcomes.insert(result.hook.clone(), result.counts_as_passed());
        results.push(result);
    }

    /// One `--version` probe per distinct program, memoized for the stage.
    async fn probe_tool_versions(
        &self,
        defs: &[HookDefinition],
    ) -> HashMap<String, Option<String>> {
        let mut versions = HashMap::new();
        for def in defs {
            let Some(program) = def.command.first() else {
                continue;
            };
            if versions.contains_key(program) {
                continue;
            }
            let version = if quench_process::tool_installed(program) {
                quench_process::run_command(
                    &[program.clone(), "--version".to_string()],
                    &self.workspace,
                    VERSION_PROBE_TIMEOUT,
                )
                .await
                .ok()
                .and_then(|exec| exec.stdout.lines().next().map(str::to_string))
            } else {
                None
            };
            versions.insert(program.clone(), version);
        }
        versions
    }

    /// Content-hash cache keys, computed off the async runtime.
    async fn compute_keys(
        &self,
        defs: &[HookDefinition],
        versions: &HashMap<String, Option<String>>,
    ) -> HashMap<String, String> {
        let mut keys = HashMap::new();
        for def in defs {
            let hook = def.clone();
            let workspace = self.workspace.clone();
            let version = def
                .command
                .first()
                .and_then(|p| versions.get(p).cloned())
                .flatten();
            let key = tokio::task::spawn_blocking(move || {
                compute_key(&hook, &workspace, version.as_deref())
            })
            .await;
            match key {
                Ok(key) => {
                    keys.insert(def.name.clone(), key);
                }
                Err(e) => warn!(hook = %def.name, error = %e, "cache key computation failed"),
            }
        }
        keys
    }
}

fn budget_exhausted(deadline: Option<Instant>, cancel: &CancellationToken) -> bool {
    cancel.is_cancelled() || deadline.is_some_and(|at| Instant::now() >= at)
}

fn dependency_block(
    def: &HookDefinition,
    outcomes: &HashMap<String, bool>,
) -> Option<&'static str> {
    for dep in &def.depends_on {
        // Dependencies outside this run (other stage, cache-served elsewhere)
        // have no recorded outcome and are treated as satisfied.
        if outcomes.get(dep) == Some(&false) {
            return Some("dependency_failed");
        }
    }
    None
}

fn cacheable(result: &HookResult) -> bool {
    matches!(result.status, HookStatus::Passed | HookStatus::Failed)
        && !matches!(
            result.failure_reason.as_deref(),
            Some("parse_error") | Some("spawn_error")
        )
}

fn summarize(results: &[HookResult], total_duration: Duration) -> StageSummary {
    let mut summary = StageSummary {
        total_duration,
        ..StageSummary::default()
    };
    for result in results {
        if result.status == HookStatus::CacheHit {
            summary.cache_hits += 1;
        }
        if result.is_skipped() {
            continue;
        }
        if result.counts_as_passed() {
            summary.passed += 1;
        } else {
            summary.failed += 1;
        }
    }
    summary
}

/// Run one hook, racing the stage deadline.
///
/// The hook gets a child of the stage's cancellation token, so external
/// cancellation propagates into the runner on its own; deadline expiry fires
/// the same token locally. Either way the runner group-kills the hook's
/// whole process tree (SIGTERM, grace, SIGKILL) before the execution
/// resolves, and the result is recorded as skipped.
async fn run_guarded(
    def: HookDefinition,
    workspace: PathBuf,
    parsers: Arc<ParserRegistry>,
    cache_key: Option<String>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
) -> HookResult {
    let hook_cancel = cancel.child_token();
    let execution = execute_hook(def, workspace, parsers, cache_key, hook_cancel.clone());
    tokio::pin!(execution);

    let deadline_reached = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = &mut execution => result,
        _ = deadline_reached => {
            hook_cancel.cancel();
            (&mut execution).await
        }
    }
}

async fn execute_hook(
    def: HookDefinition,
    workspace: PathBuf,
    parsers: Arc<ParserRegistry>,
    cache_key: Option<String>,
    cancel: CancellationToken,
) -> HookResult {
    let base = |status: HookStatus| HookResult {
        hook: def.name.clone(),
        status,
        duration: Duration::ZERO,
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        issues: Vec::new(),
        cache_key: cache_key.clone(),
        failure_reason: None,
        prior_status: None,
    };

    let exec = match quench_process::run_hook(&def, &workspace, cancel).await {
        Ok(exec) => exec,
        Err(e) => {
            warn!(hook = %def.name, error = %format!("{e:#}"), "hook spawn failed");
            let mut result = base(HookStatus::Failed);
            result.stderr = format!("{e:#}");
            result.failure_reason = Some("spawn_error".to_string());
            return result;
        }
    };

    let mut result = base(HookStatus::Passed);
    result.duration = exec.duration;
    result.exit_code = exec.exit_code;

    match exec.termination {
        Termination::TimedOut => {
            result.status = HookStatus::Timeout;
            result.failure_reason = Some("timeout".to_string());
            result.stdout = exec.stdout;
            result.stderr = exec.stderr;
            return result;
        }
        Termination::Hung => {
            result.status = HookStatus::HungKilled;
            result.failure_reason = Some("hung".to_string());
            result.stdout = exec.stdout;
            result.stderr = exec.stderr;
            return result;
        }
        Termination::Cancelled => {
            return HookResult::skipped(&def.name, "stage_budget");
        }
        Termination::Completed => {}
    }

    let Some(parser) = parsers.get(&def.parser_id) else {
        // Construction validates parser ids; stay total regardless.
        result.status = HookStatus::Failed;
        result.failure_reason = Some("unknown_parser".to_string());
        return result;
    };

    let raw = RawOutput {
        tool: &def.name,
        stdout: &exec.stdout,
        stderr: &exec.stderr,
        exit_code: exec.exit_code,
        workspace_root: &workspace,
    };
    match parser.parse(&raw) {
        Ok(issues) => {
            result.status = if exec.exit_code == Some(0) && issues.is_empty() {
                HookStatus::Passed
            } else {
                HookStatus::Failed
            };
            if result.status == HookStatus::Failed && issues.is_empty() {
                result.failure_reason = Some("nonzero_exit".to_string());
            }
            result.issues = issues;
        }
        Err(e) => {
            warn!(hook = %def.name, error = %e, "output parse failed");
            result.status = HookStatus::Failed;
            result.failure_reason = Some("parse_error".to_string());
        }
    }
    result.stdout = exec.stdout;
    result.stderr = exec.stderr;
    result
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
