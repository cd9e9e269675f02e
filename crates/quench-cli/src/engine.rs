//! Wiring: config → registries → orchestrator/coordinator → loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use quench_agents::{
    AgentContext, AgentCoordinator, AgentRegistry, ConfidenceThresholds, CoordinatorOptions,
    FormatterAgent, ImportCleanerAgent,
};
use quench_cache::ResultCache;
use quench_config::QuenchConfig;
use quench_core::{RunReport, RunStatus, StageResult};
use quench_hooks::{apply_timeout_overrides, builtin_catalog, HookOrchestrator, StageOptions};
use quench_loop::adapters::{CoordinatorFixDispatcher, OrchestratorStageRunner};
use quench_loop::{AutofixLoop, LoopConfig};
use quench_parsers::ParserRegistry;

use crate::cli::{Cli, Command, OutputFormat};

pub async fn run(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => QuenchConfig::load(path)?,
        None => QuenchConfig::default(),
    };
    if let Some(workspace) = &cli.workspace {
        config.workspace_root = workspace.clone();
    }

    let mut hooks = builtin_catalog();
    let hook_names: Vec<String> = hooks.iter().map(|h| h.name.clone()).collect();
    config.validate(&hook_names)?;
    apply_timeout_overrides(&mut hooks, &config.hook_timeouts);

    let parsers = Arc::new(ParserRegistry::builtin());
    let cache = ResultCache::new(
        config.cache_max_entries,
        Duration::from_secs(config.cache_ttl_seconds),
    )
    .with_disk(config.workspace_root.join(".quench/cache"));
    let orchestrator = Arc::new(HookOrchestrator::new(
        hooks,
        parsers,
        cache,
        config.workspace_root.clone(),
        config.parallelism,
    )?);
    let options = StageOptions {
        budget: config.stage_budget_seconds.map(Duration::from_secs),
        ..StageOptions::default()
    };

    match cli.command {
        Command::Check { stage } => {
            let result = orchestrator.run_stage(stage, &options).await;
            render_stage(&result, cli.format);
            Ok(if result.passed() { 0 } else { 1 })
        }
        Command::Fix => {
            let mut registry = AgentRegistry::new();
            registry.register(Arc::new(FormatterAgent));
            registry.register(Arc::new(ImportCleanerAgent));

            let coordinator = Arc::new(AgentCoordinator::new(
                Arc::new(registry),
                CoordinatorOptions {
                    max_concurrency: config.agent_concurrency,
                    batch_size: config.batch_size,
                    thresholds: ConfidenceThresholds::new(config.min_agent_confidence.clone()),
                },
            ));
            let ctx = AgentContext::new(config.workspace_root.clone());

            let autofix = AutofixLoop::new(
                Arc::new(OrchestratorStageRunner::new(orchestrator, options)),
                Arc::new(CoordinatorFixDispatcher::new(coordinator, ctx)),
                LoopConfig {
                    max_iterations: config.max_iterations,
                    convergence_threshold: config.convergence_threshold,
                    ai_fix_enabled: config.ai_fix_enabled,
                },
            );
            let report = autofix.run().await?;
            render_report(&report, cli.format);
            Ok(match report.status {
                RunStatus::Success => 0,
                RunStatus::Converged | RunStatus::Exhausted => 1,
            })
        }
    }
}

fn render_stage(result: &StageResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(result) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("error: failed to render stage result: {e}"),
        },
        OutputFormat::Text => {
            for hook in &result.hook_results {
                println!(
                    "{:<16} {:?} ({} issues, {:.1}s)",
                    hook.hook,
                    hook.status,
                    hook.issues.len(),
                    hook.duration.as_secs_f64()
                );
            }
            for issue in &result.issues {
                let location = match (&issue.file_path, issue.line) {
                    (Some(path), Some(line)) => format!("{}:{line}", path.display()),
                    (Some(path), None) => path.display().to_string(),
                    _ => "<project>".to_string(),
                };
                println!(
                    "  {location} {} {}  [{}]",
                    issue.code.as_deref().unwrap_or("-"),
                    issue.message,
                    issue.tool
                );
            }
            let summary = &result.summary;
            println!(
                "passed {}, failed {}, cache hits {}, total {:.1}s",
                summary.passed,
                summary.failed,
                summary.cache_hits,
                summary.total_duration.as_secs_f64()
            );
        }
    }
}

fn render_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("error: failed to render run report: {e}"),
        },
        OutputFormat::Text => {
            println!(
                "{:?}: {} iterations, {} fixes applied, {} issues remaining",
                report.status,
                report.iterations,
                report.total_fixes_applied,
                report.final_issue_count
            );
            for file in &report.modified_files {
                println!("  modified {}", file.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn test_run_fails_fast_on_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("quench.toml");
        std::fs::write(&config_path, "max_iterations = 0\n").unwrap();

        let cli = Cli::parse_from([
            "quench",
            "--config",
            config_path.to_str().unwrap(),
            "check",
        ]);
        let err = run(cli).await.unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[tokio::test]
    async fn test_run_fails_on_missing_workspace() {
        let cli = Cli::parse_from([
            "quench",
            "--workspace",
            "/quench-no-such-workspace",
            "check",
        ]);
        assert!(run(cli).await.is_err());
    }
}
