//! Deterministic tool-backed agents.
//!
//! These shell out to `ruff`, which rewrites files atomically and is
//! idempotent: applying the same fix twice converges on the same bytes.
//! AI-backed agents plug in through the same [`Agent`] trait.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use quench_core::{FixResult, Issue, IssueKind};

use crate::agent::{Agent, AgentContext};

const FIXER_TIMEOUT: Duration = Duration::from_secs(60);

fn cancelled_result(agent: &str) -> FixResult {
    FixResult {
        success: false,
        confidence: 0.0,
        fixes_applied: Vec::new(),
        files_modified: BTreeSet::new(),
        remaining_issues: Vec::new(),
        agent: Some(agent.to_string()),
    }
}

async fn run_fixer(
    agent: &str,
    argv: Vec<String>,
    target: Option<&Path>,
    summary: String,
    confidence: f64,
    workspace: &Path,
) -> anyhow::Result<FixResult> {
    let exec = quench_process::run_command(&argv, workspace, FIXER_TIMEOUT).await?;
    if exec.exit_code == Some(0) {
        let mut files_modified = BTreeSet::new();
        if let Some(path) = target {
            files_modified.insert(path.to_path_buf());
        }
        Ok(FixResult {
            success: true,
            confidence,
            fixes_applied: vec![summary],
            files_modified,
            remaining_issues: Vec::new(),
            agent: Some(agent.to_string()),
        })
    } else {
        anyhow::bail!(
            "{agent}: fixer exited with {:?}: {}",
            exec.exit_code,
            exec.stderr.lines().next().unwrap_or("")
        )
    }
}

/// Fixes formatting findings by running `ruff format` on the target file
/// (or the whole workspace for project-level findings).
pub struct FormatterAgent;

#[async_trait]
impl Agent for FormatterAgent {
    fn name(&self) -> &str {
        "formatter"
    }

    fn can_handle(&self, issue: &Issue) -> f64 {
        if issue.kind == IssueKind::FormatError {
            0.9
        } else {
            0.0
        }
    }

    async fn apply(&self, issue: &Issue, ctx: &AgentContext) -> anyhow::Result<FixResult> {
        if ctx.cancel.is_cancelled() {
            return Ok(cancelled_result(self.name()));
        }
        let target = issue.file_path.as_deref();
        let target_arg = target
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());
        let summary = format!("reformatted {target_arg}");
        run_fixer(
            self.name(),
            vec!["ruff".into(), "format".into(), target_arg],
            target,
            summary,
            0.9,
            &ctx.workspace_root,
        )
        .await
    }
}

/// Removes unused imports (`F401`) via `ruff check --fix` scoped to that rule.
pub struct ImportCleanerAgent;

#[async_trait]
impl Agent for ImportCleanerAgent {
    fn name(&self) -> &str {
        "import-cleaner"
    }

    fn can_handle(&self, issue: &Issue) -> f64 {
        if issue.kind == IssueKind::DeadCode && issue.code.as_deref() == Some("F401") {
            0.85
        } else {
            0.0
        }
    }

    async fn apply(&self, issue: &Issue, ctx: &AgentContext) -> anyhow::Result<FixResult> {
        if ctx.cancel.is_cancelled() {
            return Ok(cancelled_result(self.name()));
        }
        let Some(target) = issue.file_path.as_deref() else {
            anyhow::bail!("import-cleaner: finding has no target file");
        };
        let target_arg = target.to_string_lossy().into_owned();
        let summary = format!("removed unused import in {target_arg}");
        run_fixer(
            self.name(),
            vec![
                "ruff".into(),
                "check".into(),
                "--select".into(),
                "F401".into(),
                "--fix".into(),
                target_arg,
            ],
            Some(target),
            summary,
            0.85,
            &ctx.workspace_root,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quench_core::Severity;
    use std::path::PathBuf;

    fn issue(kind: IssueKind, code: Option<&str>, file: Option<&str>) -> Issue {
        Issue::new(
            "ruff-check",
            kind,
            Severity::Low,
            file.map(PathBuf::from),
            Some(1),
            None,
            code.map(str::to_string),
            "m",
        )
    }

    #[test]
    fn test_formatter_handles_only_format_errors() {
        let agent = FormatterAgent;
        assert_eq!(
            agent.can_handle(&issue(IssueKind::FormatError, Some("E501"), Some("a.py"))),
            0.9
        );
        assert_eq!(
            agent.can_handle(&issue(IssueKind::TypeError, None, Some("a.py"))),
            0.0
        );
    }

    #[test]
    fn test_import_cleaner_scoped_to_unused_imports() {
        let agent = ImportCleanerAgent;
        assert_eq!(
            agent.can_handle(&issue(IssueKind::DeadCode, Some("F401"), Some("a.py"))),
            0.85
        );
        assert_eq!(
            agent.can_handle(&issue(IssueKind::DeadCode, Some("F841"), Some("a.py"))),
            0.0
        );
        assert_eq!(
            agent.can_handle(&issue(IssueKind::FormatError, Some("F401"), Some("a.py"))),
            0.0
        );
    }

    #[tokio::test]
    async fn test_cancelled_apply_returns_partial_result() {
        let agent = FormatterAgent;
        let ctx = AgentContext::new(std::env::temp_dir());
        ctx.cancel.cancel();
        let result = agent
            .apply(&issue(IssueKind::FormatError, None, Some("a.py")), &ctx)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.fixes_applied.is_empty());
    }

    #[tokio::test]
    async fn test_import_cleaner_rejects_project_level_finding() {
        let agent = ImportCleanerAgent;
        let ctx = AgentContext::new(std::env::temp_dir());
        let result = agent
            .apply(&issue(IssueKind::DeadCode, Some("F401"), None), &ctx)
            .await;
        assert!(result.is_err());
    }
}
