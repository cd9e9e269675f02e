//! Parser for complexipy.
//!
//! Complexipy writes its JSON report to a file and names the path on stdout.
//! The parser extracts the last `.json` token from stdout (falling back to
//! `complexipy.json` in the workspace), reads the report, and emits one
//! issue per function over the complexity ceiling.

use std::path::{Path, PathBuf};

use quench_core::{Issue, IssueKind, Severity};
use serde_json::Value;

use crate::{absolutize, OutputFormat, OutputParser, ParseError, RawOutput};

/// Functions at or below this cognitive complexity are not findings.
const COMPLEXITY_CEILING: u64 = 15;

pub struct ComplexipyParser;

impl ComplexipyParser {
    /// Locate the report: last whitespace-separated `.json` token in stdout,
    /// resolved against the workspace, else the default location.
    fn report_path(stdout: &str, workspace: &Path) -> PathBuf {
        stdout
            .split_whitespace()
            .filter(|token| token.ends_with(".json"))
            .next_back()
            .map(|token| absolutize(workspace, token))
            .unwrap_or_else(|| workspace.join("complexipy.json"))
    }
}

impl OutputParser for ComplexipyParser {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError> {
        let path = Self::report_path(raw.stdout, raw.workspace_root);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) if raw.exit_code == Some(0) => return Ok(Vec::new()),
            Err(e) => {
                return Err(ParseError::ReportUnreadable {
                    tool: raw.tool.to_string(),
                    path,
                    detail: e.to_string(),
                });
            }
        };

        let doc: Value = serde_json::from_str(&text).map_err(|e| ParseError::MalformedJson {
            tool: raw.tool.to_string(),
            detail: e.to_string(),
        })?;
        let entries = doc.as_array().ok_or_else(|| ParseError::UnexpectedShape {
            tool: raw.tool.to_string(),
            detail: "expected a top-level array of function records".to_string(),
        })?;

        let mut issues = Vec::new();
        for entry in entries {
            let complexity = entry
                .get("complexity")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            if complexity <= COMPLEXITY_CEILING {
                continue;
            }
            let function = entry
                .get("function_name")
                .and_then(Value::as_str)
                .unwrap_or("?");
            let file = entry
                .get("path")
                .and_then(Value::as_str)
                .map(|f| absolutize(raw.workspace_root, f));
            let severity = if complexity > 2 * COMPLEXITY_CEILING {
                Severity::High
            } else {
                Severity::Medium
            };

            issues.push(
                Issue::new(
                    raw.tool,
                    IssueKind::Complexity,
                    severity,
                    file,
                    None,
                    None,
                    Some(format!("complexity-{complexity}")),
                    format!("function '{function}' has cognitive complexity {complexity} (max {COMPLEXITY_CEILING})"),
                )
                .with_raw(entry.clone()),
            );
        }
        Ok(issues)
    }
}
