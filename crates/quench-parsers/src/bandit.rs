//! Parser for `bandit -f json`.

use quench_core::{Issue, IssueKind, Severity};
use serde_json::Value;
use tracing::debug;

use crate::{absolutize, parse_json, OutputFormat, OutputParser, ParseError, RawOutput};

pub struct BanditParser;

impl OutputParser for BanditParser {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError> {
        if raw.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let doc = parse_json(raw.tool, raw.stdout)?;
        let results = doc
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::UnexpectedShape {
                tool: raw.tool.to_string(),
                detail: "missing 'results' array".to_string(),
            })?;

        let mut issues = Vec::with_capacity(results.len());
        for entry in results {
            let Some(message) = entry.get("issue_text").and_then(Value::as_str) else {
                debug!(tool = raw.tool, "skipping result without issue_text");
                continue;
            };
            let file = entry
                .get("filename")
                .and_then(Value::as_str)
                .map(|f| absolutize(raw.workspace_root, f));
            let line = entry
                .get("line_number")
                .and_then(Value::as_u64)
                .map(|n| n as u32);
            let column = entry
                .get("col_offset")
                .and_then(Value::as_u64)
                // bandit reports 0-based columns
                .map(|n| n as u32 + 1);
            let code = entry.get("test_id").and_then(Value::as_str);
            let severity = match entry.get("issue_severity").and_then(Value::as_str) {
                Some("HIGH") => Severity::High,
                Some("MEDIUM") => Severity::Medium,
                _ => Severity::Low,
            };

            issues.push(
                Issue::new(
                    raw.tool,
                    IssueKind::SecurityVuln,
                    severity,
                    file,
                    line,
                    column,
                    code.map(str::to_string),
                    message,
                )
                .with_raw(entry.clone()),
            );
        }
        Ok(issues)
    }
}
