//! Parser for `semgrep --json`.

use quench_core::{Issue, IssueKind, Severity};
use serde_json::Value;
use tracing::debug;

use crate::{absolutize, parse_json, OutputFormat, OutputParser, ParseError, RawOutput};

pub struct SemgrepParser;

impl OutputParser for SemgrepParser {
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
            let extra = entry.get("extra");
            let Some(message) = extra
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
            else {
                debug!(tool = raw.tool, "skipping result without extra.message");
                continue;
            };
            let check_id = entry.get("check_id").and_then(Value::as_str);
            let file = entry
                .get("path")
                .and_then(Value::as_str)
                .map(|f| absolutize(raw.workspace_root, f));
            let start = entry.get("start");
            let line = start
                .and_then(|s| s.get("line"))
                .and_then(Value::as_u64)
                .map(|n| n as u32);
            let column = start
                .and_then(|s| s.get("col"))
                .and_then(Value::as_u64)
                .map(|n| n as u32);
            let severity = match extra
                .and_then(|e| e.get("severity"))
                .and_then(Value::as_str)
            {
                Some("ERROR") => Severity::High,
                Some("WARNING") => Severity::Medium,
                _ => Severity::Info,
            };

            issues.push(
                Issue::new(
                    raw.tool,
                    IssueKind::SecurityVuln,
                    severity,
                    file,
                    line,
                    column,
                    check_id.map(str::to_string),
                    message,
                )
                .with_raw(entry.clone()),
            );
        }
        Ok(issues)
    }
}
