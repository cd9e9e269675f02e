//! Parser for `pip-audit -f json`.
//!
//! Vulnerable dependencies are project-level findings: no file path, routed
//! through the project-level lock downstream.

use quench_core::{Issue, IssueKind, Severity};
use serde_json::Value;

use crate::{parse_json, OutputFormat, OutputParser, ParseError, RawOutput};

pub struct PipAuditParser;

impl OutputParser for PipAuditParser {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError> {
        if raw.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let doc = parse_json(raw.tool, raw.stdout)?;
        let dependencies = doc
            .get("dependencies")
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::UnexpectedShape {
                tool: raw.tool.to_string(),
                detail: "missing 'dependencies' array".to_string(),
            })?;

        let mut issues = Vec::new();
        for dep in dependencies {
            let name = dep.get("name").and_then(Value::as_str).unwrap_or("?");
            let version = dep.get("version").and_then(Value::as_str).unwrap_or("?");
            let Some(vulns) = dep.get("vulns").and_then(Value::as_array) else {
                continue;
            };
            for vuln in vulns {
                let id = vuln.get("id").and_then(Value::as_str);
                let description = vuln
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("known vulnerability");
                let fix_versions: Vec<&str> = vuln
                    .get("fix_versions")
                    .and_then(Value::as_array)
                    .map(|v| v.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();

                let mut message = format!("{name} {version}: {description}");
                if !fix_versions.is_empty() {
                    message.push_str(&format!(" (fixed in {})", fix_versions.join(", ")));
                }

                issues.push(
                    Issue::new(
                        raw.tool,
                        IssueKind::DependencyIssue,
                        Severity::High,
                        None,
                        None,
                        None,
                        id.map(str::to_string),
                        message,
                    )
                    .with_raw(vuln.clone()),
                );
            }
        }
        Ok(issues)
    }
}
