//! Parser for `ruff check --output-format json`.

use quench_core::{Issue, IssueKind, Severity};
use serde_json::Value;
use tracing::debug;

use crate::{absolutize, parse_json, OutputFormat, OutputParser, ParseError, RawOutput};

pub struct RuffParser;

impl OutputParser for RuffParser {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError> {
        if raw.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let doc = parse_json(raw.tool, raw.stdout)?;
        let entries = doc.as_array().ok_or_else(|| ParseError::UnexpectedShape {
            tool: raw.tool.to_string(),
            detail: "expected a top-level array of diagnostics".to_string(),
        })?;

        let mut issues = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(message) = entry.get("message").and_then(Value::as_str) else {
                debug!(tool = raw.tool, "skipping diagnostic without message");
                continue;
            };
            let code = entry.get("code").and_then(Value::as_str);
            let file = entry
                .get("filename")
                .and_then(Value::as_str)
                .map(|f| absolutize(raw.workspace_root, f));
            let location = entry.get("location");
            let line = location
                .and_then(|l| l.get("row"))
                .and_then(Value::as_u64)
                .map(|n| n as u32);
            let column = location
                .and_then(|l| l.get("column"))
                .and_then(Value::as_u64)
                .map(|n| n as u32);

            let (kind, severity) = classify(code);
            issues.push(
                Issue::new(
                    raw.tool,
                    kind,
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

/// Map a ruff rule code to an issue kind and severity by its family prefix.
fn classify(code: Option<&str>) -> (IssueKind, Severity) {
    let Some(code) = code else {
        return (IssueKind::Other, Severity::Low);
    };
    let family: String = code.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    match family.as_str() {
        // pycodestyle, isort, formatter conflicts
        "E" | "W" | "I" | "COM" | "Q" => (IssueKind::FormatError, Severity::Low),
        // pyflakes unused import/variable
        "F" => (IssueKind::DeadCode, Severity::Medium),
        // flake8-bandit rules surfaced through ruff
        "S" => (IssueKind::SecurityVuln, Severity::Medium),
        // mccabe complexity
        "C" => (IssueKind::Complexity, Severity::Medium),
        // pydocstyle
        "D" => (IssueKind::DocIssue, Severity::Info),
        // modernization families
        "UP" | "FURB" | "RET" | "SIM" | "PERF" => (IssueKind::RefactorSuggestion, Severity::Low),
        _ => (IssueKind::Other, Severity::Low),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn raw<'a>(stdout: &'a str) -> RawOutput<'a> {
        RawOutput {
            tool: "ruff",
            stdout,
            stderr: "",
            exit_code: Some(1),
            workspace_root: Path::new("/w"),
        }
    }

    const SAMPLE: &str = r#"[
      {
        "code": "F401",
        "filename": "src/app.py",
        "location": {"row": 1, "column": 8},
        "end_location": {"row": 1, "column": 10},
        "message": "`os` imported but unused",
        "noqa_row": 1
      },
      {
        "code": "E501",
        "filename": "/abs/long.py",
        "location": {"row": 12, "column": 89},
        "message": "Line too long (120 > 88)"
      }
    ]"#;

    #[test]
    fn test_parses_diagnostics() {
        let issues = RuffParser.parse(&raw(SAMPLE)).unwrap();
        assert_eq!(issues.len(), 2);

        let unused = &issues[0];
        assert_eq!(unused.kind, IssueKind::DeadCode);
        assert_eq!(unused.code.as_deref(), Some("F401"));
        assert_eq!(unused.file_path.as_deref(), Some(Path::new("/w/src/app.py")));
        assert_eq!(unused.line, Some(1));
        assert_eq!(unused.column, Some(8));
        assert_eq!(unused.raw["noqa_row"], 1);

        let long = &issues[1];
        assert_eq!(long.kind, IssueKind::FormatError);
        assert_eq!(long.file_path.as_deref(), Some(Path::new("/abs/long.py")));
    }

    #[test]
    fn test_ids_stable_across_parses() {
        let first = RuffParser.parse(&raw(SAMPLE)).unwrap();
        let second = RuffParser.parse(&raw(SAMPLE)).unwrap();
        let first_ids: Vec<_> = first.iter().map(|i| i.id.clone()).collect();
        let second_ids: Vec<_> = second.iter().map(|i| i.id.clone()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_empty_stdout_is_no_issues() {
        assert!(RuffParser.parse(&raw("")).unwrap().is_empty());
        assert!(RuffParser.parse(&raw("[]")).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            RuffParser.parse(&raw("{broken")),
            Err(ParseError::MalformedJson { .. })
        ));
    }

    #[test]
    fn test_non_array_shape_is_error() {
        assert!(matches!(
            RuffParser.parse(&raw("{\"results\": []}")),
            Err(ParseError::UnexpectedShape { .. })
        ));
    }

    #[test]
    fn test_entry_without_message_skipped() {
        let issues = RuffParser
            .parse(&raw(r#"[{"code": "F401"}, {"message": "ok", "filename": "a.py"}]"#))
            .unwrap();
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_classify_families() {
        assert_eq!(classify(Some("S608")).0, IssueKind::SecurityVuln);
        assert_eq!(classify(Some("C901")).0, IssueKind::Complexity);
        assert_eq!(classify(Some("D103")).0, IssueKind::DocIssue);
        assert_eq!(classify(Some("UP006")).0, IssueKind::RefactorSuggestion);
        assert_eq!(classify(None).0, IssueKind::Other);
    }
}
