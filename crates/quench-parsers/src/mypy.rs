//! Parser for the mypy family (`mypy --output=json`): one JSON object per line.

use quench_core::{Issue, IssueKind, Severity};
use serde_json::Value;
use tracing::debug;

use crate::{absolutize, OutputFormat, OutputParser, ParseError, RawOutput};

pub struct MypyParser;

impl OutputParser for MypyParser {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError> {
        let mut issues = Vec::new();
        let mut saw_content = false;
        let mut parsed_any = false;

        for line in raw.stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // The summary line ("Found 3 errors in 1 file") and other banners
            // are not JSON; tolerate them.
            if !line.starts_with('{') {
                saw_content = true;
                continue;
            }
            let entry: Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    saw_content = true;
                    debug!(tool = raw.tool, error = %e, "skipping unparseable diagnostic line");
                    continue;
                }
            };
            parsed_any = true;

            let Some(message) = entry.get("message").and_then(Value::as_str) else {
                continue;
            };
            let file = entry
                .get("file")
                .and_then(Value::as_str)
                .filter(|f| !f.is_empty())
                .map(|f| absolutize(raw.workspace_root, f));
            let line_no = entry.get("line").and_then(Value::as_u64).map(|n| n as u32);
            let column = entry
                .get("column")
                .and_then(Value::as_u64)
                .map(|n| n as u32);
            let code = entry.get("code").and_then(Value::as_str);
            let severity = match entry.get("severity").and_then(Value::as_str) {
                Some("note") => Severity::Info,
                _ => Severity::Medium,
            };

            issues.push(
                Issue::new(
                    raw.tool,
                    IssueKind::TypeError,
                    severity,
                    file,
                    line_no,
                    column,
                    code.map(str::to_string),
                    message,
                )
                .with_raw(entry.clone()),
            );
        }

        // Output present but not a single diagnostic line parsed: the tool
        // did not speak the format we asked for.
        if !parsed_any && saw_content {
            return Err(ParseError::MalformedJson {
                tool: raw.tool.to_string(),
                detail: "no JSON diagnostic lines found in non-empty output".to_string(),
            });
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn raw<'a>(stdout: &'a str) -> RawOutput<'a> {
        RawOutput {
            tool: "mypy",
            stdout,
            stderr: "",
            exit_code: Some(1),
            workspace_root: Path::new("/w"),
        }
    }

    const SAMPLE: &str = concat!(
        r#"{"file": "src/app.py", "line": 12, "column": 4, "message": "Incompatible return value type", "hint": null, "code": "return-value", "severity": "error"}"#,
        "\n",
        r#"{"file": "src/app.py", "line": 13, "column": 0, "message": "See docs", "hint": null, "code": null, "severity": "note"}"#,
        "\n",
        "Found 1 error in 1 file (checked 4 source files)\n",
    );

    #[test]
    fn test_parses_json_lines() {
        let issues = MypyParser.parse(&raw(SAMPLE)).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, IssueKind::TypeError);
        assert_eq!(issues[0].severity, Severity::Medium);
        assert_eq!(issues[0].code.as_deref(), Some("return-value"));
        assert_eq!(
            issues[0].file_path.as_deref(),
            Some(Path::new("/w/src/app.py"))
        );
        assert_eq!(issues[1].severity, Severity::Info);
    }

    #[test]
    fn test_empty_output_is_clean() {
        assert!(MypyParser.parse(&raw("")).unwrap().is_empty());
    }

    #[test]
    fn test_pure_text_output_is_error() {
        let result = MypyParser.parse(&raw("src/app.py:12: error: bad type\n"));
        assert!(matches!(result, Err(ParseError::MalformedJson { .. })));
    }

    #[test]
    fn test_banner_lines_tolerated_alongside_json() {
        let text = format!("mypy 1.11\n{SAMPLE}");
        let issues = MypyParser.parse(&raw(&text)).unwrap();
        assert_eq!(issues.len(), 2);
    }
}
