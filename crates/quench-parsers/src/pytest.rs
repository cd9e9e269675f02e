//! Parser for pytest terminal output.
//!
//! Reads the short-summary lines (`FAILED path::test - message`,
//! `ERROR path::test - message`); the full traceback body is left in the
//! hook's raw stdout for agents that want it.

use quench_core::{Issue, IssueKind, Severity};

use crate::{absolutize, OutputFormat, OutputParser, ParseError, RawOutput};

pub struct PytestParser;

impl OutputParser for PytestParser {
    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError> {
        let mut issues = Vec::new();
        for line in raw.stdout.lines() {
            let line = line.trim();
            let rest = if let Some(rest) = line.strip_prefix("FAILED ") {
                rest
            } else if let Some(rest) = line.strip_prefix("ERROR ") {
                rest
            } else {
                continue;
            };

            let (node_id, message) = match rest.split_once(" - ") {
                Some((node, msg)) => (node.trim(), msg.trim()),
                None => (rest.trim(), "test failed"),
            };
            if node_id.is_empty() {
                continue;
            }
            let file = node_id
                .split("::")
                .next()
                .filter(|p| !p.is_empty())
                .map(|p| absolutize(raw.workspace_root, p));

            issues.push(Issue::new(
                raw.tool,
                IssueKind::TestFailure,
                Severity::High,
                file,
                None,
                None,
                Some(node_id.to_string()),
                message,
            ));
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
            tool: "pytest",
            stdout,
            stderr: "",
            exit_code: Some(1),
            workspace_root: Path::new("/w"),
        }
    }

    const SAMPLE: &str = "\
================= short test summary info ==================
FAILED tests/test_app.py::test_login - AssertionError: expected 200
FAILED tests/test_app.py::test_logout - KeyError: 'session'
ERROR tests/test_db.py::test_conn - fixture 'db' not found
2 failed, 1 error, 14 passed in 3.21s
";

    #[test]
    fn test_parses_summary_lines() {
        let issues = PytestParser.parse(&raw(SAMPLE)).unwrap();
        assert_eq!(issues.len(), 3);

        let login = &issues[0];
        assert_eq!(login.kind, IssueKind::TestFailure);
        assert_eq!(
            login.file_path.as_deref(),
            Some(Path::new("/w/tests/test_app.py"))
        );
        assert_eq!(login.code.as_deref(), Some("tests/test_app.py::test_login"));
        assert_eq!(login.message, "AssertionError: expected 200");
    }

    #[test]
    fn test_distinct_tests_get_distinct_ids() {
        let issues = PytestParser.parse(&raw(SAMPLE)).unwrap();
        assert_ne!(issues[0].id, issues[1].id);
    }

    #[test]
    fn test_passing_run_is_no_issues() {
        let issues = PytestParser.parse(&raw("14 passed in 1.02s\n")).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn test_failed_line_without_message() {
        let issues = PytestParser
            .parse(&raw("FAILED tests/test_x.py::test_y\n"))
            .unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "test failed");
    }
}
