//! Text-output tools with small line formats: refurb, skylos, creosote.

use std::sync::LazyLock;

use quench_core::{Issue, IssueKind, Severity};
use regex::Regex;

use crate::{absolutize, OutputFormat, OutputParser, ParseError, RawOutput};

/// `refurb`: `path:line:col [FURB123]: message`
pub struct RefurbParser;

static REFURB_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<path>[^:\s][^:]*):(?P<line>\d+):(?P<col>\d+)\s+\[(?P<code>FURB\d+)\]:\s*(?P<msg>.+)$")
        .expect("refurb line regex")
});

impl OutputParser for RefurbParser {
    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError> {
        let mut issues = Vec::new();
        for line in raw.stdout.lines() {
            let Some(captures) = REFURB_LINE.captures(line.trim()) else {
                continue;
            };
            issues.push(Issue::new(
                raw.tool,
                IssueKind::RefactorSuggestion,
                Severity::Low,
                Some(absolutize(raw.workspace_root, &captures["path"])),
                captures["line"].parse().ok(),
                captures["col"].parse().ok(),
                Some(captures["code"].to_string()),
                captures["msg"].to_string(),
            ));
        }
        Ok(issues)
    }
}

/// `skylos`: `path:line: message` dead-code findings.
pub struct SkylosParser;

static SKYLOS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<path>[^:\s][^:]*\.py):(?P<line>\d+):?\s+(?P<msg>.+)$")
        .expect("skylos line regex")
});

impl OutputParser for SkylosParser {
    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError> {
        let mut issues = Vec::new();
        for line in raw.stdout.lines() {
            let Some(captures) = SKYLOS_LINE.captures(line.trim()) else {
                continue;
            };
            issues.push(Issue::new(
                raw.tool,
                IssueKind::DeadCode,
                Severity::Medium,
                Some(absolutize(raw.workspace_root, &captures["path"])),
                captures["line"].parse().ok(),
                None,
                None,
                captures["msg"].to_string(),
            ));
        }
        Ok(issues)
    }
}

/// `creosote`: bullet list of dependencies never imported by the code.
/// Project-level findings (no file path).
pub struct CreosoteParser;

impl OutputParser for CreosoteParser {
    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError> {
        let mut issues = Vec::new();
        for line in raw.stdout.lines() {
            let Some(package) = line.trim().strip_prefix("- ") else {
                continue;
            };
            let package = package.trim();
            if package.is_empty() {
                continue;
            }
            issues.push(Issue::new(
                raw.tool,
                IssueKind::DependencyIssue,
                Severity::Low,
                None,
                None,
                None,
                Some(package.to_string()),
                format!("dependency '{package}' is declared but never imported"),
            ));
        }
        Ok(issues)
    }
}
