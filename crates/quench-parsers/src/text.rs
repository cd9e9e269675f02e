//! Generic text fallback: extracts `path:line:col: CODE message` patterns
//! from tools without a dedicated parser.

use std::sync::LazyLock;

use quench_core::{Issue, IssueKind, Severity};
use regex::Regex;

use crate::{absolutize, OutputFormat, OutputParser, ParseError, RawOutput};

static DIAGNOSTIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<path>[^:\s][^:]*):(?P<line>\d+)(?::(?P<col>\d+))?:?\s+(?:\[?(?P<code>[A-Z]{1,6}\d{2,5})\]?:?\s+)?(?P<msg>.+)$",
    )
    .expect("diagnostic line regex")
});

#[derive(Default)]
pub struct GenericTextParser;

impl OutputParser for GenericTextParser {
    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError> {
        let mut issues = Vec::new();
        for line in raw.stdout.lines().chain(raw.stderr.lines()) {
            let Some(captures) = DIAGNOSTIC_LINE.captures(line.trim()) else {
                continue;
            };
            issues.push(Issue::new(
                raw.tool,
                IssueKind::Other,
                Severity::Low,
                Some(absolutize(raw.workspace_root, &captures["path"])),
                captures["line"].parse().ok(),
                captures.name("col").and_then(|c| c.as_str().parse().ok()),
                captures.name("code").map(|c| c.as_str().to_string()),
                captures["msg"].to_string(),
            ));
        }
        Ok(issues)
    }
}
