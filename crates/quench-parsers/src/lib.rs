//! Parsers that turn raw tool output into uniform [`Issue`] records.
//!
//! One parser per supported tool, registered by id in a [`ParserRegistry`]
//! built once at startup and immutable afterwards. Every parser is total:
//! any byte sequence yields `Ok(issues)` or a typed [`ParseError`], never a
//! panic. The orchestrator maps `Err` to an empty issue list and a `Failed`
//! hook result; a bad tool run can never crash an iteration.

mod bandit;
mod complexipy;
mod gitleaks;
mod mypy;
mod pip_audit;
mod pytest;
mod ruff;
mod semgrep;
mod text;
mod text_tools;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quench_core::Issue;

pub use text::GenericTextParser;

/// Output representation a parser expects from its tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

/// Raw material handed to a parser after a hook execution.
#[derive(Debug, Clone, Copy)]
pub struct RawOutput<'a> {
    pub tool: &'a str,
    pub stdout: &'a str,
    pub stderr: &'a str,
    pub exit_code: Option<i32>,
    pub workspace_root: &'a Path,
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("{tool}: malformed JSON output: {detail}")]
    MalformedJson { tool: String, detail: String },

    #[error("{tool}: unexpected output shape: {detail}")]
    UnexpectedShape { tool: String, detail: String },

    #[error("{tool}: report file '{}' unreadable: {detail}", .path.display())]
    ReportUnreadable {
        tool: String,
        path: PathBuf,
        detail: String,
    },
}

/// One tool's output parser. `parse` must be a total function.
pub trait OutputParser: Send + Sync {
    fn format(&self) -> OutputFormat;
    fn parse(&self, raw: &RawOutput<'_>) -> Result<Vec<Issue>, ParseError>;
}

/// Id → parser map. Populated at initialization, immutable thereafter;
/// shared by reference into the orchestrator (no process-wide singleton).
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn OutputParser>>,
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registry covering every tool in the built-in hook catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("ruff", Arc::new(ruff::RuffParser));
        registry.register("mypy", Arc::new(mypy::MypyParser));
        registry.register("bandit", Arc::new(bandit::BanditParser));
        registry.register("semgrep", Arc::new(semgrep::SemgrepParser));
        registry.register("pip-audit", Arc::new(pip_audit::PipAuditParser));
        registry.register("gitleaks", Arc::new(gitleaks::GitleaksParser));
        registry.register("complexipy", Arc::new(complexipy::ComplexipyParser));
        registry.register("refurb", Arc::new(text_tools::RefurbParser));
        registry.register("skylos", Arc::new(text_tools::SkylosParser));
        registry.register("creosote", Arc::new(text_tools::CreosoteParser));
        registry.register("pytest", Arc::new(pytest::PytestParser));
        registry.register("text", Arc::new(text::GenericTextParser::default()));
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, parser: Arc<dyn OutputParser>) {
        self.parsers.insert(id.into(), parser);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn OutputParser>> {
        self.parsers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.parsers.contains_key(id)
    }
}

/// Resolve a tool-reported path against the workspace root.
pub(crate) fn absolutize(workspace: &Path, reported: &str) -> PathBuf {
    let path = Path::new(reported);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

/// Parse a full JSON document, mapping failure to [`ParseError::MalformedJson`].
pub(crate) fn parse_json(tool: &str, text: &str) -> Result<serde_json::Value, ParseError> {
    serde_json::from_str(text).map_err(|e| ParseError::MalformedJson {
        tool: tool.to_string(),
        detail: e.to_string(),
    })
}


#[cfg(test)]
#[path = "totality_tests.rs"]
mod totality_tests;
