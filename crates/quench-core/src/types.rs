use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Category of a finding, derived from the producing tool and rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    FormatError,
    TypeError,
    SecurityVuln,
    Complexity,
    DeadCode,
    DependencyIssue,
    TestFailure,
    RefactorSuggestion,
    DocIssue,
    Other,
}

impl IssueKind {
    /// Kinds whose fixes carry enough blast radius to demand a higher
    /// routing-confidence floor.
    pub fn is_risky(&self) -> bool {
        matches!(self, Self::SecurityVuln | Self::DependencyIssue)
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FormatError => "format-error",
            Self::TypeError => "type-error",
            Self::SecurityVuln => "security-vuln",
            Self::Complexity => "complexity",
            Self::DeadCode => "dead-code",
            Self::DependencyIssue => "dependency-issue",
            Self::TestFailure => "test-failure",
            Self::RefactorSuggestion => "refactor-suggestion",
            Self::DocIssue => "doc-issue",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Finding severity, ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// A single finding produced by a parser from one hook's output.
///
/// `file_path` is `None` for project-level findings (e.g. a vulnerable
/// dependency); downstream consumers must accept those as valid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Issue {
    /// Stable identifier derived from (tool, file, line, code). Deterministic:
    /// parsing the same output twice yields identical ids.
    pub id: String,
    pub kind: IssueKind,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// 1-based line, when the tool reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column, when the tool reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Tool-specific rule identifier (e.g. `F401`, `B108`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    /// Name of the producing tool.
    pub tool: String,
    /// Opaque per-tool fields preserved verbatim for agents.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub raw: serde_json::Value,
}

impl Issue {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tool: impl Into<String>,
        kind: IssueKind,
        severity: Severity,
        file_path: Option<PathBuf>,
        line: Option<u32>,
        column: Option<u32>,
        code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        let tool = tool.into();
        let id = issue_id(&tool, file_path.as_deref(), line, code.as_deref());
        Self {
            id,
            kind,
            severity,
            file_path,
            line,
            column,
            code,
            message: message.into(),
            tool,
            raw: serde_json::Value::Null,
        }
    }

    /// Attach the tool's raw record for agents that want untranslated fields.
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// True for findings that are not tied to a single file.
    pub fn is_project_level(&self) -> bool {
        self.file_path.is_none()
    }
}

/// Derive the stable issue id: first 16 hex chars of SHA-256 over the
/// identifying tuple. NUL-delimited so adjacent fields cannot collide.
fn issue_id(tool: &str, file: Option<&std::path::Path>, line: Option<u32>, code: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool.as_bytes());
    hasher.update([0]);
    if let Some(path) = file {
        hasher.update(path.to_string_lossy().as_bytes());
    }
    hasher.update([0]);
    if let Some(line) = line {
        hasher.update(line.to_le_bytes());
    }
    hasher.update([0]);
    if let Some(code) = code {
        hasher.update(code.as_bytes());
    }
    let digest = hasher.finalize();
    let mut id = String::with_capacity(16);
    for byte in &digest[..8] {
        use std::fmt::Write;
        let _ = write!(id, "{byte:02x}");
    }
    id
}

/// Execution stage a hook belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Formatters and fast linters.
    Fast,
    /// Type checkers, security scanners, complexity analysis, tests.
    Comprehensive,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Comprehensive => write!(f, "comprehensive"),
        }
    }
}

/// Concurrency class of a hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityLevel {
    /// May run concurrently with other Safe hooks.
    Safe,
    /// Must run with no other hook in flight (mutates shared state).
    Isolated,
}

/// Static description of one external quality tool invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HookDefinition {
    pub name: String,
    /// argv template: program followed by literal arguments. Never passed
    /// through a shell.
    pub command: Vec<String>,
    pub stage: Stage,
    pub timeout: Duration,
    pub security_level: SecurityLevel,
    /// Id of the registered parser that understands this tool's output.
    pub parser_id: String,
    /// Glob patterns (relative to the workspace) whose file contents
    /// invalidate cached results when changed.
    #[serde(default)]
    pub cache_key_inputs: Vec<String>,
    /// Names of hooks that must pass before this one runs.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Environment additions on top of the parent environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl HookDefinition {
    pub fn new(
        name: impl Into<String>,
        command: Vec<String>,
        stage: Stage,
        parser_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            command,
            stage,
            timeout: Duration::from_secs(120),
            security_level: SecurityLevel::Safe,
            parser_id: parser_id.into(),
            cache_key_inputs: Vec::new(),
            depends_on: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn isolated(mut self) -> Self {
        self.security_level = SecurityLevel::Isolated;
        self
    }

    pub fn cache_inputs(mut self, patterns: &[&str]) -> Self {
        self.cache_key_inputs = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn depends_on(mut self, hooks: &[&str]) -> Self {
        self.depends_on = hooks.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Outcome classification of one hook execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookStatus {
    Passed,
    Failed,
    Timeout,
    HungKilled,
    Skipped,
    CacheHit,
}

/// Result of one hook execution (or cache hit).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HookResult {
    pub hook: String,
    pub status: HookStatus,
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// Machine-readable reason for `Failed`/`Skipped` (e.g. `parse_error`,
    /// `dependency_failed`, `stage_budget`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// For `CacheHit`: the status the cached run originally produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_status: Option<HookStatus>,
}

impl HookResult {
    /// A hook counts toward stage success if it passed outright or is a
    /// cache hit of a previously passed run.
    pub fn counts_as_passed(&self) -> bool {
        match self.status {
            HookStatus::Passed => true,
            HookStatus::CacheHit => self.prior_status == Some(HookStatus::Passed),
            _ => false,
        }
    }

    /// Skipped hooks are excluded from the stage pass/fail verdict.
    pub fn is_skipped(&self) -> bool {
        self.status == HookStatus::Skipped
    }

    pub fn skipped(hook: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            status: HookStatus::Skipped,
            duration: Duration::ZERO,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            issues: Vec::new(),
            cache_key: None,
            failure_reason: Some(reason.into()),
            prior_status: None,
        }
    }
}

/// Aggregate counters for one stage run.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct StageSummary {
    pub passed: usize,
    pub failed: usize,
    pub cache_hits: usize,
    pub total_duration: Duration,
}

/// Output of one stage run: every hook's result plus the concatenated issues.
///
/// Issues are appended in hook-completion order, which is nondeterministic
/// within a dependency wave; consumers must treat the list as an unordered
/// set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageResult {
    pub hook_results: Vec<HookResult>,
    pub issues: Vec<Issue>,
    pub summary: StageSummary,
}

impl StageResult {
    pub fn passed(&self) -> bool {
        self.hook_results
            .iter()
            .filter(|r| !r.is_skipped())
            .all(HookResult::counts_as_passed)
    }
}

/// Estimated blast radius of one planned edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One atomic edit inside a [`FixPlan`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannedEdit {
    pub file: PathBuf,
    /// Inclusive 1-based line range the edit touches.
    pub line_range: (u32, u32),
    pub rationale: String,
    pub risk: RiskLevel,
}

/// Structured change set produced by two-stage agents before applying.
/// Direct-fix agents skip planning; the coordinator treats both uniformly.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FixPlan {
    pub edits: Vec<PlannedEdit>,
}

/// Record of one agent's attempt on one issue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixResult {
    pub success: bool,
    /// Agent's self-reported confidence in the applied fix, in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable summaries of each applied fix.
    pub fixes_applied: Vec<String>,
    pub files_modified: BTreeSet<PathBuf>,
    pub remaining_issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl FixResult {
    /// The failure shape the coordinator substitutes when an agent errors.
    pub fn failed(agent: impl Into<String>) -> Self {
        Self {
            success: false,
            confidence: 0.0,
            fixes_applied: Vec::new(),
            files_modified: BTreeSet::new(),
            remaining_issues: Vec::new(),
            agent: Some(agent.into()),
        }
    }
}

/// Aggregated outcome of dispatching one batch of issues to agents.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CoordinatorResult {
    /// Total applied fixes across all agent results.
    pub fixes_applied: usize,
    pub results: Vec<FixResult>,
    /// Issues no agent qualified for. Never silently dropped.
    pub unhandled: Vec<Issue>,
}

impl CoordinatorResult {
    pub fn merge(&mut self, other: CoordinatorResult) {
        self.fixes_applied += other.fixes_applied;
        self.results.extend(other.results);
        self.unhandled.extend(other.unhandled);
    }
}

/// Terminal state of an autofix run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// Zero issues remain.
    Success,
    /// No agent-applied progress for `convergence_threshold` consecutive
    /// iterations; some issues remain.
    Converged,
    /// The iteration budget expired while progress was still being made.
    Exhausted,
}

/// The single summary contract returned to callers after an autofix run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub iterations: u32,
    pub total_fixes_applied: usize,
    pub final_issue_count: usize,
    pub modified_files: BTreeSet<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_id_deterministic() {
        let a = Issue::new(
            "ruff",
            IssueKind::FormatError,
            Severity::Low,
            Some(PathBuf::from("/w/src/app.py")),
            Some(10),
            Some(1),
            Some("F401".into()),
            "unused import",
        );
        let b = Issue::new(
            "ruff",
            IssueKind::FormatError,
            Severity::Low,
            Some(PathBuf::from("/w/src/app.py")),
            Some(10),
            Some(1),
            Some("F401".into()),
            "different message, same identity",
        );
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 16);
    }

    #[test]
    fn test_issue_id_distinguishes_fields() {
        let base = Issue::new(
            "ruff",
            IssueKind::FormatError,
            Severity::Low,
            Some(PathBuf::from("a.py")),
            Some(1),
            None,
            Some("F401".into()),
            "m",
        );
        let other_line = Issue::new(
            "ruff",
            IssueKind::FormatError,
            Severity::Low,
            Some(PathBuf::from("a.py")),
            Some(2),
            None,
            Some("F401".into()),
            "m",
        );
        let other_tool = Issue::new(
            "mypy",
            IssueKind::FormatError,
            Severity::Low,
            Some(PathBuf::from("a.py")),
            Some(1),
            None,
            Some("F401".into()),
            "m",
        );
        assert_ne!(base.id, other_line.id);
        assert_ne!(base.id, other_tool.id);
    }

    #[test]
    fn test_issue_id_no_field_concatenation_collision() {
        // "ab" + "c" must not collide with "a" + "bc" across the delimiter.
        let a = Issue::new("ab", IssueKind::Other, Severity::Info, None, None, None, Some("c".into()), "m");
        let b = Issue::new("a", IssueKind::Other, Severity::Info, None, None, None, Some("bc".into()), "m");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_project_level_issue() {
        let issue = Issue::new(
            "pip-audit",
            IssueKind::DependencyIssue,
            Severity::High,
            None,
            None,
            None,
            Some("PYSEC-2024-1".into()),
            "vulnerable dependency",
        );
        assert!(issue.is_project_level());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_risky_kinds() {
        assert!(IssueKind::SecurityVuln.is_risky());
        assert!(IssueKind::DependencyIssue.is_risky());
        assert!(!IssueKind::FormatError.is_risky());
        assert!(!IssueKind::TestFailure.is_risky());
    }

    #[test]
    fn test_hook_definition_builder() {
        let def = HookDefinition::new(
            "ruff-check",
            vec!["ruff".into(), "check".into()],
            Stage::Fast,
            "ruff",
        )
        .timeout(Duration::from_secs(30))
        .isolated()
        .cache_inputs(&["**/*.py"])
        .depends_on(&["ruff-format"]);

        assert_eq!(def.timeout, Duration::from_secs(30));
        assert_eq!(def.security_level, SecurityLevel::Isolated);
        assert_eq!(def.cache_key_inputs, vec!["**/*.py".to_string()]);
        assert_eq!(def.depends_on, vec!["ruff-format".to_string()]);
    }

    #[test]
    fn test_cache_hit_counts_as_passed_only_when_prior_passed() {
        let mut result = HookResult::skipped("x", "dependency_failed");
        result.status = HookStatus::CacheHit;
        result.failure_reason = None;
        result.prior_status = Some(HookStatus::Passed);
        assert!(result.counts_as_passed());

        result.prior_status = Some(HookStatus::Failed);
        assert!(!result.counts_as_passed());

        result.prior_status = None;
        assert!(!result.counts_as_passed());
    }

    #[test]
    fn test_stage_passed_ignores_skipped() {
        let passed = HookResult {
            hook: "a".into(),
            status: HookStatus::Passed,
            duration: Duration::ZERO,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            issues: Vec::new(),
            cache_key: None,
            failure_reason: None,
            prior_status: None,
        };
        let skipped = HookResult::skipped("b", "dependency_failed");
        let stage = StageResult {
            hook_results: vec![passed.clone(), skipped],
            issues: Vec::new(),
            summary: StageSummary::default(),
        };
        assert!(stage.passed());

        let mut failed = passed;
        failed.status = HookStatus::Failed;
        let stage = StageResult {
            hook_results: vec![failed],
            issues: Vec::new(),
            summary: StageSummary::default(),
        };
        assert!(!stage.passed());
    }

    #[test]
    fn test_fix_result_failed_shape() {
        let result = FixResult::failed("formatter");
        assert!(!result.success);
        assert_eq!(result.confidence, 0.0);
        assert!(result.fixes_applied.is_empty());
        assert_eq!(result.agent.as_deref(), Some("formatter"));
    }

    #[test]
    fn test_coordinator_result_merge() {
        let mut left = CoordinatorResult {
            fixes_applied: 2,
            results: vec![FixResult::failed("a")],
            unhandled: vec![],
        };
        let right = CoordinatorResult {
            fixes_applied: 3,
            results: vec![FixResult::failed("b")],
            unhandled: vec![Issue::new(
                "x", IssueKind::Other, Severity::Info, None, None, None, None, "m",
            )],
        };
        left.merge(right);
        assert_eq!(left.fixes_applied, 5);
        assert_eq!(left.results.len(), 2);
        assert_eq!(left.unhandled.len(), 1);
    }

    #[test]
    fn test_issue_serde_roundtrip() {
        let issue = Issue::new(
            "bandit",
            IssueKind::SecurityVuln,
            Severity::High,
            Some(PathBuf::from("src/app.py")),
            Some(42),
            None,
            Some("B108".into()),
            "hardcoded tmp path",
        )
        .with_raw(serde_json::json!({"issue_confidence": "HIGH"}));

        let json = serde_json::to_string(&issue).unwrap();
        let back: Issue = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, issue.id);
        assert_eq!(back.kind, IssueKind::SecurityVuln);
        assert_eq!(back.raw["issue_confidence"], "HIGH");
    }

    #[test]
    fn test_kind_map_key_serde() {
        use std::collections::HashMap;
        let mut map: HashMap<IssueKind, f64> = HashMap::new();
        map.insert(IssueKind::SecurityVuln, 0.8);
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.contains("security-vuln"));
        let back: HashMap<IssueKind, f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[&IssueKind::SecurityVuln], 0.8);
    }
}
