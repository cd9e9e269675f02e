//! Built-in hook catalog for Python workspaces.
//!
//! Tools that support JSON output get the flags for it here, so their
//! parsers see the format they prefer. Hooks that mutate the workspace
//! (formatters, report writers) are `Isolated`.

use std::collections::HashMap;
use std::time::Duration;

use quench_core::{HookDefinition, Stage};

const PY_SOURCES: &[&str] = &["**/*.py", "pyproject.toml"];
const DEP_MANIFESTS: &[&str] = &["pyproject.toml", "requirements*.txt"];

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// The default hook set: fast stage for formatters and quick lints,
/// comprehensive stage for everything that takes real time.
pub fn builtin_catalog() -> Vec<HookDefinition> {
    vec![
        // -- fast stage --
        HookDefinition::new("ruff-format", strings(&["ruff", "format", "."]), Stage::Fast, "text")
            .timeout(Duration::from_secs(60))
            .isolated()
            .cache_inputs(PY_SOURCES),
        HookDefinition::new(
            "ruff-check",
            strings(&["ruff", "check", ".", "--output-format", "json"]),
            Stage::Fast,
            "ruff",
        )
        .timeout(Duration::from_secs(60))
        .cache_inputs(PY_SOURCES)
        .depends_on(&["ruff-format"]),
        // -- comprehensive stage --
        HookDefinition::new(
            "mypy",
            strings(&["mypy", ".", "--output=json"]),
            Stage::Comprehensive,
            "mypy",
        )
        .timeout(Duration::from_secs(300))
        .cache_inputs(PY_SOURCES),
        HookDefinition::new(
            "bandit",
            strings(&["bandit", "-r", ".", "-f", "json", "-q"]),
            Stage::Comprehensive,
            "bandit",
        )
        .timeout(Duration::from_secs(180))
        .cache_inputs(PY_SOURCES),
        HookDefinition::new(
            "semgrep",
            strings(&["semgrep", "scan", "--config", "auto", "--json", "--quiet"]),
            Stage::Comprehensive,
            "semgrep",
        )
        .timeout(Duration::from_secs(600))
        .cache_inputs(PY_SOURCES),
        HookDefinition::new(
            "complexipy",
            strings(&["complexipy", ".", "--output-json"]),
            Stage::Comprehensive,
            "complexipy",
        )
        .timeout(Duration::from_secs(180))
        .cache_inputs(PY_SOURCES),
        HookDefinition::new(
            "pip-audit",
            strings(&["pip-audit", "-f", "json"]),
            Stage::Comprehensive,
            "pip-audit",
        )
        .timeout(Duration::from_secs(300))
        .cache_inputs(DEP_MANIFESTS),
        HookDefinition::new(
            "gitleaks",
            strings(&[
                "gitleaks",
                "detect",
                "--no-banner",
                "--report-format",
                "json",
                "--report-path",
                ".quench/gitleaks-report.json",
            ]),
            Stage::Comprehensive,
            "gitleaks",
        )
        .timeout(Duration::from_secs(120))
        // Writes its report file into the workspace.
        .isolated(),
        HookDefinition::new("refurb", strings(&["refurb", "."]), Stage::Comprehensive, "refurb")
            .timeout(Duration::from_secs(300))
            .cache_inputs(PY_SOURCES),
        HookDefinition::new("skylos", strings(&["skylos", "."]), Stage::Comprehensive, "skylos")
            .timeout(Duration::from_secs(120))
            .cache_inputs(PY_SOURCES),
        HookDefinition::new("creosote", strings(&["creosote"]), Stage::Comprehensive, "creosote")
            .timeout(Duration::from_secs(60))
            .cache_inputs(DEP_MANIFESTS),
        HookDefinition::new(
            "pytest",
            strings(&["pytest", "--tb=short", "-q"]),
            Stage::Comprehensive,
            "pytest",
        )
        .timeout(Duration::from_secs(600)),
    ]
}

/// Apply per-hook timeout overrides from configuration.
pub fn apply_timeout_overrides(defs: &mut [HookDefinition], overrides: &HashMap<String, u64>) {
    for def in defs {
        if let Some(&secs) = overrides.get(&def.name) {
            def.timeout = Duration::from_secs(secs);
        }
    }
}
