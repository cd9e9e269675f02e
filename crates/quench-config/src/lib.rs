//! Configuration loading (`quench.toml`) and validation.
//!
//! Validation collects every violation before failing, so the user sees the
//! full list of offending fields at once rather than fixing them one at a
//! time. Configuration errors are fatal: the engine refuses to start.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quench_core::{IssueKind, QuenchError};

fn default_max_iterations() -> u32 {
    20
}
fn default_convergence_threshold() -> u32 {
    5
}
fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
fn default_cache_ttl_seconds() -> u64 {
    3600
}
fn default_cache_max_entries() -> usize {
    1000
}
fn default_agent_concurrency() -> usize {
    10
}
fn default_batch_size() -> usize {
    10
}
fn default_true() -> bool {
    true
}
fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuenchConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    #[serde(default = "default_agent_concurrency")]
    pub agent_concurrency: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub ai_fix_enabled: bool,
    /// Optional stage-wide wall-clock budget in seconds.
    #[serde(default)]
    pub stage_budget_seconds: Option<u64>,
    /// Per-hook timeout overrides in seconds.
    #[serde(default)]
    pub hook_timeouts: HashMap<String, u64>,
    /// Per-kind routing confidence floors, each in `[0, 1]`.
    #[serde(default)]
    pub min_agent_confidence: HashMap<IssueKind, f64>,
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
}

impl Default for QuenchConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            parallelism: default_parallelism(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_max_entries: default_cache_max_entries(),
            agent_concurrency: default_agent_concurrency(),
            batch_size: default_batch_size(),
            ai_fix_enabled: true,
            stage_budget_seconds: None,
            hook_timeouts: HashMap::new(),
            min_agent_confidence: HashMap::new(),
            workspace_root: default_workspace_root(),
        }
    }
}

impl QuenchConfig {
    /// Load from a TOML file. Absent fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Validate every field, collecting all violations. `known_hooks` is the
    /// catalog's hook name set, used to flag stale `hook_timeouts` keys; an
    /// empty slice skips that check.
    pub fn validate(&self, known_hooks: &[String]) -> Result<(), QuenchError> {
        let mut errors = Vec::new();

        if self.max_iterations == 0 {
            errors.push("max_iterations must be > 0 (got 0)".to_string());
        }
        if self.convergence_threshold == 0 {
            errors.push("convergence_threshold must be > 0 (got 0)".to_string());
        }
        if self.parallelism == 0 {
            errors.push("parallelism must be > 0 (got 0)".to_string());
        }
        if self.cache_max_entries == 0 {
            errors.push("cache_max_entries must be > 0 (got 0)".to_string());
        }
        if self.agent_concurrency == 0 {
            errors.push("agent_concurrency must be > 0 (got 0)".to_string());
        }
        if self.batch_size == 0 {
            errors.push("batch_size must be > 0 (got 0)".to_string());
        }
        if self.stage_budget_seconds == Some(0) {
            errors.push("stage_budget_seconds must be > 0 when set".to_string());
        }
        for (hook, seconds) in &self.hook_timeouts {
            if *seconds == 0 {
                errors.push(format!("hook_timeouts.{hook} must be > 0 (got 0)"));
            }
            if !known_hooks.is_empty() && !known_hooks.iter().any(|known| known == hook) {
                errors.push(format!("hook_timeouts.{hook} does not match any known hook"));
            }
        }
        for (kind, confidence) in &self.min_agent_confidence {
            if !(0.0..=1.0).contains(confidence) {
                errors.push(format!(
                    "min_agent_confidence.{kind} must be within [0, 1] (got {confidence})"
                ));
            }
        }

        if !errors.is_empty() {
            errors.sort();
            return Err(QuenchError::InvalidConfig { errors });
        }
        if !self.workspace_root.is_dir() {
            return Err(QuenchError::WorkspaceInaccessible {
                path: self.workspace_root.clone(),
            });
        }
        Ok(())
    }
}
