//! Confidence-based issue routing.

use std::collections::HashMap;
use std::sync::Arc;

use quench_core::{Issue, IssueKind};

use crate::agent::{Agent, AgentRegistry};

/// Default confidence floor for routine issue kinds.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;
/// Floor for risky kinds, where a wrong fix costs more than no fix.
pub const RISKY_MIN_CONFIDENCE: f64 = 0.7;

/// Per-kind confidence floors with configurable overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfidenceThresholds {
    overrides: HashMap<IssueKind, f64>,
}

impl ConfidenceThresholds {
    pub fn new(overrides: HashMap<IssueKind, f64>) -> Self {
        Self { overrides }
    }

    pub fn floor(&self, kind: IssueKind) -> f64 {
        self.overrides.get(&kind).copied().unwrap_or(if kind.is_risky() {
            RISKY_MIN_CONFIDENCE
        } else {
            DEFAULT_MIN_CONFIDENCE
        })
    }
}

/// Select the single best agent for an issue.
///
/// Highest confidence at or above the kind's floor wins; on a tie a
/// specialist beats a generalist; a remaining tie goes to the earliest
/// registered agent. `None` means the issue is unhandled — callers must
/// surface it, never drop it.
pub fn route(
    registry: &AgentRegistry,
    thresholds: &ConfidenceThresholds,
    issue: &Issue,
) -> Option<(Arc<dyn Agent>, f64)> {
    let floor = thresholds.floor(issue.kind);
    let mut best: Option<(Arc<dyn Agent>, f64)> = None;
    for agent in registry.agents() {
        let confidence = agent.can_handle(issue).clamp(0.0, 1.0);
        if confidence < floor {
            continue;
        }
        let wins = match &best {
            None => true,
            Some((current, best_confidence)) => {
                confidence > *best_confidence
                    || (confidence == *best_confidence
                        && current.generalist()
                        && !agent.generalist())
            }
        };
        if wins {
            best = Some((agent.clone(), confidence));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use quench_core::Severity;

    struct Fixed {
        name: &'static str,
        confidence: f64,
        generalist: bool,
    }

    #[async_trait::async_trait]
    impl Agent for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn generalist(&self) -> bool {
            self.generalist
        }
        fn can_handle(&self, _issue: &Issue) -> f64 {
            self.confidence
        }
        async fn apply(
            &self,
            _issue: &Issue,
            _ctx: &crate::agent::AgentContext,
        ) -> anyhow::Result<quench_core::FixResult> {
            Ok(quench_core::FixResult::failed(self.name))
        }
    }

    fn registry(agents: Vec<Fixed>) -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            registry.register(Arc::new(agent));
        }
        registry
    }

    fn issue(kind: IssueKind) -> Issue {
        Issue::new("t", kind, Severity::Medium, None, None, None, None, "m")
    }

    #[test]
    fn test_highest_confidence_wins() {
        let registry = registry(vec![
            Fixed { name: "low", confidence: 0.6, generalist: false },
            Fixed { name: "high", confidence: 0.9, generalist: false },
        ]);
        let (agent, confidence) = route(
            &registry,
            &ConfidenceThresholds::default(),
            &issue(IssueKind::FormatError),
        )
        .unwrap();
        assert_eq!(agent.name(), "high");
        assert_eq!(confidence, 0.9);
    }

    #[test]
    fn test_specialist_beats_generalist_on_tie() {
        let registry = registry(vec![
            Fixed { name: "general", confidence: 0.8, generalist: true },
            Fixed { name: "special", confidence: 0.8, generalist: false },
        ]);
        let (agent, _) = route(
            &registry,
            &ConfidenceThresholds::default(),
            &issue(IssueKind::TypeError),
        )
        .unwrap();
        assert_eq!(agent.name(), "special");
    }

    #[test]
    fn test_registration_order_breaks_remaining_ties() {
        let registry = registry(vec![
            Fixed { name: "first", confidence: 0.8, generalist: false },
            Fixed { name: "second", confidence: 0.8, generalist: false },
        ]);
        let (agent, _) = route(
            &registry,
            &ConfidenceThresholds::default(),
            &issue(IssueKind::TypeError),
        )
        .unwrap();
        assert_eq!(agent.name(), "first");
    }

    #[test]
    fn test_below_floor_is_unhandled() {
        let registry = registry(vec![Fixed {
            name: "weak",
            confidence: 0.4,
            generalist: false,
        }]);
        assert!(route(
            &registry,
            &ConfidenceThresholds::default(),
            &issue(IssueKind::FormatError)
        )
        .is_none());
    }

    #[test]
    fn test_risky_kinds_demand_higher_floor() {
        let registry = registry(vec![Fixed {
            name: "mid",
            confidence: 0.6,
            generalist: false,
        }]);
        let thresholds = ConfidenceThresholds::default();
        // 0.6 clears the routine floor but not the risky one.
        assert!(route(&registry, &thresholds, &issue(IssueKind::FormatError)).is_some());
        assert!(route(&registry, &thresholds, &issue(IssueKind::SecurityVuln)).is_none());
    }

    #[test]
    fn test_per_kind_override() {
        let registry = registry(vec![Fixed {
            name: "mid",
            confidence: 0.6,
            generalist: false,
        }]);
        let thresholds =
            ConfidenceThresholds::new(HashMap::from([(IssueKind::SecurityVuln, 0.5)]));
        assert!(route(&registry, &thresholds, &issue(IssueKind::SecurityVuln)).is_some());
    }

    #[test]
    fn test_out_of_range_confidence_is_clamped() {
        let registry = registry(vec![Fixed {
            name: "wild",
            confidence: 7.0,
            generalist: false,
        }]);
        let (_, confidence) = route(
            &registry,
            &ConfidenceThresholds::default(),
            &issue(IssueKind::FormatError),
        )
        .unwrap();
        assert_eq!(confidence, 1.0);
    }
}
