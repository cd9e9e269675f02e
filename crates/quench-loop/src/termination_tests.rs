//! Property tests: the loop terminates within `max_iterations` for every
//! agent behavior, and steady progress never reads as convergence.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use quench_core::{CoordinatorResult, RunStatus, StageSummary};

use super::*;

struct ConstantRunner {
    issue_count: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl StageRunner for ConstantRunner {
    async fn run_stage(&self, _stage: Stage) -> anyhow::Result<StageResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let issues = (0..self.issue_count)
            .map(|i| {
                quench_core::Issue::new(
                    "stub-tool",
                    quench_core::IssueKind::Other,
                    quench_core::Severity::Low,
                    None,
                    Some(i as u32 + 1),
                    None,
                    None,
                    "synthetic finding",
                )
            })
            .collect();
        Ok(StageResult {
            hook_results: Vec::new(),
            issues,
            summary: StageSummary::default(),
        })
    }
}

/// Applies a scripted number of fixes per call, cycling through the script.
struct CyclingDispatcher {
    script: Vec<usize>,
    cursor: Mutex<usize>,
}

#[async_trait]
impl FixDispatcher for CyclingDispatcher {
    async fn dispatch(&self, issues: Vec<Issue>) -> CoordinatorResult {
        let mut cursor = self.cursor.lock().unwrap();
        let fixes = self.script[*cursor % self.script.len()].min(issues.len());
        *cursor += 1;
        CoordinatorResult {
            fixes_applied: fixes,
            results: Vec::new(),
            unhandled: Vec::new(),
        }
    }
}

fn run_loop(
    issue_count: usize,
    script: Vec<usize>,
    max_iterations: u32,
    convergence_threshold: u32,
) -> (RunReport, usize) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("test runtime");
    let runner = Arc::new(ConstantRunner {
        issue_count,
        calls: AtomicUsize::new(0),
    });
    let dispatcher = Arc::new(CyclingDispatcher {
        script,
        cursor: Mutex::new(0),
    });
    let config = LoopConfig {
        max_iterations,
        convergence_threshold,
        ai_fix_enabled: true,
    };
    let autofix = AutofixLoop::new(runner.clone(), dispatcher, config);
    let report = runtime.block_on(autofix.run()).expect("loop run");
    (report, runner.calls.load(Ordering::SeqCst))
}

proptest! {
    #[test]
    fn loop_terminates_within_budget(
        issue_count in 1usize..50,
        script in proptest::collection::vec(0usize..6, 1..32),
        max_iterations in 1u32..25,
        convergence_threshold in 1u32..8,
    ) {
        let (report, hook_runs) = run_loop(issue_count, script, max_iterations, convergence_threshold);
        prop_assert!(report.iterations <= max_iterations);
        prop_assert_eq!(hook_runs as u32, report.iterations);
        prop_assert!(matches!(report.status, RunStatus::Converged | RunStatus::Exhausted));
    }

    #[test]
    fn steady_progress_never_converges(
        issue_count in 1usize..50,
        fixes in 1usize..6,
        max_iterations in 1u32..25,
    ) {
        // Every iteration applies at least one fix: the no-progress counter
        // resets each time, so the loop can only exhaust its budget.
        let (report, _) = run_loop(issue_count, vec![fixes], max_iterations, 5);
        prop_assert_eq!(report.status, RunStatus::Exhausted);
        prop_assert_eq!(report.iterations, max_iterations);
    }

    #[test]
    fn zero_fixes_converges_at_threshold(
        issue_count in 1usize..50,
        convergence_threshold in 1u32..8,
    ) {
        let (report, _) = run_loop(issue_count, vec![0], 100, convergence_threshold);
        prop_assert_eq!(report.status, RunStatus::Converged);
        prop_assert_eq!(report.iterations, convergence_threshold);
    }
}
