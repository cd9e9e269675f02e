//! Hang detection for hook subprocesses.
//!
//! A hook is declared hung only when BOTH hold: its CPU usage is near zero
//! and it has been running past a minimum wall-clock floor. Elapsed time
//! alone is never sufficient, so long-running busy tools (a type checker
//! chewing on a large codebase) are never mislabeled.

use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Wall-clock grace before any CPU sampling starts. Short-lived tools exit
/// before this window closes and are never sampled at all.
pub const HANG_GRACE: Duration = Duration::from_secs(60);
/// Interval between CPU samples once the grace window has elapsed.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(15);
/// CPU percentage below which a process counts as idle.
pub const IDLE_CPU_PERCENT: f32 = 1.0;
/// Upper bound on the hang wall-clock floor.
const HANG_FLOOR_CAP: Duration = Duration::from_secs(180);

/// Decision thresholds for one hook execution.
#[derive(Debug, Clone, Copy)]
pub struct LivenessPolicy {
    /// Hard wall-clock timeout for the hook.
    pub timeout: Duration,
    /// No CPU sampling before this much wall-clock has elapsed.
    pub hang_grace: Duration,
    /// Minimum interval between CPU samples.
    pub sample_interval: Duration,
    /// CPU below this percentage counts as idle.
    pub idle_cpu_percent: f32,
    /// Hang requires wall-clock beyond this floor: min(180s, timeout/2).
    pub hang_floor: Duration,
}

impl LivenessPolicy {
    pub fn for_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            hang_grace: HANG_GRACE,
            sample_interval: SAMPLE_INTERVAL,
            idle_cpu_percent: IDLE_CPU_PERCENT,
            hang_floor: (timeout / 2).min(HANG_FLOOR_CAP),
        }
    }
}

/// Verdict for one liveness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    /// CPU idle past the hang floor: kill and report `HungKilled`.
    Hung,
    /// Hard timeout exceeded: kill and report `Timeout`.
    TimedOut,
}

/// Pure liveness decision.
///
/// `cpu_percent` is the most recent CPU sample, or `None` when no trustworthy
/// sample exists yet (inside the grace window, or only the priming sample has
/// been taken). Hang takes precedence over timeout when both conditions hold,
/// since its diagnosis is the more informative one.
pub fn judge(policy: &LivenessPolicy, elapsed: Duration, cpu_percent: Option<f32>) -> Verdict {
    if let Some(cpu) = cpu_percent
        && elapsed > policy.hang_grace
        && cpu < policy.idle_cpu_percent
        && elapsed > policy.hang_floor
    {
        return Verdict::Hung;
    }
    if elapsed > policy.timeout {
        return Verdict::TimedOut;
    }
    Verdict::Continue
}

/// Samples one process's CPU usage via sysinfo.
///
/// `cpu_usage` is measured between consecutive refreshes, so the first
/// refresh only primes the counter; callers must discard it.
pub struct CpuSampler {
    sys: System,
    pid: Pid,
}

impl CpuSampler {
    pub fn new(pid: u32) -> Self {
        Self {
            sys: System::new(),
            pid: Pid::from_u32(pid),
        }
    }

    /// Refresh and return the process's CPU percentage since the previous
    /// sample, or `None` once the process has exited.
    pub fn sample(&mut self) -> Option<f32> {
        self.sys
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        self.sys.process(self.pid).map(|p| p.cpu_usage())
    }
}

/// Stateful monitor driving the sampling cadence for one child process.
pub struct HangMonitor {
    policy: LivenessPolicy,
    sampler: CpuSampler,
    started: Instant,
    last_sample_at: Option<Instant>,
    last_cpu: Option<f32>,
}

impl HangMonitor {
    pub fn new(policy: LivenessPolicy, pid: u32) -> Self {
        Self {
            policy,
            sampler: CpuSampler::new(pid),
            started: Instant::now(),
            last_sample_at: None,
            last_cpu: None,
        }
    }

    /// Poll once: take a CPU sample when due, then judge.
    pub fn poll(&mut self) -> Verdict {
        let elapsed = self.started.elapsed();
        if elapsed > self.policy.hang_grace {
            let due = self
                .last_sample_at
                .is_none_or(|at| at.elapsed() >= self.policy.sample_interval);
            if due {
                let primed = self.last_sample_at.is_some();
                let sample = self.sampler.sample();
                self.last_sample_at = Some(Instant::now());
                // The priming refresh reports 0% regardless of real usage;
                // only the second and later samples are trustworthy.
                self.last_cpu = if primed { sample } else { None };
            }
        }
        judge(&self.policy, elapsed, self.last_cpu)
    }
}
