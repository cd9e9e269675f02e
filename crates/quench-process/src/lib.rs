//! Subprocess execution for quality hooks: piped spawn, bounded capture,
//! hard timeouts, and CPU-sampled hang detection.
//!
//! Commands are argv lists executed directly, never through a shell. Each
//! child runs in its own process group so kill signals reach the whole tool
//! tree: timeouts, hangs, and cancellation all terminate through the same
//! SIGTERM-grace-SIGKILL group-kill sequence, and `kill_on_drop` acts only
//! as a last-resort safety net. No subprocess outlives the [`Execution`]
//! that describes it.

pub mod liveness;

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use quench_core::HookDefinition;

use crate::liveness::{HangMonitor, LivenessPolicy, Verdict};

/// Per-stream capture bound. Excess output is dropped with a marker appended.
pub const MAX_CAPTURE_BYTES: usize = 16 * 1024 * 1024;
const TRUNCATION_MARKER: &str = "\n[output truncated at 16 MiB]\n";
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const TERM_GRACE: Duration = Duration::from_secs(5);
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);
const READ_BUF_SIZE: usize = 8192;

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own.
    Completed,
    /// Killed after exceeding the hard wall-clock timeout.
    TimedOut,
    /// Killed after the hang predicate fired (idle CPU past the floor).
    Hung,
    /// Killed because the caller's cancellation token fired (stage budget
    /// expiry or external cancellation).
    Cancelled,
}

/// Raw outcome of running one tool subprocess.
#[derive(Debug, Clone)]
pub struct Execution {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub termination: Termination,
}

/// Run a hook's command in the given workspace.
///
/// Environment is the parent's plus the definition's explicit additions.
/// Callers guarantee at most one invocation per (hook, workspace) at a time.
/// When `cancel` fires mid-run, the child's process group is killed exactly
/// as on a timeout and the execution reports [`Termination::Cancelled`].
pub async fn run_hook(
    def: &HookDefinition,
    workspace: &Path,
    cancel: CancellationToken,
) -> Result<Execution> {
    let (program, args) = def
        .command
        .split_first()
        .with_context(|| format!("hook '{}' has an empty command", def.name))?;
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(workspace);
    for (key, value) in &def.env {
        cmd.env(key, value);
    }
    execute(cmd, LivenessPolicy::for_timeout(def.timeout), cancel).await
}

/// Run an arbitrary argv in `cwd` under the same spawn/capture/kill path.
/// Used by tool-backed agents for their fixer invocations.
pub async fn run_command(argv: &[String], cwd: &Path, timeout: Duration) -> Result<Execution> {
    let (program, args) = argv.split_first().context("command is empty")?;
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(cwd);
    execute(cmd, LivenessPolicy::for_timeout(timeout), CancellationToken::new()).await
}

/// Check whether an executable resolves on PATH.
pub fn tool_installed(executable: &str) -> bool {
    which::which(executable).is_ok()
}

async fn execute(
    mut cmd: Command,
    policy: LivenessPolicy,
    cancel: CancellationToken,
) -> Result<Execution> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    // Isolate the child in its own process group so group signals reach the
    // whole tool tree.
    // SAFETY: setsid() is async-signal-safe and runs before exec.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = cmd.spawn().context("Failed to spawn hook command")?;
    let started = Instant::now();
    let mut monitor = child.id().map(|pid| HangMonitor::new(policy, pid));

    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let stderr = child.stderr.take().context("Failed to capture stderr")?;
    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_reader = BufReader::new(stderr);

    let mut out = Capture::new(MAX_CAPTURE_BYTES);
    let mut err = Capture::new(MAX_CAPTURE_BYTES);
    let mut stdout_done = false;
    let mut stderr_done = false;
    let mut termination = Termination::Completed;
    let mut stdout_buf = [0u8; READ_BUF_SIZE];
    let mut stderr_buf = [0u8; READ_BUF_SIZE];

    while !stdout_done || !stderr_done {
        tokio::select! {
            result = stdout_reader.read(&mut stdout_buf), if !stdout_done => {
                match result {
                    Ok(0) | Err(_) => stdout_done = true,
                    Ok(n) => out.push(&stdout_buf[..n]),
                }
            }
            result = stderr_reader.read(&mut stderr_buf), if !stderr_done => {
                match result {
                    Ok(0) | Err(_) => stderr_done = true,
                    Ok(n) => err.push(&stderr_buf[..n]),
                }
            }
            _ = cancel.cancelled() => {
                warn!(
                    elapsed_secs = started.elapsed().as_secs(),
                    "Killing hook process on cancellation"
                );
                termination = Termination::Cancelled;
                break;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                match monitor.as_mut().map_or(Verdict::Continue, HangMonitor::poll) {
                    Verdict::Continue => {}
                    Verdict::Hung => {
                        warn!(elapsed_secs = started.elapsed().as_secs(), "Killing hung hook process");
                        termination = Termination::Hung;
                        break;
                    }
                    Verdict::TimedOut => {
                        warn!(
                            timeout_secs = policy.timeout.as_secs(),
                            "Killing hook process on hard timeout"
                        );
                        termination = Termination::TimedOut;
                        break;
                    }
                }
            }
        }
    }

    if termination != Termination::Completed {
        terminate_group(&mut child).await;
        drain(&mut stdout_reader, &mut out, stdout_done).await;
        drain(&mut stderr_reader, &mut err, stderr_done).await;
    }

    let status = child.wait().await.context("Failed to wait for hook command")?;
    let exit_code = status.code();
    if exit_code.is_none() {
        debug!("hook process terminated by signal");
    }

    Ok(Execution {
        stdout: out.finish(),
        stderr: err.finish(),
        exit_code,
        duration: started.elapsed(),
        termination,
    })
}

/// SIGTERM the child's process group, allow a short grace, then SIGKILL.
async fn terminate_group(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: kill() is async-signal-safe; negative PID targets the
        // process group created by setsid() in pre_exec.
        unsafe {
            libc::kill(-(pid as i32), libc::SIGTERM);
        }
        if tokio::time::timeout(TERM_GRACE, child.wait()).await.is_ok() {
            return;
        }
        // SAFETY: as above.
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
        return;
    }

    let _ = child.start_kill();
}

/// Read whatever remains in a pipe after a kill, bounded per read so a
/// wedged descriptor cannot stall the result.
async fn drain<R: AsyncRead + Unpin>(reader: &mut R, capture: &mut Capture, done: bool) {
    if done {
        return;
    }
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match tokio::time::timeout(DRAIN_TIMEOUT, reader.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => capture.push(&buf[..n]),
            _ => break,
        }
    }
}

/// Accumulates lossy UTF-8 output up to a byte cap; excess is dropped and
/// the finished string carries a truncation marker.
struct Capture {
    buf: String,
    cap: usize,
    truncated: bool,
}

impl Capture {
    fn new(cap: usize) -> Self {
        Self {
            buf: String::new(),
            cap,
            truncated: false,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        if self.truncated {
            return;
        }
        let chunk = String::from_utf8_lossy(bytes);
        let remaining = self.cap - self.buf.len();
        if chunk.len() <= remaining {
            self.buf.push_str(&chunk);
        } else {
            let mut take = remaining;
            while take > 0 && !chunk.is_char_boundary(take) {
                take -= 1;
            }
            self.buf.push_str(&chunk[..take]);
            self.truncated = true;
        }
    }

    fn finish(mut self) -> String {
        if self.truncated {
            self.buf.push_str(TRUNCATION_MARKER);
        }
        self.buf
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
