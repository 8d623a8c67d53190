//! Process supervision.
//!
//! Provides [`execute`], the single execution primitive behind both script
//! and inline-code invocations. It spawns the interpreter, drains stdout and
//! stderr in two spawned tasks while racing process exit against the
//! timeout, kills the child on expiry, and always reaps it before returning.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::outcome::{CapturedOutput, ExecutionOutcome};
use super::resolver::{is_file, ResolvedTarget};

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Bytes past the limit are still read from the pipe, then discarded, so a
/// verbose child never blocks on a full pipe.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// How long the drain tasks may keep running once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Upper bound on waiting for a killed child to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// A fully-built interpreter invocation.
#[derive(Debug, Clone)]
pub struct ExecutionCommand {
    /// Interpreter executable.
    pub program: PathBuf,
    /// Arguments passed to the interpreter.
    pub args: Vec<OsString>,
    /// Working directory for the child (inherits ours if `None`).
    pub working_directory: Option<PathBuf>,
    /// Script file that must exist before the interpreter is spawned.
    pub script: Option<PathBuf>,
}

impl ExecutionCommand {
    /// `<program> <script> args...`
    pub fn script(program: impl Into<PathBuf>, target: &ResolvedTarget, args: &[String]) -> Self {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(target.path.clone().into_os_string());
        argv.extend(args.iter().map(OsString::from));
        Self {
            program: program.into(),
            args: argv,
            working_directory: None,
            script: Some(target.path.clone()),
        }
    }

    /// `<program> -c <code> args...`
    pub fn inline(program: impl Into<PathBuf>, code: &str, args: &[String]) -> Self {
        let mut argv = Vec::with_capacity(args.len() + 2);
        argv.push(OsString::from("-c"));
        argv.push(OsString::from(code));
        argv.extend(args.iter().map(OsString::from));
        Self {
            program: program.into(),
            args: argv,
            working_directory: None,
            script: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }
}

/// Run `command` to completion or until `timeout` elapses.
///
/// Never fails: every way the invocation can end is an [`ExecutionOutcome`].
/// The child is reaped on every path that spawned it.
pub async fn execute(command: &ExecutionCommand, timeout: Duration) -> ExecutionOutcome {
    if let Some(script) = &command.script {
        if !is_file(script).await {
            tracing::warn!(script = %script.display(), "Script not found");
            return ExecutionOutcome::spawn_failed(format!(
                "script not found: {}",
                script.display()
            ));
        }
    }

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Backstop for any path that drops the child without reaping it.
        .kill_on_drop(true);

    // Own process group, so a timeout kill also reaches grandchildren.
    #[cfg(unix)]
    cmd.process_group(0);

    if let Some(dir) = &command.working_directory {
        cmd.current_dir(dir);
    }

    let start = Instant::now();

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(
                program = %command.program.display(),
                error = %e,
                "Failed to spawn interpreter",
            );
            return ExecutionOutcome::spawn_failed(format!(
                "failed to spawn {}: {e}",
                command.program.display()
            ));
        }
    };
    let pid = child.id();
    tracing::debug!(pid = ?pid, "Interpreter spawned");

    // Nothing is ever written to the child; close stdin right away.
    drop(child.stdin.take());

    let stdout = StreamBuffer::default();
    let stderr = StreamBuffer::default();
    let stdout_task = tokio::spawn(drain(child.stdout.take(), stdout.clone(), "stdout"));
    let stderr_task = tokio::spawn(drain(child.stderr.take(), stderr.clone(), "stderr"));

    // `timeout` polls `wait()` before its deadline, so a child that has
    // already exited wins a tie with the timer.
    let waited = tokio::time::timeout(timeout, child.wait()).await;

    let status = match waited {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            tracing::warn!(pid = ?pid, error = %e, "Failed to wait for interpreter");
            terminate(&mut child, pid).await;
            abort_drains(stdout_task, stderr_task, DRAIN_GRACE).await;
            return ExecutionOutcome::spawn_failed(format!("failed to wait for process: {e}"));
        }
        Err(_elapsed) => match exited_at_deadline(&mut child) {
            Some(status) => status,
            None => {
                terminate(&mut child, pid).await;
                abort_drains(stdout_task, stderr_task, DRAIN_GRACE).await;
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::warn!(
                    pid = ?pid,
                    timeout_ms = timeout.as_millis() as u64,
                    elapsed_ms,
                    "Interpreter timed out and was killed",
                );
                return ExecutionOutcome::TimedOut {
                    partial: capture(&stdout, &stderr),
                };
            }
        },
    };

    // The child is gone; its pipes close unless a grandchild still holds
    // them. Give the drains whatever budget is left, at least the grace.
    let remaining = timeout.saturating_sub(start.elapsed()).max(DRAIN_GRACE);
    if !join_drains(stdout_task, stderr_task, remaining).await {
        tracing::warn!(pid = ?pid, "Output pipes still open after exit; killing process group");
        kill_process_group(pid);
    }

    let output = capture(&stdout, &stderr);
    let exit_code = status.code().unwrap_or(-1);
    tracing::debug!(
        pid = ?pid,
        exit_code,
        elapsed_ms = start.elapsed().as_millis() as u64,
        stdout_bytes = output.stdout.len(),
        stderr_bytes = output.stderr.len(),
        "Interpreter exited",
    );

    ExecutionOutcome::Completed { exit_code, output }
}

/// Exit status of a child that finished by the time the deadline fired.
///
/// A child that exited at the deadline counts as completed, not timed out.
fn exited_at_deadline(child: &mut Child) -> Option<ExitStatus> {
    match child.try_wait() {
        Ok(status) => status,
        Err(e) => {
            tracing::debug!(pid = ?child.id(), error = %e, "Failed to poll interpreter status");
            None
        }
    }
}

/// Accumulates one stream's bytes as they arrive.
///
/// Shared between the drain task and [`execute`] so that partial output is
/// still readable if the drain is aborted.
#[derive(Debug, Clone, Default)]
struct StreamBuffer(Arc<Mutex<Vec<u8>>>);

impl StreamBuffer {
    /// Append up to the capture cap. Returns `false` if bytes were dropped.
    fn append(&self, chunk: &[u8]) -> bool {
        let mut buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let room = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
        let keep = room.min(chunk.len());
        buf.extend_from_slice(&chunk[..keep]);
        keep == chunk.len()
    }

    fn to_text(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn capture(stdout: &StreamBuffer, stderr: &StreamBuffer) -> CapturedOutput {
    CapturedOutput {
        stdout: stdout.to_text(),
        stderr: stderr.to_text(),
    }
}

/// Read `stream` until EOF, appending each chunk to `buffer` in arrival order.
async fn drain<R: AsyncRead + Unpin>(stream: Option<R>, buffer: StreamBuffer, name: &'static str) {
    let Some(mut stream) = stream else {
        return;
    };
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    let mut truncated = false;
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if !buffer.append(&chunk[..n]) && !truncated {
                    truncated = true;
                    tracing::warn!(
                        stream = name,
                        limit_bytes = MAX_OUTPUT_BYTES,
                        "Output exceeds capture limit; discarding the rest",
                    );
                }
            }
            Err(e) => {
                tracing::debug!(stream = name, error = %e, "Output stream read failed");
                break;
            }
        }
    }
}

/// Wait up to `limit` for both drains to hit EOF. Aborts them and returns
/// `false` if they did not.
async fn join_drains(
    mut stdout_task: JoinHandle<()>,
    mut stderr_task: JoinHandle<()>,
    limit: Duration,
) -> bool {
    let joined = tokio::time::timeout(limit, async {
        let _ = tokio::join!(&mut stdout_task, &mut stderr_task);
    })
    .await;

    if joined.is_err() {
        stdout_task.abort();
        stderr_task.abort();
        return false;
    }
    true
}

async fn abort_drains(stdout_task: JoinHandle<()>, stderr_task: JoinHandle<()>, grace: Duration) {
    if !join_drains(stdout_task, stderr_task, grace).await {
        tracing::debug!("Drain tasks aborted after kill");
    }
}

/// SIGKILL the child's process group and the child itself, then reap it.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_process_group(pid);

    if let Err(e) = child.start_kill() {
        tracing::debug!(pid = ?pid, error = %e, "Kill signal not delivered");
    }

    match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
        Ok(Ok(_status)) => {}
        Ok(Err(e)) => {
            tracing::warn!(pid = ?pid, error = %e, "Failed to reap killed interpreter");
        }
        Err(_) => {
            tracing::warn!(pid = ?pid, "Timed out waiting for killed interpreter to exit");
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // Safety: kill(2) takes plain integers; a negative pid addresses the
    // group the child leads (see `process_group(0)` above).
    let ret = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if ret != 0 {
        tracing::debug!(
            pgid,
            error = %std::io::Error::last_os_error(),
            "Process group already gone",
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
