/// Process Runner - One External Process, One Deadline
///
/// **Core Responsibility:**
/// Spawn a single process, feed it stdin, collect stdout/stderr as they
/// arrive, and stop it when the deadline fires.
///
/// **Termination:**
/// Exactly one of these ends a run, whichever happens first:
/// - spawn failure (reported in `spawn_error`, never raised)
/// - natural exit (exit code and signal recorded)
/// - deadline (process group SIGKILLed and reaped, partial output kept)
///
/// **Descendants:**
/// On unix each child leads its own process group. The whole group is killed
/// on the deadline and again once the child exits; pipes are then drained for
/// at most `DRAIN_GRACE`.
///
/// Used identically by the compile and execute phases.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// How long pipes are drained after the child exits
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Normalized result of running one external process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub spawn_error: Option<String>,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

impl ProcessOutcome {
    fn spawn_failed(error: String, elapsed: Duration) -> Self {
        Self {
            spawn_error: Some(error),
            elapsed_ms: elapsed.as_millis() as u64,
            ..Default::default()
        }
    }

    /// Exited on its own with status 0
    pub fn success(&self) -> bool {
        self.spawn_error.is_none() && !self.timed_out && self.exit_code == Some(0)
    }

    /// Human-readable name of the terminating signal, e.g. `SIGSEGV`
    pub fn signal_name(&self) -> Option<String> {
        let signal = self.signal?;

        #[cfg(unix)]
        if let Ok(sig) = nix::sys::signal::Signal::try_from(signal) {
            return Some(sig.as_str().to_string());
        }

        Some(format!("signal {}", signal))
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> ProcessOutcome;
}

/// Runs processes directly on the host
#[derive(Debug, Clone, Default)]
pub struct LocalProcessRunner {
    current_dir: Option<PathBuf>,
}

impl LocalProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Working directory for spawned processes
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl ProcessRunner for LocalProcessRunner {
    #[tracing::instrument(skip(self, args, stdin), fields(timeout_ms = timeout.as_millis() as u64))]
    async fn run(
        &self,
        command: &str,
        args: &[String],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> ProcessOutcome {
        let start = Instant::now();

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = command, error = %e, "Failed to spawn process");
                return ProcessOutcome::spawn_failed(e.to_string(), start.elapsed());
            }
        };
        let pgid = child.id();

        // Feed stdin on its own task so a child that writes before reading
        // cannot deadlock against us. Dropping the pipe closes it.
        let writer = child.stdin.take().map(|mut pipe| {
            let input = stdin.map(str::to_owned);
            tokio::spawn(async move {
                if let Some(input) = input {
                    let _ = pipe.write_all(input.as_bytes()).await;
                }
                let _ = pipe.shutdown().await;
            })
        });

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut out_chunk = vec![0u8; READ_CHUNK_BYTES];
        let mut err_chunk = vec![0u8; READ_CHUNK_BYTES];

        let mut status: Option<ExitStatus> = None;
        let mut exited = false;
        let mut timed_out = false;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        while !(exited && stdout_pipe.is_none() && stderr_pipe.is_none()) {
            tokio::select! {
                read = read_chunk(&mut stdout_pipe, &mut out_chunk), if stdout_pipe.is_some() => {
                    match read {
                        Ok(0) | Err(_) => stdout_pipe = None,
                        Ok(n) => stdout.extend_from_slice(&out_chunk[..n]),
                    }
                }
                read = read_chunk(&mut stderr_pipe, &mut err_chunk), if stderr_pipe.is_some() => {
                    match read {
                        Ok(0) | Err(_) => stderr_pipe = None,
                        Ok(n) => stderr.extend_from_slice(&err_chunk[..n]),
                    }
                }
                waited = child.wait(), if !exited => {
                    exited = true;
                    match waited {
                        Ok(s) => status = Some(s),
                        Err(e) => warn!(command = command, error = %e, "Failed to wait for process"),
                    }
                    // Leftover descendants die with the group; what they already
                    // wrote stays buffered in the pipes
                    kill_process_group(pgid);
                    let drain_until = tokio::time::Instant::now() + DRAIN_GRACE;
                    if drain_until < deadline.deadline() {
                        deadline.as_mut().reset(drain_until);
                    }
                }
                _ = &mut deadline => {
                    if !exited {
                        timed_out = true;
                        // Best-effort: the process may have exited in the meantime
                        kill_process_group(pgid);
                        let _ = child.start_kill();
                        if let Ok(s) = child.wait().await {
                            status = Some(s);
                        }
                    }
                    break;
                }
            }
        }

        if let Some(writer) = writer {
            writer.abort();
        }

        let outcome = ProcessOutcome {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: status.and_then(|s| s.code()),
            signal: status.and_then(exit_signal),
            spawn_error: None,
            timed_out,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        if timed_out {
            warn!(
                command = command,
                elapsed_ms = outcome.elapsed_ms,
                stdout_bytes = stdout.len(),
                "Process killed after deadline"
            );
        } else {
            debug!(
                command = command,
                elapsed_ms = outcome.elapsed_ms,
                exit_code = ?outcome.exit_code,
                signal = ?outcome.signal,
                "Process finished"
            );
        }

        outcome
    }
}

/// Read from a pipe that may already be closed; a closed pipe never resolves
async fn read_chunk<R>(pipe: &mut Option<R>, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match pipe {
        Some(pipe) => pipe.read(buf).await,
        None => std::future::pending().await,
    }
}

/// SIGKILL every process in the child's group; failures are ignored
#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pgid) = pgid.and_then(|id| i32::try_from(id).ok()) {
        let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}
