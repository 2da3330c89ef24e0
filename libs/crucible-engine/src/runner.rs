/// Process Runner - one OS process per invocation
///
/// **Contract:**
/// - stdin is written in full and then closed so the child sees EOF
/// - stdout/stderr are drained concurrently with the wait (no pipe deadlock)
/// - the stdin write, the output reads and the wait share one timeout
/// - on timeout the child is killed (best effort) and reaped
/// - every scratch directory is removed when its `ScratchSpace` drops
///
/// The runner knows nothing about languages or expected outputs.

use crate::error::ExecutionError;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, instrument, warn};

/// How long a killed child gets to be reaped before we give up on it
const KILL_GRACE: Duration = Duration::from_millis(500);
const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// A fully resolved command line
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Set when either stream exceeded the capture limit
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessRunner {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }

    /// Run the invocation to completion, feeding `stdin` to the child
    #[instrument(
        skip(self, invocation, stdin),
        fields(program = %invocation.program, timeout_ms = self.timeout.as_millis() as u64)
    )]
    pub async fn run(&self, invocation: &Invocation, stdin: &str) -> Result<ProcessOutput, ExecutionError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .env_clear()
            .envs(sandbox_env(&invocation.working_dir))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ExecutionError::SpawnFailed {
            command: invocation.program.clone(),
            source,
        })?;

        debug!(pid = ?child.id(), "Spawned child process");

        let input = child.stdin.take();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let limit = self.max_output_bytes;

        let exchange = async {
            let (_, stdout, stderr, status) = tokio::join!(
                feed_stdin(input, stdin.as_bytes()),
                capture(stdout_pipe, limit),
                capture(stderr_pipe, limit),
                child.wait(),
            );
            (stdout, stderr, status)
        };

        let (stdout, stderr, status) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(finished) => finished,
            Err(_) => {
                warn!("Process exceeded its time budget - killing it");
                terminate(&mut child).await;
                return Err(ExecutionError::TimedOut);
            }
        };

        let status = status?;
        let (stdout, stdout_truncated) = stdout?;
        let (stderr, stderr_truncated) = stderr?;

        if stdout_truncated || stderr_truncated {
            warn!(limit_bytes = limit, "Process output truncated");
        }

        if !status.success() {
            debug!(code = ?status.code(), "Process exited with failure status");
            return Err(ExecutionError::NonZeroExit {
                code: status.code(),
                stdout,
                stderr,
            });
        }

        Ok(ProcessOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(0),
            truncated: stdout_truncated || stderr_truncated,
        })
    }
}

/// Best-effort kill; failures are logged and swallowed
async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to kill timed-out process");
    }

    match tokio::time::timeout(KILL_GRACE, child.wait()).await {
        Ok(Ok(status)) => debug!(?status, "Reaped timed-out process"),
        Ok(Err(e)) => warn!(error = %e, "Failed to reap timed-out process"),
        Err(_) => warn!("Timed-out process still running after kill"),
    }
}

async fn feed_stdin(pipe: Option<ChildStdin>, input: &[u8]) {
    let Some(mut pipe) = pipe else {
        return;
    };

    // A child that exits without reading its input closes the pipe early
    if let Err(e) = pipe.write_all(input).await {
        if e.kind() != io::ErrorKind::BrokenPipe {
            debug!(error = %e, "Failed to write child stdin");
        }
    }
    // Dropping the handle closes the pipe
}

async fn capture<R>(pipe: Option<R>, limit: usize) -> io::Result<(String, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok((String::new(), false));
    };

    let mut buf = Vec::new();
    (&mut pipe).take(limit as u64).read_to_end(&mut buf).await?;

    // Keep draining so the child never blocks on a full pipe
    let discarded = tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await?;

    Ok((String::from_utf8_lossy(&buf).into_owned(), discarded > 0))
}

/// Minimal environment for untrusted code: nothing inherited except PATH
fn sandbox_env(working_dir: &Path) -> Vec<(&'static str, OsString)> {
    let path = std::env::var_os("PATH").unwrap_or_else(|| OsString::from(FALLBACK_PATH));
    vec![
        ("PATH", path),
        ("LANG", OsString::from("C.UTF-8")),
        ("HOME", working_dir.as_os_str().to_owned()),
        ("TMPDIR", working_dir.as_os_str().to_owned()),
    ]
}

/// Per-invocation temporary directory, removed on drop
///
/// Directory names are randomly generated so concurrent invocations never
/// share or reuse a path.
#[derive(Debug)]
pub struct ScratchSpace {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchSpace {
    pub async fn create(root: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;

        let root = root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix("crucible-").tempdir_in(root)
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "Created scratch space");
        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_file(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        let file = self.path.join(name);
        tokio::fs::write(&file, contents).await?;
        Ok(file)
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(path = %self.path.display(), "Removed scratch space"),
                Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove scratch space"),
            }
        }
    }
}
