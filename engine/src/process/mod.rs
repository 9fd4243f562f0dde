//! Shell process execution
//!
//! `ProcessRunner` runs commands through `sh -c` inside the project root, in
//! one of two modes:
//!
//! - **Foreground**: stdout/stderr are captured into buffers while the
//!   process runs. If the timeout elapses, the whole process group receives
//!   SIGTERM and whatever was captured so far is returned. Once the call is
//!   over, anything still alive in the group is killed.
//! - **Detached**: the process is started in its own process group with all
//!   streams redirected to null, and only its PID is returned. The runner does
//!   not keep a handle to it.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default foreground timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to keep collecting output after the process exits or is terminated
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Grace period between SIGTERM and a hard kill
const TERM_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to wait for command: {0}")]
    Wait(#[source] std::io::Error),
}

/// Output captured from a foreground process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Result of a foreground run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exited with status 0
    Completed(CapturedOutput),
    /// Exited with a non-zero status (or was killed by a signal, reported as -1)
    Failed { code: i32, output: CapturedOutput },
    /// Terminated after the timeout elapsed
    TimedOut {
        after: Duration,
        output: CapturedOutput,
    },
}

impl ProcessOutcome {
    pub fn output(&self) -> &CapturedOutput {
        match self {
            Self::Completed(output) => output,
            Self::Failed { output, .. } => output,
            Self::TimedOut { output, .. } => output,
        }
    }
}

/// A fire-and-forget process. Only the PID is known; nothing joins it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachedProcess {
    pub pid: u32,
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    work_dir: PathBuf,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a command in the foreground, terminating it after `timeout`
    pub async fn run_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<ProcessOutcome, ProcessError> {
        info!("Executing shell command: {}", command);

        let mut cmd = self.shell(command);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;
        // The shell leads its own group; the id is gone from `child` once reaped
        let group = child.id();

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(out, stdout_buf.clone()));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(err, stderr_buf.clone()));
        }

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => Some(status.map_err(ProcessError::Wait)?),
            Err(_) => {
                warn!(
                    "Command timed out after {} seconds: {}",
                    timeout.as_secs(),
                    command
                );
                terminate(&mut child).await;
                None
            }
        };

        // Background jobs left by the command must not outlive the call
        kill_group(group);

        // Children that inherited the pipes can keep them open indefinitely
        if tokio::time::timeout(DRAIN_TIMEOUT, futures::future::join_all(&mut readers))
            .await
            .is_err()
        {
            debug!("Output drain timed out, keeping partial output");
            for reader in &readers {
                reader.abort();
            }
        }

        let output = CapturedOutput {
            stdout: take_lossy(&stdout_buf),
            stderr: take_lossy(&stderr_buf),
        };

        let outcome = match status {
            None => ProcessOutcome::TimedOut {
                after: timeout,
                output,
            },
            Some(status) if status.success() => ProcessOutcome::Completed(output),
            Some(status) => ProcessOutcome::Failed {
                code: status.code().unwrap_or(-1),
                output,
            },
        };

        debug!("Command finished: {:?}", outcome_label(&outcome));
        Ok(outcome)
    }

    /// Start a command detached from the orchestrator and return immediately
    pub fn spawn_detached(&self, command: &str) -> Result<DetachedProcess, ProcessError> {
        info!("Spawning background command: {}", command);

        let mut cmd = self.shell(command);
        cmd.stdout(Stdio::null()).stderr(Stdio::null());

        let child = cmd.spawn().map_err(ProcessError::Spawn)?;
        let pid = child.id().unwrap_or_default();
        // Dropping the handle does not kill the process (kill_on_drop is off)
        drop(child);

        info!("Background command started with PID {}", pid);
        Ok(DetachedProcess { pid })
    }

    fn shell(&self, command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null());
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

fn spawn_reader<R>(mut stream: R, buf: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let mut guard = buf.lock().unwrap_or_else(|e| e.into_inner());
                    guard.extend_from_slice(&chunk[..n]);
                }
            }
        }
    })
}

fn take_lossy(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    let guard = buf.lock().unwrap_or_else(|e| e.into_inner());
    String::from_utf8_lossy(&guard).into_owned()
}

/// SIGTERM the process group, then hard-kill the shell if it lingers
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!("Failed to signal process group {}: {}", pid, e);
        }
        if tokio::time::timeout(TERM_GRACE, child.wait()).await.is_ok() {
            return;
        }
    }

    if let Err(e) = child.start_kill() {
        warn!("Failed to kill timed out command: {}", e);
    }
    let _ = tokio::time::timeout(TERM_GRACE, child.wait()).await;
}

/// SIGKILL every process left in the group led by `group`
fn kill_group(group: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = group {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
            Ok(()) => debug!("Killed leftover processes in group {}", pgid),
            Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
        }
    }

    #[cfg(not(unix))]
    let _ = group;
}

fn outcome_label(outcome: &ProcessOutcome) -> &'static str {
    match outcome {
        ProcessOutcome::Completed(_) => "completed",
        ProcessOutcome::Failed { .. } => "failed",
        ProcessOutcome::TimedOut { .. } => "timed out",
    }
}
