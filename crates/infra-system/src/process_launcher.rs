// Tokio process launcher
// reason: tokio::process for cancel-safe async waits, nix for process-group signals
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use deskctl_core::domain::{complete_utf8_len, decode_lossy, ProcessId};
use deskctl_core::port::{DrainedOutput, ExecutionError, ManagedChild, ProcessLauncher};

/// Pipe read size for output pumps (8 KiB)
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Spawns `<shell> -c <command>` as the leader of a new process group
pub struct TokioProcessLauncher {
    shell: PathBuf,
}

impl TokioProcessLauncher {
    /// Create a launcher for the given shell
    ///
    /// # Example
    /// ```ignore
    /// let launcher = TokioProcessLauncher::new("/bin/sh");
    /// let child = launcher.spawn("sleep 1 && echo hi", Path::new("/tmp"))?;
    /// ```
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl ProcessLauncher for TokioProcessLauncher {
    fn spawn(
        &self,
        command: &str,
        working_dir: &Path,
    ) -> Result<Box<dyn ManagedChild>, ExecutionError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // New group led by the child so one signal reaches its descendants
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {}", self.shell.display(), e)))?;

        let pid = child.id().ok_or_else(|| {
            ExecutionError::SpawnFailed("process exited before its pid was read".to_string())
        })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                // Process exists but cannot be observed: do not leave it behind
                #[cfg(unix)]
                let _ = signal_group(pid);
                #[cfg(not(unix))]
                let _ = child.start_kill();
                return Err(ExecutionError::SpawnFailed(
                    "output pipes were not attached".to_string(),
                ));
            }
        };

        debug!(pid = %pid, shell = %self.shell.display(), "Spawned shell command");

        Ok(Box::new(TokioChild {
            pid,
            child,
            status: None,
            stdout: OutputPump::spawn(stdout, pid, "stdout"),
            stderr: OutputPump::spawn(stderr, pid, "stderr"),
        }))
    }
}

/// A spawned command, its exit status once known, and its output pumps
pub struct TokioChild {
    pid: ProcessId,
    child: Child,
    status: Option<ExitStatus>,
    stdout: OutputPump,
    stderr: OutputPump,
}

#[async_trait]
impl ManagedChild for TokioChild {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn has_exited(&mut self) -> Result<bool, ExecutionError> {
        if self.status.is_some() {
            return Ok(true);
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.status = Some(status);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(ExecutionError::IoError(e.to_string())),
        }
    }

    async fn wait(&mut self) -> Result<Option<i32>, ExecutionError> {
        let status = match self.status {
            Some(status) => status,
            None => {
                let status = self
                    .child
                    .wait()
                    .await
                    .map_err(|e| ExecutionError::IoError(e.to_string()))?;
                self.status = Some(status);
                status
            }
        };

        self.stdout.finish().await;
        self.stderr.finish().await;

        Ok(status.code())
    }

    fn read_stdout(&mut self) -> String {
        self.stdout.take_complete()
    }

    async fn drain(&mut self, grace: Duration) -> Result<DrainedOutput, ExecutionError> {
        let status = self.status.ok_or_else(|| {
            ExecutionError::IoError(format!("process {} has not exited", self.pid))
        })?;

        let streams = async {
            self.stdout.finish().await;
            self.stderr.finish().await;
        };
        if tokio::time::timeout(grace, streams).await.is_err() {
            debug!(
                pid = %self.pid,
                grace_ms = %grace.as_millis(),
                "Output pipes still open after exit, abandoning them"
            );
        }

        Ok(DrainedOutput {
            exit_code: status.code(),
            stdout: self.stdout.take_all(),
            stderr: self.stderr.take_all(),
        })
    }

    fn terminate_group(&mut self) -> Result<(), ExecutionError> {
        #[cfg(unix)]
        {
            signal_group(self.pid)
        }

        #[cfg(not(unix))]
        {
            self.child
                .start_kill()
                .map_err(|e| ExecutionError::Signal(e.to_string()))
        }
    }
}

/// SIGTERM every process in the group led by `pid`
#[cfg(unix)]
fn signal_group(pid: ProcessId) -> Result<(), ExecutionError> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid)
        .map_err(|_| ExecutionError::Signal(format!("pid {} out of range", pid)))?;

    match killpg(Pid::from_raw(pgid), Signal::SIGTERM) {
        Ok(()) => {
            debug!(pgid = %pgid, "Sent SIGTERM to process group");
            Ok(())
        }
        Err(Errno::ESRCH) => {
            debug!(pgid = %pgid, "Process group already gone");
            Ok(())
        }
        Err(e) => Err(ExecutionError::Signal(format!(
            "SIGTERM to group {} failed: {}",
            pgid, e
        ))),
    }
}

/// Background task copying one pipe into a shared buffer
///
/// Pumping keeps the child from blocking on a full pipe while nobody reads.
struct OutputPump {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl OutputPump {
    fn spawn<R>(reader: R, pid: ProcessId, stream: &'static str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();

        let task = tokio::spawn(async move {
            let mut reader = reader;
            let mut chunk = vec![0u8; READ_CHUNK_SIZE];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => lock(&sink).extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!(pid = %pid, stream = stream, error = %e, "Output pipe read failed");
                        break;
                    }
                }
            }
        });

        Self {
            buffer,
            task: Some(task),
        }
    }

    /// Wait for EOF on the pipe (cancel-safe)
    async fn finish(&mut self) {
        if let Some(task) = self.task.as_mut() {
            if let Err(e) = task.await {
                warn!(error = %e, "Output pump task failed");
            }
            self.task = None;
        }
    }

    /// Take buffered bytes up to the last complete UTF-8 character
    fn take_complete(&self) -> String {
        let mut buffer = lock(&self.buffer);
        let end = complete_utf8_len(&buffer);
        let taken: Vec<u8> = buffer.drain(..end).collect();
        decode_lossy(&taken)
    }

    /// Take everything buffered
    fn take_all(&self) -> String {
        let taken = std::mem::take(&mut *lock(&self.buffer));
        decode_lossy(&taken)
    }
}

impl Drop for OutputPump {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn lock(buffer: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn launcher() -> TokioProcessLauncher {
        TokioProcessLauncher::new("/bin/sh")
    }

    #[tokio::test]
    async fn test_wait_and_drain_collects_output() {
        let mut child = launcher()
            .spawn("echo hello && echo oops >&2", Path::new("/tmp"))
            .unwrap();

        let code = assert_ok!(child.wait().await);
        let drained = assert_ok!(child.drain(Duration::ZERO).await);

        assert_eq!(code, Some(0));
        assert!(drained.success());
        assert_eq!(drained.stdout, "hello\n");
        assert_eq!(drained.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_working_directory_is_applied() {
        let mut child = launcher().spawn("pwd", Path::new("/")).unwrap();
        child.wait().await.unwrap();
        let drained = child.drain(Duration::ZERO).await.unwrap();
        assert_eq!(drained.stdout, "/\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_code_reported() {
        let mut child = launcher().spawn("exit 3", Path::new("/tmp")).unwrap();
        assert_eq!(child.wait().await.unwrap(), Some(3));
        assert!(!child.drain(Duration::ZERO).await.unwrap().success());
    }

    #[tokio::test]
    async fn test_spawn_failure_for_missing_shell() {
        let result = TokioProcessLauncher::new("/nonexistent/shell").spawn("true", Path::new("/tmp"));
        assert!(matches!(result, Err(ExecutionError::SpawnFailed(_))));
    }

    #[tokio::test]
    async fn test_partial_reads_are_destructive() {
        let mut child = launcher()
            .spawn("echo first; sleep 30", Path::new("/tmp"))
            .unwrap();

        let mut first = String::new();
        for _ in 0..50 {
            first.push_str(&child.read_stdout());
            if !first.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(first, "first\n");
        assert_eq!(child.read_stdout(), "");
        assert!(!child.has_exited().unwrap());

        child.terminate_group().unwrap();
    }

    #[tokio::test]
    async fn test_terminate_group_stops_process() {
        let mut child = launcher().spawn("sleep 30", Path::new("/tmp")).unwrap();
        assert!(!child.has_exited().unwrap());

        child.terminate_group().unwrap();
        let code = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("process should exit after SIGTERM")
            .unwrap();

        // Killed by a signal: no exit code
        assert_eq!(code, None);
        assert!(child.has_exited().unwrap());

        // Group is gone now; signaling again is not an error
        assert!(child.terminate_group().is_ok());
    }

    #[tokio::test]
    async fn test_drain_before_exit_is_rejected() {
        let mut child = launcher().spawn("sleep 30", Path::new("/tmp")).unwrap();
        assert!(matches!(
            child.drain(Duration::ZERO).await,
            Err(ExecutionError::IoError(_))
        ));
        child.terminate_group().unwrap();
    }
}
