// Execution Engine - spawn, wait up to a deadline, classify
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::registry::{JobRegistry, TrackedJob};
use crate::domain::CommandOutcome;
use crate::error::{AppError, Result};
use crate::port::{ManagedChild, ProcessLauncher};

/// Turns a command string into a synchronous result or a background job
pub struct ExecutionEngine {
    launcher: Arc<dyn ProcessLauncher>,
    registry: Arc<JobRegistry>,
    working_dir: PathBuf,
}

impl ExecutionEngine {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        registry: Arc<JobRegistry>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            launcher,
            registry,
            working_dir: working_dir.into(),
        }
    }

    /// Run `command`, waiting at most `timeout` measured from spawn
    ///
    /// Exit within the deadline yields the full stdout (or CommandFailed for a
    /// nonzero exit). A process still running at the deadline is registered
    /// and keeps running; its pid is returned.
    pub async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandOutcome> {
        info!(
            command = %command,
            timeout_ms = %timeout.as_millis(),
            working_dir = %self.working_dir.display(),
            "Starting shell command"
        );

        let mut child = self
            .launcher
            .spawn(command, &self.working_dir)
            .map_err(|e| {
                error!(command = %command, error = %e, "Failed to spawn shell command");
                AppError::from(e)
            })?;

        // A timeout past the clock's range means no deadline at all
        let waited = match Instant::now().checked_add(timeout) {
            Some(deadline) => tokio::time::timeout_at(deadline, child.wait()).await,
            None => Ok(child.wait().await),
        };

        match waited {
            Ok(Ok(_)) => self.classify(command, child).await,
            Ok(Err(e)) => {
                error!(pid = %child.pid(), error = %e, "Waiting on shell command failed");
                abandon(child.as_mut());
                Err(e.into())
            }
            Err(_) => self.background(command, child).await,
        }
    }

    /// Exit observed before the deadline
    async fn classify(
        &self,
        command: &str,
        mut child: Box<dyn ManagedChild>,
    ) -> Result<CommandOutcome> {
        let pid = child.pid();
        let drained = match child.drain(Duration::ZERO).await {
            Ok(drained) => drained,
            Err(e) => {
                abandon(child.as_mut());
                return Err(e.into());
            }
        };

        info!(
            pid = %pid,
            command = %command,
            exit_code = ?drained.exit_code,
            "Shell command completed"
        );

        if drained.success() {
            Ok(CommandOutcome::completed(drained.stdout))
        } else {
            Err(AppError::CommandFailed {
                exit_code: drained.exit_code,
                stderr: drained.stderr,
            })
        }
    }

    /// Deadline elapsed: hand the child to the registry
    async fn background(
        &self,
        command: &str,
        child: Box<dyn ManagedChild>,
    ) -> Result<CommandOutcome> {
        let pid = child.pid();

        match self.registry.register(TrackedJob::new(child, command)).await {
            Ok(pid) => {
                info!(pid = %pid, command = %command, "Shell command moved to background");
                Ok(CommandOutcome::background(pid))
            }
            Err(mut job) => {
                abandon(job.child.as_mut());
                Err(AppError::Conflict(format!(
                    "Process {} is already tracked",
                    pid
                )))
            }
        }
    }
}

/// Best-effort SIGTERM for a child that will not be tracked
fn abandon(child: &mut dyn ManagedChild) {
    let pid = child.pid();
    match child.terminate_group() {
        Ok(()) => warn!(pid = %pid, "Sent SIGTERM to untracked process group"),
        Err(e) => warn!(pid = %pid, error = %e, "Failed to signal untracked process group"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobStatus;
    use crate::port::ExecutionError;
    use crate::port::process::mocks::{emit, finish, MockProcessLauncher};
    use tokio_test::{assert_err, assert_ok};

    fn engine(launcher: Arc<MockProcessLauncher>) -> (ExecutionEngine, Arc<JobRegistry>) {
        let registry = Arc::new(JobRegistry::new());
        (
            ExecutionEngine::new(launcher, registry.clone(), "/tmp"),
            registry,
        )
    }

    #[tokio::test]
    async fn test_completed_within_deadline() {
        let launcher = Arc::new(MockProcessLauncher::new());
        let state = launcher.push_child(500);
        emit(&state, "done\n");
        finish(&state, 0);

        let (engine, registry) = engine(launcher.clone());
        let outcome = assert_ok!(engine.execute("echo done", Duration::from_secs(5)).await);

        assert_eq!(outcome, CommandOutcome::completed("done\n".to_string()));
        assert!(registry.is_empty().await);
        assert_eq!(launcher.spawned_commands(), vec!["echo done".to_string()]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_command_failed() {
        let launcher = Arc::new(MockProcessLauncher::new());
        let state = launcher.push_child(501);
        state.lock().unwrap().stderr = "boom".to_string();
        finish(&state, 1);

        let (engine, registry) = engine(launcher);
        let err = assert_err!(engine.execute("false", Duration::from_secs(5)).await);

        match err {
            AppError::CommandFailed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_deadline_backgrounds_without_killing() {
        let launcher = Arc::new(MockProcessLauncher::new());
        let state = launcher.push_child(502);

        let (engine, registry) = engine(launcher);
        let outcome = assert_ok!(engine.execute("sleep 30", Duration::from_millis(20)).await);

        assert_eq!(outcome.status, JobStatus::Background);
        assert_eq!(outcome.pid, Some(502));
        assert!(registry.contains(502).await);
        assert_eq!(state.lock().unwrap().terminate_calls, 0);
    }

    #[tokio::test]
    async fn test_unbounded_timeout_waits_for_exit() {
        let launcher = Arc::new(MockProcessLauncher::new());
        let state = launcher.push_child(505);

        let exiting = state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            emit(&exiting, "late\n");
            finish(&exiting, 0);
        });

        let (engine, registry) = engine(launcher);
        let outcome = assert_ok!(engine.execute("sleep 1; echo late", Duration::from_secs(u64::MAX)).await);

        assert_eq!(outcome, CommandOutcome::completed("late\n".to_string()));
        assert_eq!(state.lock().unwrap().terminate_calls, 0);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_spawn_failure_propagates() {
        let launcher = Arc::new(MockProcessLauncher::new());
        let (engine, registry) = engine(launcher);

        let err = assert_err!(engine.execute("anything", Duration::from_secs(1)).await);
        assert!(matches!(
            err,
            AppError::Execution(ExecutionError::SpawnFailed(_))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_wait_failure_signals_group() {
        let launcher = Arc::new(MockProcessLauncher::new());
        let state = launcher.push_child(503);
        state.lock().unwrap().fail_wait = true;

        let (engine, registry) = engine(launcher);
        let err = assert_err!(engine.execute("cat", Duration::from_secs(1)).await);

        assert!(matches!(err, AppError::Execution(ExecutionError::IoError(_))));
        assert_eq!(state.lock().unwrap().terminate_calls, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_registration_conflict_signals_group() {
        let launcher = Arc::new(MockProcessLauncher::new());
        let _first = launcher.push_child(504);
        let second = launcher.push_child(504);

        let (engine, registry) = engine(launcher);
        assert_ok!(engine.execute("sleep 30", Duration::from_millis(10)).await);
        let err = assert_err!(engine.execute("sleep 30", Duration::from_millis(10)).await);

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(second.lock().unwrap().terminate_calls, 1);
        assert_eq!(registry.len().await, 1);
    }
}
