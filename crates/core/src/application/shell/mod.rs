// Shell Service - background command execution and process lifecycle

pub mod constants;
pub mod engine;
pub mod reaper;
pub mod registry;

pub use engine::ExecutionEngine;
pub use registry::{JobRegistry, Lookup, TrackedJob};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::{CommandOutcome, JobOutput, JobStatus, ManagedProcess, ProcessId};
use crate::error::{AppError, Result};
use crate::port::{ProcessLauncher, ResourceProbe, SystemControl};
use constants::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_DRAIN_GRACE};

/// Runtime settings of the shell service
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Working directory of every spawned command (the caller's home)
    pub working_dir: PathBuf,
    /// Synchronous wait used when a caller gives no timeout
    pub default_timeout: Duration,
    /// Pipe drain grace for completed reads
    pub drain_grace: Duration,
    /// Whether `restart_system` may reboot the host
    pub allow_restart: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            default_timeout: DEFAULT_COMMAND_TIMEOUT,
            drain_grace: DEFAULT_DRAIN_GRACE,
            allow_restart: false,
        }
    }
}

/// Shell command service
///
/// Owns the job registry and exposes the four job operations plus the
/// privileged restart. Cloning shares the same registry.
#[derive(Clone)]
pub struct ShellService {
    engine: Arc<ExecutionEngine>,
    registry: Arc<JobRegistry>,
    probe: Arc<dyn ResourceProbe>,
    system_control: Arc<dyn SystemControl>,
    config: ShellConfig,
}

impl ShellService {
    /// Create a new shell service with an empty registry
    ///
    /// # Example
    /// ```ignore
    /// let service = ShellService::new(
    ///     Arc::new(TokioProcessLauncher::new("/bin/sh")),
    ///     Arc::new(SysinfoResourceProbe::new()),
    ///     Arc::new(SudoRebootControl),
    ///     ShellConfig::default(),
    /// );
    /// ```
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        probe: Arc<dyn ResourceProbe>,
        system_control: Arc<dyn SystemControl>,
        config: ShellConfig,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let engine = Arc::new(ExecutionEngine::new(
            launcher,
            registry.clone(),
            config.working_dir.clone(),
        ));

        Self {
            engine,
            registry,
            probe,
            system_control,
            config,
        }
    }

    /// Execute a command, backgrounding it if it outlives `timeout`
    ///
    /// The spawn and classification run on their own task, so dropping the
    /// returned future never cancels the command or its registration.
    pub async fn execute(
        &self,
        command: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutcome> {
        let command = command.into();
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let engine = self.engine.clone();

        tokio::spawn(async move { engine.execute(&command, timeout).await })
            .await
            .map_err(|e| AppError::Internal(format!("Execution task failed: {}", e)))?
    }

    /// Read output of a background job
    ///
    /// A running job yields what it printed since the previous read. A finished
    /// job yields the rest of its output and is evicted; reading it again fails
    /// with NotFound.
    pub async fn get_output(&self, pid: ProcessId) -> Result<JobOutput> {
        let mut job = match self.registry.take_if_completed(pid).await? {
            Lookup::Running(output) => {
                return Ok(JobOutput {
                    output: Some(output),
                    status: JobStatus::Background,
                })
            }
            Lookup::Completed(job) => job,
        };

        // The job is owned here now; draining happens outside the lock
        let drained = match job.child.drain(self.config.drain_grace).await {
            Ok(drained) => drained,
            Err(e) => {
                // Exit was never confirmed and the entry is gone: stop the group
                warn!(pid = %pid, error = %e, "Drain failed, signaling untracked job");
                if let Err(signal_err) = job.child.terminate_group() {
                    warn!(pid = %pid, error = %signal_err, "Failed to signal untracked job");
                }
                return Err(e.into());
            }
        };

        info!(
            pid = %pid,
            command = %job.command,
            exit_code = ?drained.exit_code,
            age_ms = job.age_ms(),
            "Background job completed"
        );

        if !drained.success() {
            return Err(AppError::CommandFailed {
                exit_code: drained.exit_code,
                stderr: drained.stderr,
            });
        }

        Ok(JobOutput {
            output: Some(drained.stdout),
            status: JobStatus::Completed,
        })
    }

    /// SIGTERM a background job's process group and forget it
    ///
    /// Fire-and-forget: the entry is removed whether or not the signal could
    /// be delivered, and exit is not awaited.
    pub async fn terminate(&self, pid: ProcessId) -> Result<()> {
        let mut job = self.registry.remove(pid).await?;

        match job.child.terminate_group() {
            Ok(()) => info!(
                pid = %pid,
                command = %job.command,
                age_ms = job.age_ms(),
                "Terminated background job"
            ),
            Err(e) => warn!(pid = %pid, error = %e, "Signal failed, job removed anyway"),
        }

        Ok(())
    }

    /// Snapshot live background jobs, evicting stale ones
    pub async fn list_managed(&self) -> Result<Vec<ManagedProcess>> {
        Ok(reaper::reap_and_snapshot(&self.registry, self.probe.as_ref()).await)
    }

    /// Reboot the host (privileged, outside the job model)
    pub async fn restart_system(&self) -> Result<()> {
        if !self.config.allow_restart {
            return Err(AppError::Forbidden(
                "System restart is disabled by configuration".to_string(),
            ));
        }

        warn!("System restart requested");
        self.system_control.reboot().await?;
        Ok(())
    }

    /// Terminate every tracked job; returns how many were signaled
    pub async fn shutdown(&self) -> usize {
        let jobs = self.registry.drain_all().await;
        let count = jobs.len();

        for mut job in jobs {
            let pid = job.pid();
            if let Err(e) = job.child.terminate_group() {
                warn!(pid = %pid, error = %e, "Failed to signal job during shutdown");
            }
        }

        if count > 0 {
            info!(count = count, "Terminated background jobs on shutdown");
        }
        count
    }

    /// Number of tracked background jobs
    pub async fn tracked_jobs(&self) -> usize {
        self.registry.len().await
    }
}
