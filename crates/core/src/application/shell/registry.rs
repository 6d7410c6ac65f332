// Job Registry - pid -> tracked background job
//
// The registry is the only shared mutable state of the shell service. Every
// operation below runs inside one critical section of the same lock, so two
// callers racing on a pid always resolve to a single owner of its handle.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::ProcessId;
use crate::error::{AppError, Result};
use crate::port::ManagedChild;

/// A backgrounded process and what it was started for
pub struct TrackedJob {
    pub child: Box<dyn ManagedChild>,
    pub command: String,
    pub registered_at: DateTime<Utc>,
}

impl TrackedJob {
    pub fn new(child: Box<dyn ManagedChild>, command: impl Into<String>) -> Self {
        Self {
            child,
            command: command.into(),
            registered_at: Utc::now(),
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.child.pid()
    }

    /// Milliseconds since the job was moved to the background
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.registered_at).num_milliseconds()
    }
}

/// Outcome of a one-shot completion check
pub enum Lookup {
    /// Process has exited; the job was removed and is now owned by the caller
    Completed(TrackedJob),
    /// Process is still running; carries stdout captured since the last read
    Running(String),
}

/// Mapping pid -> TrackedJob behind a single async mutex
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<ProcessId, TrackedJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a backgrounded job
    ///
    /// A pid that is already tracked is refused and the job handed back, so
    /// the caller can signal it instead of leaking the process.
    pub async fn register(&self, job: TrackedJob) -> std::result::Result<ProcessId, TrackedJob> {
        let pid = job.pid();
        let mut jobs = self.jobs.lock().await;

        if jobs.contains_key(&pid) {
            warn!(pid = %pid, "Refusing to register duplicate pid");
            return Err(job);
        }

        jobs.insert(pid, job);
        debug!(pid = %pid, tracked = jobs.len(), "Background job registered");
        Ok(pid)
    }

    /// Atomic check-and-remove used by the output reader
    ///
    /// Exited (or unpollable) jobs are removed and returned; running jobs stay
    /// and yield their newly captured stdout.
    pub async fn take_if_completed(&self, pid: ProcessId) -> Result<Lookup> {
        let mut jobs = self.jobs.lock().await;

        let job = jobs
            .get_mut(&pid)
            .ok_or_else(|| AppError::process_not_found(pid))?;

        let exited = match job.child.has_exited() {
            Ok(exited) => exited,
            Err(e) => {
                warn!(pid = %pid, error = %e, "Exit poll failed, treating job as finished");
                true
            }
        };

        if !exited {
            return Ok(Lookup::Running(job.child.read_stdout()));
        }

        // Key was just looked up under the same guard
        match jobs.remove(&pid) {
            Some(job) => Ok(Lookup::Completed(job)),
            None => Err(AppError::process_not_found(pid)),
        }
    }

    /// Remove a job regardless of its state
    pub async fn remove(&self, pid: ProcessId) -> Result<TrackedJob> {
        self.jobs
            .lock()
            .await
            .remove(&pid)
            .ok_or_else(|| AppError::process_not_found(pid))
    }

    /// Remove and return every tracked job
    pub async fn drain_all(&self) -> Vec<TrackedJob> {
        self.jobs.lock().await.drain().map(|(_, job)| job).collect()
    }

    pub async fn contains(&self, pid: ProcessId) -> bool {
        self.jobs.lock().await.contains_key(&pid)
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Lock the map for a multi-entry sweep (reaper only)
    pub(crate) async fn lock(
        &self,
    ) -> tokio::sync::MutexGuard<'_, HashMap<ProcessId, TrackedJob>> {
        self.jobs.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::process::mocks::{emit, finish, MockChild};

    #[tokio::test]
    async fn test_register_and_remove() {
        let registry = JobRegistry::new();
        let (child, _state) = MockChild::new(100);

        let pid = registry
            .register(TrackedJob::new(Box::new(child), "sleep 30"))
            .await
            .ok()
            .unwrap();
        assert_eq!(pid, 100);
        assert!(registry.contains(100).await);

        let job = registry.remove(100).await.unwrap();
        assert_eq!(job.command, "sleep 30");
        assert!(registry.is_empty().await);
        assert!(matches!(registry.remove(100).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_age_counts_from_registration() {
        let (child, _state) = MockChild::new(101);
        let mut job = TrackedJob::new(Box::new(child), "sleep 30");
        assert!(job.age_ms() < 1_000);

        job.registered_at -= chrono::Duration::seconds(5);
        assert!(job.age_ms() >= 5_000);
    }

    #[tokio::test]
    async fn test_duplicate_pid_rejected() {
        let registry = JobRegistry::new();
        let (first, _) = MockChild::new(7);
        let (second, _) = MockChild::new(7);

        assert!(registry
            .register(TrackedJob::new(Box::new(first), "a"))
            .await
            .is_ok());
        let rejected = registry
            .register(TrackedJob::new(Box::new(second), "b"))
            .await;

        match rejected {
            Err(job) => assert_eq!(job.command, "b"),
            Ok(_) => panic!("duplicate pid must be rejected"),
        }
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_take_if_completed_running_keeps_entry() {
        let registry = JobRegistry::new();
        let (child, state) = MockChild::new(11);
        registry
            .register(TrackedJob::new(Box::new(child), "tail -f log"))
            .await
            .ok()
            .unwrap();

        emit(&state, "line 1\n");
        match registry.take_if_completed(11).await.unwrap() {
            Lookup::Running(out) => assert_eq!(out, "line 1\n"),
            Lookup::Completed(_) => panic!("job is still running"),
        }
        assert!(registry.contains(11).await);

        // Destructive read: nothing new since the last call
        match registry.take_if_completed(11).await.unwrap() {
            Lookup::Running(out) => assert!(out.is_empty()),
            Lookup::Completed(_) => panic!("job is still running"),
        }
    }

    #[tokio::test]
    async fn test_take_if_completed_is_one_shot() {
        let registry = JobRegistry::new();
        let (child, state) = MockChild::new(12);
        registry
            .register(TrackedJob::new(Box::new(child), "make"))
            .await
            .ok()
            .unwrap();

        finish(&state, 0);
        assert!(matches!(
            registry.take_if_completed(12).await.unwrap(),
            Lookup::Completed(_)
        ));
        assert!(matches!(
            registry.take_if_completed(12).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_take_has_single_winner() {
        let registry = std::sync::Arc::new(JobRegistry::new());
        let (child, state) = MockChild::new(13);
        registry
            .register(TrackedJob::new(Box::new(child), "true"))
            .await
            .ok()
            .unwrap();
        finish(&state, 0);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.take_if_completed(13).await })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;
        let winners = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|r| matches!(r, Ok(Lookup::Completed(_))))
            .count();

        assert_eq!(winners, 1);
        assert!(registry.is_empty().await);
    }
}
