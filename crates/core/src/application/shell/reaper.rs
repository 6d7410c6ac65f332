// Reaper/Lister - evict stale jobs, snapshot survivors
use tracing::debug;

use super::registry::JobRegistry;
use crate::domain::{JobStatus, ManagedProcess, ProcessId};
use crate::port::ResourceProbe;

/// Sweep the registry and return live snapshots of the remaining jobs
///
/// Entries whose process has exited, whose exit poll fails, or that the probe
/// can no longer inspect are evicted. This is the only place stale entries are
/// collected when nobody reads or terminates them.
pub async fn reap_and_snapshot(
    registry: &JobRegistry,
    probe: &dyn ResourceProbe,
) -> Vec<ManagedProcess> {
    let mut jobs = registry.lock().await;
    let mut snapshots = Vec::with_capacity(jobs.len());
    let mut evicted: Vec<ProcessId> = Vec::new();

    for (pid, job) in jobs.iter_mut() {
        match job.child.has_exited() {
            Ok(false) => {}
            Ok(true) => {
                debug!(pid = %pid, age_ms = job.age_ms(), "Reaping exited background job");
                evicted.push(*pid);
                continue;
            }
            Err(e) => {
                debug!(pid = %pid, error = %e, "Exit poll failed, reaping job");
                evicted.push(*pid);
                continue;
            }
        }

        match probe.inspect(*pid).await {
            Ok(usage) => snapshots.push(ManagedProcess {
                pid: *pid,
                command: job.command.clone(),
                status: JobStatus::Running,
                cpu_percent: usage.cpu_percent,
                memory_percent: usage.memory_percent,
                created_at: usage.started_at,
            }),
            Err(e) => {
                debug!(pid = %pid, error = %e, "Process no longer inspectable, reaping job");
                evicted.push(*pid);
            }
        }
    }

    for pid in &evicted {
        jobs.remove(pid);
    }

    if !evicted.is_empty() {
        debug!(evicted = evicted.len(), remaining = jobs.len(), "Registry sweep finished");
    }

    snapshots.sort_by_key(|s| s.pid);
    snapshots
}
