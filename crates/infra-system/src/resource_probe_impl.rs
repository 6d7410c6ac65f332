// Resource probe implementation
// reason: sysinfo for cross-platform per-process usage
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use sysinfo::{Pid, ProcessStatus, System};
use tracing::debug;

use deskctl_core::domain::ProcessId;
use deskctl_core::port::{ExecutionError, ResourceProbe, ResourceUsage};

/// Resource probe backed by a long-lived sysinfo `System`
///
/// CPU usage is computed between consecutive refreshes of the same process,
/// so the first sample of a process reads 0%.
pub struct SysinfoResourceProbe {
    system: Mutex<System>,
}

impl SysinfoResourceProbe {
    /// Create a new resource probe
    ///
    /// # Example
    /// ```ignore
    /// let probe = SysinfoResourceProbe::new();
    /// let usage = probe.inspect(std::process::id()).await?;
    /// ```
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoResourceProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceProbe for SysinfoResourceProbe {
    async fn inspect(&self, pid: ProcessId) -> Result<ResourceUsage, ExecutionError> {
        let mut sys = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        let sys_pid = Pid::from_u32(pid);

        if !sys.refresh_process(sys_pid) {
            return Err(ExecutionError::Inspection(format!(
                "process {} not found",
                pid
            )));
        }

        let process = sys
            .process(sys_pid)
            .ok_or_else(|| ExecutionError::Inspection(format!("process {} not found", pid)))?;

        if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
            return Err(ExecutionError::Inspection(format!(
                "process {} is {:?}",
                pid,
                process.status()
            )));
        }

        let total_memory = sys.total_memory();
        let memory_percent = if total_memory == 0 {
            0.0
        } else {
            (process.memory() as f64 / total_memory as f64 * 100.0) as f32
        };

        let started_at = DateTime::<Utc>::from_timestamp(process.start_time() as i64, 0)
            .ok_or_else(|| {
                ExecutionError::Inspection(format!("process {} has an invalid start time", pid))
            })?;

        let usage = ResourceUsage {
            cpu_percent: process.cpu_usage(),
            memory_percent,
            started_at,
        };

        debug!(
            pid = %pid,
            cpu = %usage.cpu_percent,
            mem = %usage.memory_percent,
            "Process usage sampled"
        );

        Ok(usage)
    }
}
