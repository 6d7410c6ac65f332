//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use chrono::{DateTime, Utc};
use deskctl_core::domain::{CommandOutcome, JobOutput, JobStatus, ManagedProcess};
use serde::{Deserialize, Serialize};

/// bash.command.v1 - Execute a shell command
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    /// Synchronous wait before backgrounding (server default when absent)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandResponse {
    pub output: Option<String>,
    pub process_id: Option<u32>,
    pub status: JobStatus,
}

impl From<CommandOutcome> for CommandResponse {
    fn from(outcome: CommandOutcome) -> Self {
        Self {
            output: outcome.output,
            process_id: outcome.pid,
            status: outcome.status,
        }
    }
}

impl CommandResponse {
    /// Output of a background job; the pid is echoed only while it still runs
    pub fn from_job_output(pid: u32, job: JobOutput) -> Self {
        let process_id = (job.status == JobStatus::Background).then_some(pid);
        Self {
            output: job.output,
            process_id,
            status: job.status,
        }
    }
}

/// bash.output.v1 / bash.terminate.v1 - Address a background process
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub pid: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerminateResponse {
    pub pid: u32,
    pub terminated: bool,
}

/// bash.processes.v1 - List managed processes
#[derive(Debug, Default, Deserialize)]
pub struct ListProcessesRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub command: String,
    pub status: JobStatus,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub created_at: DateTime<Utc>,
}

impl From<ManagedProcess> for ProcessInfo {
    fn from(p: ManagedProcess) -> Self {
        Self {
            pid: p.pid,
            command: p.command,
            status: p.status,
            cpu_percent: p.cpu_percent,
            memory_percent: p.memory_percent,
            created_at: p.created_at,
        }
    }
}

/// system.restart.v1 - Reboot the host
#[derive(Debug, Default, Deserialize)]
pub struct RestartRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize)]
pub struct RestartResponse {
    pub accepted: bool,
}
