// Shell Job Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OS process identifier of a spawned command (also its process group id)
pub type ProcessId = u32;

/// Lifecycle status reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Finished; output is final
    Completed,
    /// Outlived its synchronous wait and is tracked in the registry
    Background,
    /// Alive at sampling time (listing only)
    Running,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Background => write!(f, "background"),
            JobStatus::Running => write!(f, "running"),
        }
    }
}

/// Result of `execute`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub output: Option<String>,
    pub pid: Option<ProcessId>,
    pub status: JobStatus,
}

impl CommandOutcome {
    pub fn completed(output: String) -> Self {
        Self {
            output: Some(output),
            pid: None,
            status: JobStatus::Completed,
        }
    }

    pub fn background(pid: ProcessId) -> Self {
        Self {
            output: None,
            pid: Some(pid),
            status: JobStatus::Background,
        }
    }
}

/// Result of `get_output`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutput {
    pub output: Option<String>,
    pub status: JobStatus,
}

impl JobOutput {
    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Live snapshot of a tracked background job
///
/// Recomputed on every listing; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedProcess {
    pub pid: ProcessId,
    pub command: String,
    pub status: JobStatus,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Background).unwrap();
        assert_eq!(json, "\"background\"");
        assert_eq!(JobStatus::Running.to_string(), "running");
    }

    #[test]
    fn test_outcome_constructors() {
        let done = CommandOutcome::completed("done\n".to_string());
        assert_eq!(done.pid, None);
        assert_eq!(done.status, JobStatus::Completed);

        let bg = CommandOutcome::background(1234);
        assert_eq!(bg.output, None);
        assert_eq!(bg.pid, Some(1234));
        assert_eq!(bg.status, JobStatus::Background);
    }
}
