// Per-process resource monitoring port
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ProcessId;
use crate::port::ExecutionError;

/// Resource usage of one process at sampling time
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceUsage {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub started_at: DateTime<Utc>,
}

/// Resource probe port used by the reaper/lister
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    /// Sample cpu/memory usage and start time of a live process
    ///
    /// # Errors
    /// - ExecutionError::Inspection if the process vanished, is a zombie, or
    ///   cannot be inspected
    async fn inspect(&self, pid: ProcessId) -> Result<ResourceUsage, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Mock ResourceProbe for testing
    pub struct MockResourceProbe {
        vanished: Mutex<HashSet<ProcessId>>,
    }

    impl MockResourceProbe {
        pub fn new() -> Self {
            Self {
                vanished: Mutex::new(HashSet::new()),
            }
        }

        /// Make subsequent inspections of `pid` fail
        pub fn vanish(&self, pid: ProcessId) {
            self.vanished.lock().unwrap().insert(pid);
        }
    }

    impl Default for MockResourceProbe {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ResourceProbe for MockResourceProbe {
        async fn inspect(&self, pid: ProcessId) -> Result<ResourceUsage, ExecutionError> {
            if self.vanished.lock().unwrap().contains(&pid) {
                return Err(ExecutionError::Inspection(format!(
                    "process {} no longer exists",
                    pid
                )));
            }
            Ok(ResourceUsage {
                cpu_percent: 1.5,
                memory_percent: 0.25,
                started_at: Utc::now(),
            })
        }
    }
}
