// Privileged system control port
use async_trait::async_trait;

use crate::port::ExecutionError;

/// Host-level operations outside the job model
#[async_trait]
pub trait SystemControl: Send + Sync {
    /// Reboot the host
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the reboot command cannot be started
    /// - ExecutionError::IoError if it exits unsuccessfully
    async fn reboot(&self) -> Result<(), ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock SystemControl counting reboot requests
    #[derive(Default)]
    pub struct MockSystemControl {
        reboots: AtomicUsize,
    }

    impl MockSystemControl {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reboot_count(&self) -> usize {
            self.reboots.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SystemControl for MockSystemControl {
        async fn reboot(&self) -> Result<(), ExecutionError> {
            self.reboots.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
