// Process Port
// Abstraction over spawning, polling, and signaling OS process groups

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::domain::ProcessId;

/// Output left in a child's buffers once it has exited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainedOutput {
    /// None when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl DrainedOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Execution errors raised by process adapters
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Signal delivery failed: {0}")]
    Signal(String),

    #[error("Process inspection failed: {0}")]
    Inspection(String),
}

/// Handle to one spawned command and its process group
///
/// The group id equals the pid: every child is spawned as the leader of a
/// new group so a single signal reaches the whole subtree.
#[async_trait]
pub trait ManagedChild: Send {
    /// OS process id (and process group id)
    fn pid(&self) -> ProcessId;

    /// Poll for exit without blocking
    ///
    /// Reaps the process when it has exited; later calls keep returning true.
    fn has_exited(&mut self) -> Result<bool, ExecutionError>;

    /// Wait until the process exits and both output streams reach EOF
    ///
    /// Cancel-safe: dropping the future leaves the handle usable.
    async fn wait(&mut self) -> Result<Option<i32>, ExecutionError>;

    /// Take the stdout captured since the previous read (destructive, non-blocking)
    fn read_stdout(&mut self) -> String;

    /// Collect everything still buffered after exit
    ///
    /// Streams held open by orphaned descendants are abandoned after `grace`.
    async fn drain(&mut self, grace: Duration) -> Result<DrainedOutput, ExecutionError>;

    /// Send SIGTERM to the whole process group
    ///
    /// A group that no longer exists is not an error.
    fn terminate_group(&mut self) -> Result<(), ExecutionError>;
}

/// Spawns shell commands
pub trait ProcessLauncher: Send + Sync {
    /// Spawn `command` through the shell in a new process group
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the OS could not create the process
    fn spawn(
        &self,
        command: &str,
        working_dir: &Path,
    ) -> Result<Box<dyn ManagedChild>, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Shared, scriptable state of a mock child
    #[derive(Debug, Default)]
    pub struct MockChildState {
        pub exit_code: Option<Option<i32>>,
        pub stdout: String,
        pub stderr: String,
        pub terminate_calls: usize,
        pub fail_wait: bool,
        pub fail_poll: bool,
    }

    /// Mock child process driven entirely by its shared state
    pub struct MockChild {
        pid: ProcessId,
        state: Arc<Mutex<MockChildState>>,
    }

    impl MockChild {
        pub fn new(pid: ProcessId) -> (Self, Arc<Mutex<MockChildState>>) {
            let state = Arc::new(Mutex::new(MockChildState::default()));
            (
                Self {
                    pid,
                    state: state.clone(),
                },
                state,
            )
        }
    }

    /// Mark a mock child as exited with the given code
    pub fn finish(state: &Arc<Mutex<MockChildState>>, exit_code: i32) {
        state.lock().unwrap().exit_code = Some(Some(exit_code));
    }

    /// Append stdout to a mock child
    pub fn emit(state: &Arc<Mutex<MockChildState>>, text: &str) {
        state.lock().unwrap().stdout.push_str(text);
    }

    #[async_trait]
    impl ManagedChild for MockChild {
        fn pid(&self) -> ProcessId {
            self.pid
        }

        fn has_exited(&mut self) -> Result<bool, ExecutionError> {
            let state = self.state.lock().unwrap();
            if state.fail_poll {
                return Err(ExecutionError::IoError("mock poll failure".to_string()));
            }
            Ok(state.exit_code.is_some())
        }

        async fn wait(&mut self) -> Result<Option<i32>, ExecutionError> {
            loop {
                {
                    let state = self.state.lock().unwrap();
                    if state.fail_wait {
                        return Err(ExecutionError::IoError("mock wait failure".to_string()));
                    }
                    if let Some(code) = state.exit_code {
                        return Ok(code);
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        fn read_stdout(&mut self) -> String {
            std::mem::take(&mut self.state.lock().unwrap().stdout)
        }

        async fn drain(&mut self, _grace: Duration) -> Result<DrainedOutput, ExecutionError> {
            let mut state = self.state.lock().unwrap();
            let exit_code = state.exit_code.ok_or_else(|| {
                ExecutionError::IoError(format!("process {} has not exited", self.pid))
            })?;
            Ok(DrainedOutput {
                exit_code,
                stdout: std::mem::take(&mut state.stdout),
                stderr: std::mem::take(&mut state.stderr),
            })
        }

        fn terminate_group(&mut self) -> Result<(), ExecutionError> {
            self.state.lock().unwrap().terminate_calls += 1;
            Ok(())
        }
    }

    /// Mock launcher handing out pre-built children in order
    pub struct MockProcessLauncher {
        children: Mutex<VecDeque<MockChild>>,
        spawned: Mutex<Vec<String>>,
    }

    impl MockProcessLauncher {
        pub fn new() -> Self {
            Self {
                children: Mutex::new(VecDeque::new()),
                spawned: Mutex::new(Vec::new()),
            }
        }

        /// Queue a child for the next spawn; returns its state handle
        pub fn push_child(&self, pid: ProcessId) -> Arc<Mutex<MockChildState>> {
            let (child, state) = MockChild::new(pid);
            self.children.lock().unwrap().push_back(child);
            state
        }

        pub fn spawned_commands(&self) -> Vec<String> {
            self.spawned.lock().unwrap().clone()
        }
    }

    impl Default for MockProcessLauncher {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ProcessLauncher for MockProcessLauncher {
        fn spawn(
            &self,
            command: &str,
            _working_dir: &Path,
        ) -> Result<Box<dyn ManagedChild>, ExecutionError> {
            self.spawned.lock().unwrap().push(command.to_string());
            match self.children.lock().unwrap().pop_front() {
                Some(child) => Ok(Box::new(child)),
                None => Err(ExecutionError::SpawnFailed(format!(
                    "no mock child queued for '{}'",
                    command
                ))),
            }
        }
    }
}
