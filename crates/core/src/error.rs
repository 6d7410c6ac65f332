// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Command exited with a nonzero status (or was killed by a signal)
    #[error("Command failed: {stderr}")]
    CommandFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Execution error: {0}")]
    Execution(#[from] crate::port::ExecutionError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn process_not_found(pid: u32) -> Self {
        AppError::NotFound(format!("Process {} not found", pid))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
