// Domain Layer - Pure business logic and entities

pub mod job;
pub mod output;

// Re-exports
pub use job::{CommandOutcome, JobOutput, JobStatus, ManagedProcess, ProcessId};
pub use output::{complete_utf8_len, decode_lossy};
