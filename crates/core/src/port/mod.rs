// Port Layer - Interfaces for external dependencies

pub mod process;
pub mod resource_probe;
pub mod system_control;

// Re-exports
pub use process::{DrainedOutput, ExecutionError, ManagedChild, ProcessLauncher};
pub use resource_probe::{ResourceProbe, ResourceUsage};
pub use system_control::SystemControl;
