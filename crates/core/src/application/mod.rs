// Application Layer - Use Cases and Business Logic

pub mod shell;

// Re-exports
pub use shell::{ShellConfig, ShellService};
