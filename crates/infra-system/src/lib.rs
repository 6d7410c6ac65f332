// deskctl Infrastructure - System Adapters
// Implements: ProcessLauncher, ResourceProbe, SystemControl

pub mod process_launcher;
pub mod resource_probe_impl;
pub mod system_control_impl;

pub use process_launcher::{TokioChild, TokioProcessLauncher};
pub use resource_probe_impl::SysinfoResourceProbe;
pub use system_control_impl::SudoRebootControl;
