// Privileged host control
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use deskctl_core::port::{ExecutionError, SystemControl};

/// Reboots the host through `sudo reboot`
///
/// Requires passwordless sudo for `reboot`; `-n` makes sudo fail instead of
/// prompting.
pub struct SudoRebootControl;

#[async_trait]
impl SystemControl for SudoRebootControl {
    async fn reboot(&self) -> Result<(), ExecutionError> {
        info!("Invoking sudo reboot");

        let output = Command::new("sudo")
            .args(["-n", "reboot"])
            .output()
            .await
            .map_err(|e| ExecutionError::SpawnFailed(format!("sudo: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(exit_code = ?output.status.code(), stderr = %stderr, "Reboot command failed");
            return Err(ExecutionError::IoError(format!("reboot failed: {}", stderr)));
        }

        Ok(())
    }
}
