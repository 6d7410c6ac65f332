//! Daemon configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `DESKCTL_*`
//! environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use deskctl_core::application::ShellConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "~/.deskctl/config.toml";
const ENV_PREFIX: &str = "DESKCTL";

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub rpc_host: String,
    pub rpc_port: u16,
    /// "pretty" or "json"
    pub log_format: String,
    /// Enables a daily rolling log file in this directory
    pub log_dir: Option<String>,
    pub shell: String,
    pub working_dir: String,
    pub default_timeout_secs: u64,
    pub drain_grace_ms: u64,
    pub allow_restart: bool,
    pub terminate_on_exit: bool,
}

impl DaemonConfig {
    /// Load from `DESKCTL_CONFIG` (or the default path) and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("DESKCTL_CONFIG")
            .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_CONFIG_PATH).into_owned());

        let builder = Self::defaults()?
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("rpc_host", "127.0.0.1")?
            .set_default("rpc_port", 9527)?
            .set_default("log_format", "pretty")?
            .set_default("shell", "/bin/sh")?
            .set_default("working_dir", "~")?
            .set_default("default_timeout_secs", 15)?
            .set_default("drain_grace_ms", 500)?
            .set_default("allow_restart", false)?
            .set_default("terminate_on_exit", true)?)
    }

    /// Working directory with `~` expanded
    pub fn working_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.working_dir).into_owned())
    }

    pub fn shell_config(&self) -> ShellConfig {
        ShellConfig {
            working_dir: self.working_dir(),
            default_timeout: Duration::from_secs(self.default_timeout_secs),
            drain_grace: Duration::from_millis(self.drain_grace_ms),
            allow_restart: self.allow_restart,
        }
    }
}
