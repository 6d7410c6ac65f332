//! deskctl CLI - Command-line client for the deskctl daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9527";

#[derive(Parser)]
#[command(name = "deskctl")]
#[command(about = "Run and manage shell jobs on a deskctl daemon", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "DESKCTL_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a shell command
    Run {
        /// Command line passed to the daemon's shell
        command: String,

        /// Seconds to wait before the job is moved to the background
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Read output of a background job
    Output {
        /// Process ID
        pid: u32,
    },

    /// Terminate a background job and its process group
    Kill {
        /// Process ID
        pid: u32,
    },

    /// List managed background jobs
    Ps,

    /// Reboot the host (must be enabled on the daemon)
    Restart {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CommandResult {
    output: Option<String>,
    process_id: Option<u32>,
    status: String,
}

#[derive(Deserialize, Tabled)]
struct ProcessRow {
    pid: u32,
    command: String,
    status: String,
    #[tabled(display_with = "percent")]
    cpu_percent: f32,
    #[tabled(display_with = "percent")]
    memory_percent: f32,
    created_at: String,
}

fn percent(value: &f32) -> String {
    format!("{:.1}%", value)
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        // Failed commands carry their stderr in `data`
        if let Some(stderr) = error
            .data
            .as_ref()
            .and_then(|d| d.get("stderr"))
            .and_then(|s| s.as_str())
        {
            eprint!("{}", stderr);
        }
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

/// Pid of a job that is still running in the background
fn background_pid(result: &CommandResult) -> Option<u32> {
    match (result.status.as_str(), result.process_id) {
        ("background", Some(pid)) => Some(pid),
        _ => None,
    }
}

fn print_command_result(result: CommandResult) {
    if let Some(output) = &result.output {
        print!("{}", output);
    }

    if let Some(pid) = background_pid(&result) {
        println!(
            "{}",
            format!("→ Running in background (pid {})", pid).yellow().bold()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { command, timeout } => {
            let params = json!({
                "command": command,
                "timeout_secs": timeout,
            });

            let result = call_rpc(&cli.rpc_url, "bash.command.v1", params).await?;
            print_command_result(serde_json::from_value(result)?);
        }

        Commands::Output { pid } => {
            let result = call_rpc(&cli.rpc_url, "bash.output.v1", json!({ "pid": pid })).await?;
            let result: CommandResult = serde_json::from_value(result)?;

            let completed = result.status == "completed";
            print_command_result(result);
            if completed {
                println!("{}", format!("✓ Process {} completed", pid).green().bold());
            }
        }

        Commands::Kill { pid } => {
            call_rpc(&cli.rpc_url, "bash.terminate.v1", json!({ "pid": pid })).await?;

            println!("{}", format!("✓ Process {} terminated", pid).green().bold());
        }

        Commands::Ps => {
            let result = call_rpc(&cli.rpc_url, "bash.processes.v1", json!({})).await?;
            let rows: Vec<ProcessRow> = serde_json::from_value(result)?;

            if rows.is_empty() {
                println!("{}", "No background processes".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Restart { yes } => {
            if !yes {
                anyhow::bail!("Refusing to reboot without --yes");
            }

            call_rpc(&cli.rpc_url, "system.restart.v1", json!({})).await?;

            println!("{}", "✓ Reboot requested".green().bold());
        }
    }

    Ok(())
}
