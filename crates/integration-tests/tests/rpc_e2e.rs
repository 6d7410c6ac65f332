//! JSON-RPC End-to-End Tests
//!
//! Starts the server on an ephemeral port and talks to it over HTTP.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use deskctl_api_rpc::error::code;
use deskctl_api_rpc::{RpcServer, RpcServerConfig};
use deskctl_core::application::{ShellConfig, ShellService};
use deskctl_core::port::system_control::mocks::MockSystemControl;
use deskctl_infra_system::{SysinfoResourceProbe, TokioProcessLauncher};
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::server::ServerHandle;
use serde_json::Value;

async fn start_server(allow_restart: bool) -> (HttpClient, ServerHandle, Arc<MockSystemControl>) {
    let system_control = Arc::new(MockSystemControl::new());
    let service = ShellService::new(
        Arc::new(TokioProcessLauncher::new("/bin/sh")),
        Arc::new(SysinfoResourceProbe::new()),
        system_control.clone(),
        ShellConfig {
            working_dir: std::env::temp_dir(),
            default_timeout: Duration::from_secs(5),
            drain_grace: Duration::from_millis(200),
            allow_restart,
        },
    );

    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (addr, handle) = RpcServer::new(config, service).start().await.unwrap();

    let client = HttpClientBuilder::default()
        .build(format!("http://{}", addr))
        .unwrap();

    (client, handle, system_control)
}

fn params(pairs: &[(&str, Value)]) -> ObjectParams {
    let mut params = ObjectParams::new();
    for (name, value) in pairs {
        params.insert(name, value.clone()).unwrap();
    }
    params
}

fn error_code(err: ClientError) -> i32 {
    match err {
        ClientError::Call(obj) => obj.code(),
        other => panic!("Expected call error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_command_round_trip() {
    let (client, handle, _) = start_server(false).await;

    let result: Value = client
        .request(
            "bash.command.v1",
            params(&[("command", "echo hello".into())]),
        )
        .await
        .unwrap();

    assert_eq!(result["status"], "completed");
    assert_eq!(result["output"], "hello\n");
    assert_eq!(result["process_id"], Value::Null);

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_background_job_lifecycle() {
    let (client, handle, _) = start_server(false).await;

    let started: Value = client
        .request(
            "bash.command.v1",
            params(&[("command", "sleep 30".into()), ("timeout_secs", 1.into())]),
        )
        .await
        .unwrap();
    assert_eq!(started["status"], "background");
    let pid = started["process_id"].as_u64().unwrap();

    let listed: Vec<Value> = client
        .request("bash.processes.v1", ObjectParams::new())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["pid"].as_u64(), Some(pid));
    assert_eq!(listed[0]["status"], "running");

    let output: Value = client
        .request("bash.output.v1", params(&[("pid", pid.into())]))
        .await
        .unwrap();
    assert_eq!(output["status"], "background");
    assert_eq!(output["process_id"].as_u64(), Some(pid));

    let terminated: Value = client
        .request("bash.terminate.v1", params(&[("pid", pid.into())]))
        .await
        .unwrap();
    assert_eq!(terminated["terminated"], true);

    let err = client
        .request::<Value, _>("bash.output.v1", params(&[("pid", pid.into())]))
        .await
        .unwrap_err();
    assert_eq!(error_code(err), code::NOT_FOUND);

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_failed_command_carries_stderr() {
    let (client, handle, _) = start_server(false).await;

    let err = client
        .request::<Value, _>(
            "bash.command.v1",
            params(&[("command", "echo nope >&2; exit 4".into())]),
        )
        .await
        .unwrap_err();

    match err {
        ClientError::Call(obj) => {
            assert_eq!(obj.code(), code::COMMAND_FAILED);
            let data: Value = serde_json::from_str(obj.data().unwrap().get()).unwrap();
            assert_eq!(data["exit_code"], 4);
            assert_eq!(data["stderr"], "nope\n");
        }
        other => panic!("Expected call error, got {:?}", other),
    }

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_restart_is_gated() {
    let (client, handle, _) = start_server(false).await;
    let err = client
        .request::<Value, _>("system.restart.v1", ObjectParams::new())
        .await
        .unwrap_err();
    assert_eq!(error_code(err), code::FORBIDDEN);
    handle.stop().unwrap();

    let (client, handle, system_control) = start_server(true).await;
    let accepted: Value = client
        .request("system.restart.v1", ObjectParams::new())
        .await
        .unwrap();
    assert_eq!(accepted["accepted"], true);
    assert_eq!(system_control.reboot_count(), 1);
    handle.stop().unwrap();
}
