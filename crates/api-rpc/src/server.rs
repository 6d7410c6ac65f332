//! JSON-RPC Server
//!
//! Implements the JSON-RPC 2.0 server over TCP bound to localhost.

use crate::handler::RpcHandler;
use crate::types::{CommandRequest, ListProcessesRequest, ProcessRequest, RestartRequest};
use deskctl_core::application::ShellService;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9527;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, service: ShellService) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(service)),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (useful with port 0) and the stop handle.
    /// Anyone who can reach the port can run commands as the daemon user, so
    /// keep the host on loopback.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        // Register methods
        let handler = self.handler.clone();
        module
            .register_async_method("bash.command.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CommandRequest = params.parse()?;
                    handler.command(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("bash.output.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ProcessRequest = params.parse()?;
                    handler.output(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("bash.terminate.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ProcessRequest = params.parse()?;
                    handler.terminate(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("bash.processes.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    // Params may be omitted entirely
                    let req = params
                        .parse::<Option<ListProcessesRequest>>()?
                        .unwrap_or_default();
                    handler.processes(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // Privileged
        let handler = self.handler.clone();
        module
            .register_async_method("system.restart.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req = params
                        .parse::<Option<RestartRequest>>()?
                        .unwrap_or_default();
                    handler.restart(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!(addr = %local_addr, "JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}
