//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params to the shell service.

use crate::error::to_rpc_error;
use crate::types::{
    CommandRequest, CommandResponse, ListProcessesRequest, ProcessInfo, ProcessRequest,
    RestartRequest, RestartResponse, TerminateResponse,
};
use deskctl_core::application::ShellService;
use jsonrpsee::types::ErrorObjectOwned;
use std::time::Duration;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: ShellService,
}

impl RpcHandler {
    pub fn new(service: ShellService) -> Self {
        Self { service }
    }

    /// bash.command.v1
    pub async fn command(&self, params: CommandRequest) -> Result<CommandResponse, ErrorObjectOwned> {
        let timeout = params.timeout_secs.map(Duration::from_secs);

        let outcome = self
            .service
            .execute(params.command, timeout)
            .await
            .map_err(to_rpc_error)?;

        Ok(outcome.into())
    }

    /// bash.output.v1
    pub async fn output(&self, params: ProcessRequest) -> Result<CommandResponse, ErrorObjectOwned> {
        let job = self
            .service
            .get_output(params.pid)
            .await
            .map_err(to_rpc_error)?;

        Ok(CommandResponse::from_job_output(params.pid, job))
    }

    /// bash.terminate.v1
    pub async fn terminate(
        &self,
        params: ProcessRequest,
    ) -> Result<TerminateResponse, ErrorObjectOwned> {
        self.service
            .terminate(params.pid)
            .await
            .map_err(to_rpc_error)?;

        Ok(TerminateResponse {
            pid: params.pid,
            terminated: true,
        })
    }

    /// bash.processes.v1
    pub async fn processes(
        &self,
        _params: ListProcessesRequest,
    ) -> Result<Vec<ProcessInfo>, ErrorObjectOwned> {
        let processes = self.service.list_managed().await.map_err(to_rpc_error)?;
        debug!(count = processes.len(), "Listed managed processes");

        Ok(processes.into_iter().map(ProcessInfo::from).collect())
    }

    /// system.restart.v1
    pub async fn restart(
        &self,
        _params: RestartRequest,
    ) -> Result<RestartResponse, ErrorObjectOwned> {
        self.service.restart_system().await.map_err(to_rpc_error)?;

        Ok(RestartResponse { accepted: true })
    }
}
