//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use deskctl_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use serde_json::json;

/// RPC Error Codes
pub mod code {
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const FORBIDDEN: i32 = 4003;
    pub const COMMAND_FAILED: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SYSTEM_ERROR: i32 = 5002;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::NotFound(msg) => ErrorObjectOwned::owned(code::NOT_FOUND, msg, None::<()>),
        AppError::CommandFailed { exit_code, stderr } => ErrorObjectOwned::owned(
            code::COMMAND_FAILED,
            format!("Command failed: {}", stderr),
            Some(json!({ "exit_code": exit_code, "stderr": stderr })),
        ),
        AppError::Conflict(msg) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
        AppError::Forbidden(msg) => ErrorObjectOwned::owned(code::FORBIDDEN, msg, None::<()>),
        AppError::Execution(e) => {
            ErrorObjectOwned::owned(code::SYSTEM_ERROR, e.to_string(), None::<()>)
        }
        AppError::Internal(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
    }
}
