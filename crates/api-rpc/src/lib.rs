//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 server for the deskctl shell job manager.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
