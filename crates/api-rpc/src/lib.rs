//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 server for the Route Map Engine: submit shipment data, poll
//! job status, fetch rendered maps, plus admin stats and maintenance.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
