// JSON-RPC 2.0 client for the platform's `/vc/jsonrpc` endpoint.

mod client;
mod methods;
pub mod models;

pub use client::RpcClient;
pub use models::{AgentConfig, DetailsParams, PointQuery, PublishParams, RpcErrorBody, ScanParams};
