// bacreg-api: Async Rust client for the platform JSON-RPC endpoint and discovery streams

pub mod error;
pub mod rpc;
pub mod stream;
pub mod transport;

pub use error::Error;
pub use rpc::RpcClient;
pub use stream::{AnnouncementStream, Channel, ReconnectConfig};
pub use transport::{TlsMode, TransportConfig};
