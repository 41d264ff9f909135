pub mod config;
pub mod errors;
pub mod gossip;
pub mod peers;
pub mod rpc;

#[cfg(test)]
mod tests;

pub use config::NetworkConfig;
pub use errors::{ConfigError, PeerSelectionError, RpcErrorCode, RpcException, RpcFailure};
