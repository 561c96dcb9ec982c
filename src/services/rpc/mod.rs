pub mod client;
pub mod error;
pub mod jsonrpc;
pub mod ws_probe;

pub use client::{clamp_latency_ms, timed, RpcClient, RpcClientConfig, SharedRpcClient};
pub use error::{RpcError, RpcExhausted};
pub use ws_probe::probe_websocket;
