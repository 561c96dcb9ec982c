use thiserror::Error;

/// One JSON-RPC call failed on one URL. Recovered locally by retry/fallback.
#[derive(Debug, Error, Clone)]
#[error("rpc call failed at {url} ({method}): {reason}")]
pub struct RpcError {
    pub url: String,
    pub method: String,
    pub reason: String,
}

/// All URLs and retries were exhausted for one call.
#[derive(Debug, Error, Clone)]
#[error("rpc exhausted for {method} across {urls_tried} url(s): {last_reason}")]
pub struct RpcExhausted {
    pub method: String,
    pub urls_tried: usize,
    pub last_reason: String,
}
