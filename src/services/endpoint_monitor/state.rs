use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active,
    Failed,
    Unknown,
}

/// One (endpoint, chainId) pair's probe history. Exclusively owned by the
/// RPC endpoint monitor; other monitors read snapshots (§3 Ownership).
#[derive(Debug, Clone)]
pub struct EndpointState {
    pub url: String,
    pub chain_id: u64,
    pub last_latency_ms: Option<i64>,
    pub last_seen_block_height: Option<u64>,
    pub status: Status,
    pub last_probe_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl EndpointState {
    pub fn new(url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            url: url.into(),
            chain_id,
            last_latency_ms: None,
            last_seen_block_height: None,
            status: Status::Unknown,
            last_probe_at: None,
            last_success_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EndpointStatusSnapshot {
    pub url: String,
    pub chain_id: u64,
    pub status: Status,
    pub latency_ms: Option<i64>,
    pub block_height: Option<u64>,
}

impl From<&EndpointState> for EndpointStatusSnapshot {
    fn from(state: &EndpointState) -> Self {
        Self {
            url: state.url.clone(),
            chain_id: state.chain_id,
            status: state.status,
            latency_ms: state.last_latency_ms,
            block_height: state.last_seen_block_height,
        }
    }
}
