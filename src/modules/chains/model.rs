use serde::{Deserialize, Serialize};

/// Kind of JSON-RPC surface an endpoint exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    HttpRpc,
    EnhancedRpc,
    Websocket,
}

/// A single configured RPC/WS endpoint for a chain. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEndpoint {
    pub url: String,
    pub name: String,
    pub kind: EndpointKind,
    pub chain_id: u64,
    /// Only probed when the runtime toggle it depends on is enabled.
    pub conditional: bool,
}

impl RpcEndpoint {
    pub fn new(url: impl Into<String>, name: impl Into<String>, kind: EndpointKind, chain_id: u64) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            kind,
            chain_id,
            conditional: false,
        }
    }

    pub fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }
}

/// Static description of a monitored chain. Owned by the configuration
/// provider, shared read-only by every monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub chain_id: u64,
    pub display_name: String,
    pub target_block_time_seconds: u64,
    pub endpoints: Vec<RpcEndpoint>,
}

impl ChainDescriptor {
    pub fn enabled_endpoints(&self, conditionals_enabled: bool) -> Vec<&RpcEndpoint> {
        self.endpoints
            .iter()
            .filter(|e| !e.conditional || conditionals_enabled)
            .collect()
    }
}
