use crate::modules::chains::{ChainDescriptor, EndpointKind, RpcEndpoint};

/// Compiled-in chain topology. Unlike per-tenant RPC credentials, the set of
/// chains this service watches does not vary per deployment secret, so it is
/// a static table rather than a parsed config file.
pub fn default_chains() -> Vec<ChainDescriptor> {
    vec![
        ChainDescriptor {
            chain_id: 50,
            display_name: "XDC Mainnet".to_string(),
            target_block_time_seconds: 2,
            endpoints: vec![
                RpcEndpoint::new(
                    "https://rpc.xinfin.network",
                    "xinfin-rpc-1",
                    EndpointKind::HttpRpc,
                    50,
                ),
                RpcEndpoint::new(
                    "https://erpc.xinfin.network",
                    "xinfin-erpc-1",
                    EndpointKind::EnhancedRpc,
                    50,
                ),
                RpcEndpoint::new(
                    "wss://ws.xinfin.network",
                    "xinfin-ws-1",
                    EndpointKind::Websocket,
                    50,
                )
                .conditional(),
            ],
        },
        ChainDescriptor {
            chain_id: 51,
            display_name: "XDC Apothem Testnet".to_string(),
            target_block_time_seconds: 2,
            endpoints: vec![
                RpcEndpoint::new(
                    "https://rpc.apothem.network",
                    "apothem-rpc-1",
                    EndpointKind::HttpRpc,
                    51,
                ),
                RpcEndpoint::new(
                    "https://erpc.apothem.network",
                    "apothem-erpc-1",
                    EndpointKind::EnhancedRpc,
                    51,
                ),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chains_cover_mainnet_and_testnet() {
        let chains = default_chains();
        let ids: Vec<u64> = chains.iter().map(|c| c.chain_id).collect();
        assert_eq!(ids, vec![50, 51]);
    }

    #[test]
    fn conditional_endpoint_excluded_unless_enabled() {
        let chains = default_chains();
        let mainnet = chains.iter().find(|c| c.chain_id == 50).unwrap();
        assert_eq!(mainnet.enabled_endpoints(false).len(), 2);
        assert_eq!(mainnet.enabled_endpoints(true).len(), 3);
    }
}
