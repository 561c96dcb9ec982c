use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::modules::chains::ChainDescriptor;
use crate::services::metrics::MetricsSink;
use crate::services::probe::ProbeOutcome;
use crate::services::rpc::{timed, RpcClient, RpcClientConfig};

use super::state::{EndpointState, EndpointStatusSnapshot, Status};

/// Probes every configured endpoint of every enabled chain on a fixed
/// interval, in parallel with per-endpoint error isolation (§4.6).
pub struct RpcEndpointMonitor<T: crate::services::metrics::MetricsTransport> {
    chains: Vec<ChainDescriptor>,
    conditionals_enabled: bool,
    sink: Arc<MetricsSink<T>>,
    states: RwLock<HashMap<(u64, String), EndpointState>>,
    probe_config: RpcClientConfig,
}

impl<T: crate::services::metrics::MetricsTransport + 'static> RpcEndpointMonitor<T> {
    pub fn new(chains: Vec<ChainDescriptor>, conditionals_enabled: bool, sink: Arc<MetricsSink<T>>) -> Self {
        let mut states = HashMap::new();
        for chain in &chains {
            for endpoint in chain.enabled_endpoints(conditionals_enabled) {
                states.insert((chain.chain_id, endpoint.url.clone()), EndpointState::new(&endpoint.url, chain.chain_id));
            }
        }

        Self {
            chains,
            conditionals_enabled,
            sink,
            states: RwLock::new(states),
            probe_config: RpcClientConfig::probe(),
        }
    }

    pub async fn all_statuses(&self) -> Vec<EndpointStatusSnapshot> {
        self.states.read().await.values().map(EndpointStatusSnapshot::from).collect()
    }

    pub async fn statuses_for_chain(&self, chain_id: u64) -> Vec<EndpointStatusSnapshot> {
        self.states
            .read()
            .await
            .values()
            .filter(|s| s.chain_id == chain_id)
            .map(EndpointStatusSnapshot::from)
            .collect()
    }

    pub async fn tick(&self) {
        let probes = self.chains.iter().flat_map(|chain| {
            chain
                .enabled_endpoints(self.conditionals_enabled)
                .into_iter()
                .map(move |endpoint| self.probe_one(chain.chain_id, endpoint))
        });

        join_all(probes).await;
    }

    async fn probe_one(&self, chain_id: u64, endpoint: &crate::modules::chains::RpcEndpoint) {
        use crate::modules::chains::EndpointKind;

        let outcome = match endpoint.kind {
            EndpointKind::Websocket => {
                let result = crate::services::rpc::probe_websocket(&endpoint.url, std::time::Duration::from_secs(3)).await;
                match result {
                    Ok(latency_ms) => {
                        self.sink.websocket_status(chain_id, &endpoint.name, true).await;
                        ProbeOutcome::Ok((latency_ms, None))
                    }
                    Err(reason) => {
                        self.sink.websocket_status(chain_id, &endpoint.name, false).await;
                        ProbeOutcome::Unreachable(reason)
                    }
                }
            }
            EndpointKind::HttpRpc | EndpointKind::EnhancedRpc => {
                let client = RpcClient::new(&endpoint.url, self.probe_config.clone());
                let (result, latency_ms) = timed(client.call::<String>("eth_blockNumber", serde_json::json!([]))).await;
                match result {
                    Ok(hex_height) => {
                        let height = u64::from_str_radix(hex_height.trim_start_matches("0x"), 16).ok();
                        ProbeOutcome::Ok((latency_ms, height))
                    }
                    Err(exhausted) => ProbeOutcome::Unreachable(exhausted.last_reason),
                }
            }
        };

        self.record(chain_id, &endpoint.url, &endpoint.name, outcome).await;
    }

    async fn record(&self, chain_id: u64, url: &str, name: &str, outcome: ProbeOutcome<(i64, Option<u64>)>) {
        let now = chrono::Utc::now();
        let mut states = self.states.write().await;
        let state = states
            .entry((chain_id, url.to_string()))
            .or_insert_with(|| EndpointState::new(url, chain_id));
        state.last_probe_at = Some(now);

        match &outcome {
            ProbeOutcome::Ok((latency_ms, height)) => {
                state.status = Status::Active;
                state.last_latency_ms = Some(*latency_ms);
                state.last_success_at = Some(now);
                if let Some(h) = height {
                    state.last_seen_block_height = Some(*h);
                }
                self.sink.rpc_status(chain_id, name, true).await;
                self.sink.rpc_latency(chain_id, name, ProbeOutcome::Ok(*latency_ms)).await;
                match height {
                    Some(h) => self.sink.block_height(chain_id, name, ProbeOutcome::Ok(*h)).await,
                    None => self.sink.block_height(chain_id, name, ProbeOutcome::Unreachable("no block height in probe response".to_string())).await,
                }
            }
            ProbeOutcome::Unreachable(reason) => {
                state.status = Status::Failed;
                tracing::debug!(chain_id, endpoint = name, error = %reason, "endpoint probe failed");
                self.sink.rpc_status(chain_id, name, false).await;
                self.sink.rpc_latency(chain_id, name, ProbeOutcome::Unreachable(reason.clone())).await;
                self.sink.block_height(chain_id, name, ProbeOutcome::Unreachable(reason.clone())).await;
            }
        }
    }

    pub async fn run(self: Arc<Self>, interval: std::time::Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::chains::{ChainDescriptor, EndpointKind, RpcEndpoint};
    use crate::services::metrics::{Measurement, MetricsSinkConfig, MetricsTransport, TransportError};
    use std::sync::Mutex as StdMutex;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NullTransport;

    #[async_trait::async_trait]
    impl MetricsTransport for NullTransport {
        async fn write_batch(&self, _measurements: &[Measurement]) -> Result<(), TransportError> {
            Ok(())
        }

        async fn query_last_block_height(&self, _chain_id: u64, _endpoint: &str, _lookback: chrono::Duration) -> Result<Option<u64>, TransportError> {
            Ok(None)
        }
    }

    struct RecordingTransport {
        written: StdMutex<Vec<Measurement>>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self { written: StdMutex::new(Vec::new()) }
        }
    }

    #[async_trait::async_trait]
    impl MetricsTransport for RecordingTransport {
        async fn write_batch(&self, measurements: &[Measurement]) -> Result<(), TransportError> {
            self.written.lock().unwrap().extend_from_slice(measurements);
            Ok(())
        }

        async fn query_last_block_height(&self, _chain_id: u64, _endpoint: &str, _lookback: chrono::Duration) -> Result<Option<u64>, TransportError> {
            Ok(None)
        }
    }

    fn test_chain(url: String) -> ChainDescriptor {
        ChainDescriptor {
            chain_id: 51,
            display_name: "test".to_string(),
            target_block_time_seconds: 2,
            endpoints: vec![RpcEndpoint::new(url, "e1", EndpointKind::HttpRpc, 51)],
        }
    }

    #[tokio::test]
    async fn successful_probe_marks_endpoint_active_and_stores_height() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 1, "result": "0x2710"
            })))
            .mount(&server)
            .await;

        let sink = Arc::new(MetricsSink::new(Arc::new(NullTransport), MetricsSinkConfig::default()));
        let monitor = RpcEndpointMonitor::new(vec![test_chain(server.uri())], false, sink);

        monitor.tick().await;

        let statuses = monitor.all_statuses().await;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].status, Status::Active);
        assert_eq!(statuses[0].block_height, Some(10000));
    }

    #[tokio::test]
    async fn failed_probe_marks_endpoint_failed_without_aborting_cycle() {
        let monitor_states: StdMutex<()> = StdMutex::new(());
        let _guard = monitor_states.lock().unwrap();

        let sink = Arc::new(MetricsSink::new(Arc::new(NullTransport), MetricsSinkConfig::default()));
        let monitor = RpcEndpointMonitor::new(vec![test_chain("http://127.0.0.1:1".to_string())], false, sink);

        monitor.tick().await;

        let statuses = monitor.all_statuses().await;
        assert_eq!(statuses[0].status, Status::Failed);
    }

    #[tokio::test]
    async fn successful_probe_emits_block_height_measurement() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0", "id": 1, "result": "0x2710"
            })))
            .mount(&server)
            .await;

        let transport = Arc::new(RecordingTransport::new());
        let sink = Arc::new(MetricsSink::new(
            transport.clone(),
            MetricsSinkConfig { buffer_capacity: 1000, ..MetricsSinkConfig::default() },
        ));
        let monitor = RpcEndpointMonitor::new(vec![test_chain(server.uri())], false, sink.clone());

        monitor.tick().await;
        while sink.flush_once().await > 0 {}

        let written = transport.written.lock().unwrap();
        let block_height = written.iter().find(|m| m.name == "block_height").expect("block_height measurement was emitted");
        assert_eq!(
            block_height.fields.get("height"),
            Some(&crate::services::metrics::types::FieldValue::Int(10_000))
        );
    }

    #[tokio::test]
    async fn failed_probe_emits_sentinel_block_height_and_status() {
        let transport = Arc::new(RecordingTransport::new());
        let sink = Arc::new(MetricsSink::new(
            transport.clone(),
            MetricsSinkConfig { buffer_capacity: 1000, ..MetricsSinkConfig::default() },
        ));
        let monitor = RpcEndpointMonitor::new(vec![test_chain("http://127.0.0.1:1".to_string())], false, sink.clone());

        monitor.tick().await;
        while sink.flush_once().await > 0 {}

        let written = transport.written.lock().unwrap();
        assert!(written.iter().any(|m| m.name == "block_height"));
        assert!(written.iter().any(|m| m.name == "rpc_status"));
    }

    #[tokio::test]
    async fn sentinel_disabled_skips_emission_on_unreachable_outcome() {
        let transport = Arc::new(RecordingTransport::new());
        let config = MetricsSinkConfig {
            buffer_capacity: 1000,
            sentinel: crate::services::metrics::SentinelConfig { enabled: false, ..Default::default() },
            ..MetricsSinkConfig::default()
        };
        let sink = Arc::new(MetricsSink::new(transport.clone(), config));
        let monitor = RpcEndpointMonitor::new(vec![test_chain("http://127.0.0.1:1".to_string())], false, sink.clone());

        monitor.tick().await;
        while sink.flush_once().await > 0 {}

        let written = transport.written.lock().unwrap();
        assert!(!written.iter().any(|m| m.name == "block_height"));
        assert!(!written.iter().any(|m| m.name == "rpc_status"));
    }
}
