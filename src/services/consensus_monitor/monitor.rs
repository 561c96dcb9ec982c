use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio_util::sync::CancellationToken;

use crate::modules::chains::ChainDescriptor;
use crate::services::alerts::{AlertOptions, AlertRouter, Category, Severity};
use crate::services::block_monitor::RawBlock;
use crate::services::metrics::{MetricsSink, MetricsTransport};
use crate::services::rpc::{RpcClient, RpcClientConfig};

use super::masternode::skipped_count;
use super::missed_round::{MissedRoundsReport, TimeoutAnalysis};
use super::performance::MinerPerformanceRecord;

fn to_hex(n: u64) -> String {
    format!("0x{n:x}")
}

/// Observes the round-robin miner sequence for one or more chains (§4.8).
pub struct ConsensusMonitor<T: MetricsTransport> {
    chains: Vec<ChainDescriptor>,
    sink: Arc<MetricsSink<T>>,
    alerts: Arc<AlertRouter>,
    rpc_config: RpcClientConfig,
    performance: tokio::sync::Mutex<HashMap<(u64, String), MinerPerformanceRecord>>,
}

impl<T: MetricsTransport + 'static> ConsensusMonitor<T> {
    pub fn new(chains: Vec<ChainDescriptor>, sink: Arc<MetricsSink<T>>, alerts: Arc<AlertRouter>) -> Self {
        Self {
            chains,
            sink,
            alerts,
            rpc_config: RpcClientConfig::block_fetch(),
            performance: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub async fn tick(&self) {
        for chain in &self.chains {
            self.tick_chain(chain).await;
        }
    }

    async fn tick_chain(&self, chain: &ChainDescriptor) {
        let Some(endpoint) = chain.endpoints.first() else {
            return;
        };
        let client = RpcClient::new(endpoint.url.clone(), self.rpc_config.clone());

        let latest: Result<RawBlock, _> = client.call("eth_getBlockByNumber", serde_json::json!(["latest", true])).await;
        let latest = match latest {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(chain_id = chain.chain_id, error = %e.last_reason, "consensus monitor could not read latest block");
                return;
            }
        };
        let Some(observation) = latest.into_observation() else {
            return;
        };

        if let Some(miner) = observation.miner.clone() {
            self.record_mined(chain.chain_id, &miner, observation.block_number).await;
        }

        let masternodes: Vec<String> = match client.call("XDPoS_getMasternodesByNumber", serde_json::json!([to_hex(observation.block_number)])).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(chain_id = chain.chain_id, error = %e.last_reason, "could not read masternode list, skipping missed-round analysis");
                return;
            }
        };

        let report: MissedRoundsReport = match client
            .call("XDPoS_getMissedRoundsInEpochByBlockNum", serde_json::json!([to_hex(observation.block_number)]))
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(chain_id = chain.chain_id, error = %e.last_reason, "could not read missed rounds");
                return;
            }
        };

        for missed in report.missed {
            self.handle_missed_round(chain, &client, &masternodes, missed).await;
        }
    }

    async fn handle_missed_round(&self, chain: &ChainDescriptor, client: &RpcClient, masternodes: &[String], missed: super::missed_round::MissedRound) {
        let chain_id = chain.chain_id;

        let Some(skipped) = skipped_count(masternodes, &missed.expected_miner, &missed.actual_miner) else {
            tracing::warn!(chain_id, round = missed.round, "missed round references an unknown masternode, skipping");
            return;
        };

        let before: Result<RawBlock, _> = client
            .call("eth_getBlockByNumber", serde_json::json!([to_hex(missed.block_number.saturating_sub(1)), true]))
            .await;
        let after: Result<RawBlock, _> = client.call("eth_getBlockByNumber", serde_json::json!([to_hex(missed.block_number), true])).await;

        let (Ok(before), Ok(after)) = (before, after) else {
            tracing::warn!(chain_id, round = missed.round, "could not fetch surrounding blocks for missed round");
            return;
        };
        let (Some(before), Some(after)) = (before.into_observation(), after.into_observation()) else {
            return;
        };

        let actual_seconds = (after.timestamp - before.timestamp) as f64;
        let analysis = TimeoutAnalysis::compute(skipped, actual_seconds);

        self.sink.consensus_missed_rounds(chain_id, missed.block_number, missed.round, 1).await;
        self.sink
            .consensus_timeout_periods(
                chain_id,
                missed.block_number,
                missed.round,
                analysis.expected_seconds,
                analysis.actual_seconds,
                analysis.variance_seconds,
                analysis.consistent,
            )
            .await;

        let crossed_ten = {
            let mut performance = self.performance.lock().await;
            let record = performance.entry((chain_id, missed.expected_miner.clone())).or_default();
            record.record_missed();
            let missed_count = record.missed;
            self.sink.consensus_miner_missed_rounds(chain_id, &missed.expected_miner, missed_count).await;
            record.crossed_miss_multiple_of_ten()
        };

        if !analysis.consistent {
            let message = format!(
                "chain {chain_id}: round {} timeout variance {:.1}s (expected {:.1}s, actual {:.1}s)",
                missed.round, analysis.variance_seconds, analysis.expected_seconds, analysis.actual_seconds
            );
            let options = AlertOptions::new(Severity::Warning, Category::Consensus, "consensus-monitor", "unusual timeout", message)
                .metadata("chain_id", chain_id.to_string())
                .metadata("round", missed.round.to_string());
            self.submit_alert(options).await;
        }

        if crossed_ten {
            let message = format!("chain {chain_id}: miner {} has missed 10 more rounds", missed.expected_miner);
            let options = AlertOptions::new(Severity::Warning, Category::Consensus, "consensus-monitor", "frequent miss", message)
                .metadata("chain_id", chain_id.to_string())
                .metadata("miner", missed.expected_miner.clone());
            self.submit_alert(options).await;
        }
    }

    async fn record_mined(&self, chain_id: u64, miner: &str, block_number: u64) {
        let (mined, missed) = {
            let mut performance = self.performance.lock().await;
            let record = performance.entry((chain_id, miner.to_string())).or_default();
            record.record_mined(block_number);
            (record.mined, record.missed)
        };
        let total = mined + missed;
        let success_rate = if total == 0 { 0.0 } else { (mined as f64 / total as f64) * 100.0 };
        self.sink.consensus_miner_performance(chain_id, miner, mined, missed, success_rate).await;
    }

    async fn submit_alert(&self, options: AlertOptions) -> bool {
        match self.alerts.submit(options).await {
            Some(alert) => {
                self.sink.alert_count(alert.severity.as_str(), alert.category.as_str(), 1).await;
                self.sink
                    .alert_history(alert.severity.as_str(), alert.category.as_str(), &alert.component, &alert.title, &alert.message)
                    .await;
                true
            }
            None => false,
        }
    }

    pub async fn run(self: Arc<Self>, interval: StdDuration, cancel: CancellationToken) {
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
    use crate::modules::chains::{EndpointKind, RpcEndpoint};
    use crate::services::metrics::{Measurement, MetricsSinkConfig, TransportError};
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

    fn masternodes() -> Vec<String> {
        (0..10).map(|i| format!("M{i}")).collect()
    }

    fn block(number: u64, timestamp: u64, miner: &str, round: u64) -> serde_json::Value {
        serde_json::json!({
            "jsonrpc": "2.0", "id": 1,
            "result": {
                "number": format!("0x{:x}", number),
                "timestamp": format!("0x{:x}", timestamp),
                "transactions": [],
                "miner": miner,
                "round": format!("0x{:x}", round),
            }
        })
    }

    #[tokio::test]
    async fn scenario_e_missed_round_emits_unusual_timeout_alert() {
        let server = MockServer::start().await;
        let masternode_list = masternodes();

        Mock::given(method("POST"))
            .respond_with(move |req: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                match body["method"].as_str().unwrap() {
                    "eth_getBlockByNumber" => {
                        let param = body["params"][0].as_str().unwrap();
                        match param {
                            "0x64" => ResponseTemplate::new(200).set_body_json(block(100, 29, "M3", 7)),
                            "0x63" => ResponseTemplate::new(200).set_body_json(block(99, 0, "M4", 6)),
                            _ => ResponseTemplate::new(200).set_body_json(block(100, 29, "M3", 7)),
                        }
                    }
                    "XDPoS_getMasternodesByNumber" => ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "jsonrpc": "2.0", "id": 1, "result": masternode_list
                    })),
                    "XDPoS_getMissedRoundsInEpochByBlockNum" => ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "jsonrpc": "2.0", "id": 1,
                        "result": { "missed": [{ "round": 7, "blockNumber": 100, "expectedMiner": "M5", "actualMiner": "M3" }] }
                    })),
                    _ => ResponseTemplate::new(404),
                }
            })
            .mount(&server)
            .await;

        let chain = ChainDescriptor {
            chain_id: 51,
            display_name: "test".to_string(),
            target_block_time_seconds: 2,
            endpoints: vec![RpcEndpoint::new(server.uri(), "e1", EndpointKind::HttpRpc, 51)],
        };

        let sink = Arc::new(MetricsSink::new(Arc::new(NullTransport), MetricsSinkConfig::default()));
        let channels: Vec<Arc<dyn crate::services::alerts::NotificationChannel>> = vec![];
        let alerts = Arc::new(AlertRouter::new(channels, 1000, crate::services::alerts::ThrottleConfig::default()));

        let monitor = ConsensusMonitor::new(vec![chain], sink.clone(), alerts.clone());
        monitor.tick().await;

        let found = alerts.query(crate::services::alerts::AlertFilter::default()).await;
        assert!(found.iter().any(|a| a.title == "unusual timeout"));
        assert_eq!(sink.buffer_len().await > 0, true);
    }
}
