mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeMetricsTransport;
use xdc_monitor::modules::chains::{ChainDescriptor, EndpointKind, RpcEndpoint};
use xdc_monitor::services::alerts::{AlertRouter, ThrottleConfig};
use xdc_monitor::services::block_monitor::BlockMonitor;
use xdc_monitor::services::consensus_monitor::ConsensusMonitor;
use xdc_monitor::services::endpoint_monitor::RpcEndpointMonitor;
use xdc_monitor::services::metrics::{MetricsSink, MetricsSinkConfig};
use xdc_monitor::services::scheduler::Scheduler;

fn chain(url: String) -> ChainDescriptor {
    ChainDescriptor {
        chain_id: 51,
        display_name: "apothem".to_string(),
        target_block_time_seconds: 2,
        endpoints: vec![RpcEndpoint::new(url, "e1", EndpointKind::HttpRpc, 51)],
    }
}

/// Exercises the §4.9 startup order end to end: metrics sink warm-up runs
/// before any monitor tick fires, and every monitor's periodic tick is its
/// own task that the scheduler joins cleanly on shutdown.
#[tokio::test]
async fn full_monitor_set_starts_in_order_and_shuts_down_cleanly() {
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0", "id": 1, "result": "0x1"
        })))
        .mount(&server)
        .await;

    let transport = Arc::new(FakeMetricsTransport::new());
    let sink = Arc::new(MetricsSink::new(
        transport.clone(),
        MetricsSinkConfig { startup_delay: Duration::from_millis(1), flush_interval: Duration::from_millis(10), ..Default::default() },
    ));

    let chains = vec![chain(server.uri())];
    let endpoint_monitor = Arc::new(RpcEndpointMonitor::new(chains.clone(), false, sink.clone()));
    let alerts = Arc::new(AlertRouter::new(vec![], 1000, ThrottleConfig::default()));
    let block_monitor = Arc::new(BlockMonitor::new(chains.clone(), endpoint_monitor.clone(), sink.clone(), alerts.clone(), 2));
    let consensus_monitor = Arc::new(ConsensusMonitor::new(chains, sink.clone(), alerts));

    let scheduler = Scheduler::start(
        &[(51, vec![server.uri()])],
        sink.clone(),
        Duration::from_millis(20),
        Some(endpoint_monitor),
        Some(block_monitor),
        Some((consensus_monitor, Duration::from_millis(20))),
    )
    .await;

    // By the time `start` returns, startup (including the reconnect probe
    // write) has already happened, ahead of any monitor tick.
    assert!(transport.written_count() >= 1);

    tokio::time::sleep(Duration::from_millis(60)).await;
    scheduler.shutdown_with_deadline(sink, Duration::from_millis(200)).await;
}
