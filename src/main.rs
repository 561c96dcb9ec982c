use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use xdc_monitor::config::{default_chains, ConfigError, Settings};
use xdc_monitor::modules::chains::ChainDescriptor;
use xdc_monitor::services::alerts::{AlertRouter, ChatBotChannel, DashboardChannel, NotificationChannel, ThrottleConfig, WebhookChannel};
use xdc_monitor::services::block_monitor::BlockMonitor;
use xdc_monitor::services::consensus_monitor::ConsensusMonitor;
use xdc_monitor::services::endpoint_monitor::RpcEndpointMonitor;
use xdc_monitor::services::metrics::{HttpMetricsTransport, MetricsSink, MetricsSinkConfig, SentinelConfig};
use xdc_monitor::services::scheduler::Scheduler;

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_channels(settings: &Settings) -> Vec<Arc<dyn NotificationChannel>> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if let Some(url) = &settings.notification_webhook_url {
        channels.push(Arc::new(WebhookChannel::new("webhook", url.clone(), true)));
    }

    if settings.enable_chat_notifications {
        if let (Some(token), Some(chat_id)) = (&settings.chat_bot_token, &settings.chat_bot_channel) {
            channels.push(Arc::new(ChatBotChannel::new(
                "chat-bot",
                "https://api.telegram.org/bot",
                token.clone(),
                chat_id.clone(),
                true,
            )));
        }
    }

    channels.push(Arc::new(DashboardChannel::new("dashboard", settings.enable_dashboard_alerts)));

    channels
}

fn warmup_targets(chains: &[ChainDescriptor]) -> Vec<(u64, Vec<String>)> {
    chains
        .iter()
        .map(|c| (c.chain_id, c.endpoints.iter().map(|e| e.url.clone()).collect()))
        .collect()
}

fn consensus_chains(all: &[ChainDescriptor], ids: &[u64]) -> Vec<ChainDescriptor> {
    if ids.is_empty() {
        all.to_vec()
    } else {
        all.iter().filter(|c| ids.contains(&c.chain_id)).cloned().collect()
    }
}

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&settings.log_level);

    let (metrics_url, metrics_org, metrics_bucket, metrics_token) =
        match (&settings.metrics_url, &settings.metrics_org, &settings.metrics_bucket, &settings.metrics_token) {
            (Some(url), Some(org), Some(bucket), Some(token)) => (url.clone(), org.clone(), bucket.clone(), token.clone()),
            _ => {
                let err = ConfigError::Missing("METRICS_URL, METRICS_ORG, METRICS_BUCKET, METRICS_TOKEN");
                tracing::error!(error = %err, "metrics store is not configured");
                std::process::exit(1);
            }
        };

    let transport = Arc::new(HttpMetricsTransport::new(&metrics_url, &metrics_org, &metrics_bucket, &metrics_token));
    let sink_config = MetricsSinkConfig {
        sentinel: SentinelConfig {
            enabled: settings.enable_sentinel_values,
            peer_count: settings.sentinel_peer_count,
            latency: settings.sentinel_latency,
            status_down: settings.sentinel_status_down,
        },
        ..MetricsSinkConfig::default()
    };
    let sink = Arc::new(MetricsSink::new(transport, sink_config));

    let chains = default_chains();
    let channels = build_channels(&settings);
    let alerts = Arc::new(AlertRouter::new(channels, 1000, ThrottleConfig::default()));

    let endpoint_monitor = Arc::new(RpcEndpointMonitor::new(chains.clone(), settings.enable_port_monitoring, sink.clone()));

    let block_monitor = if settings.enable_block_monitoring {
        Some(Arc::new(
            BlockMonitor::new(chains.clone(), endpoint_monitor.clone(), sink.clone(), alerts.clone(), settings.block_time_threshold_secs)
                .with_transaction_monitoring(settings.enable_transaction_monitoring),
        ))
    } else {
        None
    };

    let consensus_monitor = if settings.enable_consensus_monitoring {
        let chains = consensus_chains(&chains, &settings.consensus_monitoring_chain_ids);
        Some((Arc::new(ConsensusMonitor::new(chains, sink.clone(), alerts.clone())), settings.consensus_scan_interval))
    } else {
        None
    };

    let endpoint_monitor_for_scheduler = settings.enable_rpc_monitoring.then(|| endpoint_monitor.clone());

    let scheduler = Scheduler::start(
        &warmup_targets(&chains),
        sink.clone(),
        settings.scan_interval,
        endpoint_monitor_for_scheduler,
        block_monitor,
        consensus_monitor,
    )
    .await;

    tracing::info!("xdc-monitor started");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }

    tracing::info!("shutting down");
    scheduler.shutdown(sink).await;
}
