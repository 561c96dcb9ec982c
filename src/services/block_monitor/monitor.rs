use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::modules::chains::ChainDescriptor;
use crate::services::alerts::{AlertOptions, AlertRouter, Category, Severity};
use crate::services::endpoint_monitor::RpcEndpointMonitor;
use crate::services::metrics::{MetricsSink, MetricsTransport};
use crate::services::rpc::{RpcClient, RpcClientConfig};
use crate::services::window::SlidingWindow;

use super::block_data::{BlockObservation, RawBlock};
use super::primary_status::PrimaryEndpointStatus;
use super::selection::select_best;
use super::sync_lag::{self, LagClass};
use super::tx_analysis;

const TX_THROUGHPUT_WINDOW: StdDuration = StdDuration::from_secs(5 * 60);
const BLOCK_TIME_WINDOW: StdDuration = StdDuration::from_secs(24 * 60 * 60);

fn to_hex(n: u64) -> String {
    format!("0x{n:x}")
}

pub struct BlockMonitor<T: MetricsTransport> {
    chains: Vec<ChainDescriptor>,
    endpoint_monitor: Arc<RpcEndpointMonitor<T>>,
    sink: Arc<MetricsSink<T>>,
    alerts: Arc<AlertRouter>,
    block_time_windows: Mutex<HashMap<u64, SlidingWindow>>,
    tx_throughput_windows: Mutex<HashMap<u64, SlidingWindow>>,
    primary_status: Mutex<HashMap<u64, PrimaryEndpointStatus>>,
    last_sync_lag_alert_at: Mutex<HashMap<u64, chrono::DateTime<Utc>>>,
    block_time_threshold_secs: u64,
    transaction_monitoring_enabled: bool,
}

impl<T: MetricsTransport + 'static> BlockMonitor<T> {
    pub fn new(
        chains: Vec<ChainDescriptor>,
        endpoint_monitor: Arc<RpcEndpointMonitor<T>>,
        sink: Arc<MetricsSink<T>>,
        alerts: Arc<AlertRouter>,
        block_time_threshold_secs: u64,
    ) -> Self {
        Self {
            chains,
            endpoint_monitor,
            sink,
            alerts,
            block_time_windows: Mutex::new(HashMap::new()),
            tx_throughput_windows: Mutex::new(HashMap::new()),
            primary_status: Mutex::new(HashMap::new()),
            last_sync_lag_alert_at: Mutex::new(HashMap::new()),
            block_time_threshold_secs,
            transaction_monitoring_enabled: true,
        }
    }

    /// Controls whether transaction receipt analysis runs per block
    /// (`ENABLE_TRANSACTION_MONITORING`); block time and sync lag are
    /// unaffected.
    pub fn with_transaction_monitoring(mut self, enabled: bool) -> Self {
        self.transaction_monitoring_enabled = enabled;
        self
    }

    pub async fn tick(&self) {
        for chain in &self.chains {
            self.tick_chain(chain).await;
        }
    }

    async fn tick_chain(&self, chain: &ChainDescriptor) {
        let chain_id = chain.chain_id;
        let mut statuses = self.endpoint_monitor.statuses_for_chain(chain_id).await;
        if statuses.is_empty() {
            self.endpoint_monitor.tick().await;
            statuses = self.endpoint_monitor.statuses_for_chain(chain_id).await;
        }

        let Some(best) = select_best(&statuses) else {
            tracing::debug!(chain_id, "no healthy endpoint this cycle, skipping block tick");
            return;
        };
        let best_url = best.url.clone();
        let best_height = best.block_height.unwrap_or(0);

        let client = RpcClient::new(best_url.clone(), RpcClientConfig::block_fetch());

        let fetch_result = self.fetch_n_and_n_minus_1(&client, best_height).await;

        match fetch_result {
            Ok((current, previous)) => {
                self.mark_primary_up(chain_id).await;
                self.process_blocks(chain, &client, current, previous, &statuses).await;
            }
            Err(reason) => {
                tracing::warn!(chain_id, endpoint = %best_url, error = %reason, "block fetch failed, aborting this tick for this chain");
                self.mark_primary_down(chain_id, &best_url).await;
            }
        }

        self.sink.block_height_variance(chain_id, sync_lag::variance(&statuses)).await;
        self.detect_and_alert_sync_lag(chain_id, &statuses).await;
    }

    async fn fetch_n_and_n_minus_1(&self, client: &RpcClient, height: u64) -> Result<(BlockObservation, Option<BlockObservation>), String> {
        if height == 0 {
            return Err("no known block height for best endpoint".to_string());
        }

        let current_fut = client.call::<RawBlock>("eth_getBlockByNumber", serde_json::json!([to_hex(height), true]));
        let previous_fut = client.call::<RawBlock>("eth_getBlockByNumber", serde_json::json!([to_hex(height - 1), true]));
        let (current, previous) = tokio::join!(current_fut, previous_fut);

        let current = current.map_err(|e| e.last_reason)?.into_observation().ok_or("malformed block N")?;
        let previous = match previous {
            Ok(raw) => raw.into_observation(),
            Err(_) => None,
        };

        Ok((current, previous))
    }

    async fn process_blocks(
        &self,
        chain: &ChainDescriptor,
        client: &RpcClient,
        current: BlockObservation,
        previous: Option<BlockObservation>,
        statuses: &[crate::services::endpoint_monitor::EndpointStatusSnapshot],
    ) {
        let chain_id = chain.chain_id;

        if let Some(previous) = previous {
            let block_time = current.timestamp - previous.timestamp;
            if block_time <= 0 {
                tracing::warn!(chain_id, block_time, "non-positive block time, discarding sample");
            } else {
                let now = Instant::now();
                let mut windows = self.block_time_windows.lock().await;
                let window = windows.entry(chain_id).or_insert_with(|| SlidingWindow::new(BLOCK_TIME_WINDOW, 100));
                window.push(block_time as f64, now);
                drop(windows);

                self.sink.block_time(chain_id, block_time as f64).await;

                if block_time as u64 > self.block_time_threshold_secs {
                    let message = format!(
                        "chain {chain_id}: block time {block_time}s exceeds threshold {}s",
                        self.block_time_threshold_secs
                    );
                    let options = AlertOptions::new(Severity::Warning, Category::Blockchain, "block-monitor", "high block time", message)
                        .throttled_default(format!("high-block-time:{chain_id}"));
                    self.submit_alert(options).await;
                }
            }
        }

        if !self.transaction_monitoring_enabled {
            return;
        }

        let analysis = tx_analysis::analyze(client, &current.tx_hashes).await;
        self.sink
            .transactions_per_block(chain_id, current.block_number, analysis.total, analysis.success, analysis.failed)
            .await;

        let now = Instant::now();
        let rate = {
            let mut windows = self.tx_throughput_windows.lock().await;
            let window = windows.entry(chain_id).or_insert_with(|| SlidingWindow::new(TX_THROUGHPUT_WINDOW, 10_000));
            window.push(analysis.total as f64, now);
            let window_ms = TX_THROUGHPUT_WINDOW.as_millis() as f64;
            window.sum(None) / (window_ms / 60_000.0)
        };
        self.sink.transactions_per_minute(chain_id, rate).await;
    }

    async fn detect_and_alert_sync_lag(&self, chain_id: u64, statuses: &[crate::services::endpoint_monitor::EndpointStatusSnapshot]) {
        let groups = sync_lag::detect(statuses);
        if groups.is_empty() {
            return;
        }

        let now = Utc::now();
        {
            let last = self.last_sync_lag_alert_at.lock().await;
            if let Some(last_at) = last.get(&chain_id) {
                if now - *last_at < ChronoDuration::minutes(60) {
                    return;
                }
            }
        }

        let mut sent_any = false;
        for group in groups {
            let severity = match group.class {
                LagClass::Critical => Severity::Critical,
                LagClass::Warning => Severity::Warning,
            };
            let title = format!("sync lag ({})", group.class.as_str());
            let message = format!("chain {chain_id}: {} endpoint(s) behind\n{}", group.count, group.message());

            // Keyed per classification so a critical and a warning group in
            // the same cycle don't throttle each other at the router layer
            // (spec.md §8 Scenario B expects both to route); the chain-level
            // check above already guards against repeating either within an
            // hour.
            let options = AlertOptions::new(severity, Category::Sync, "block-monitor", title, message)
                .throttled(format!("sync_blocks_lag:{}:{chain_id}", group.class.as_str()), ChronoDuration::minutes(60));

            if self.submit_alert(options).await {
                sent_any = true;
            }
        }

        if sent_any {
            self.last_sync_lag_alert_at.lock().await.insert(chain_id, now);
        }
    }

    async fn mark_primary_down(&self, chain_id: u64, url: &str) {
        let mut statuses = self.primary_status.lock().await;
        let status = statuses.entry(chain_id).or_insert_with(|| PrimaryEndpointStatus::new(url));
        if status.url != url {
            *status = PrimaryEndpointStatus::new(url);
        }
        if let Some(downtime) = status.on_probe_failure(Utc::now(), ChronoDuration::hours(1)) {
            let hours = downtime.num_minutes() as f64 / 60.0;
            drop(statuses);
            let message = format!("chain {chain_id}: endpoint {url} has been unreachable for {hours:.1}h");
            let options = AlertOptions::new(Severity::Critical, Category::Rpc, "block-monitor", "primary endpoint down", message)
                .throttled_default(format!("rpc-endpoint-down:{chain_id}"));
            self.submit_alert(options).await;
        }
    }

    async fn mark_primary_up(&self, chain_id: u64) {
        if let Some(status) = self.primary_status.lock().await.get_mut(&chain_id) {
            status.on_probe_success();
        }
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
