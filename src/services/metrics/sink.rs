use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::services::probe::ProbeOutcome;

use super::transport::{MetricsTransport, TransportError};
use super::types::{Measurement, SentinelConfig};

#[derive(Debug, Clone)]
pub struct MetricsSinkConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_write_retries: u32,
    pub buffer_capacity: usize,
    pub startup_delay: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub reconnect_backoff_factor: f64,
    pub reconnect_max_attempts: u32,
    pub sentinel: SentinelConfig,
    pub block_height_cache_lookback: chrono::Duration,
}

impl Default for MetricsSinkConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            flush_interval: Duration::from_secs(5),
            max_write_retries: 5,
            buffer_capacity: 1000,
            startup_delay: Duration::from_secs(3),
            reconnect_base_delay: Duration::from_secs(5),
            reconnect_max_delay: Duration::from_secs(60),
            reconnect_backoff_factor: 1.5,
            reconnect_max_attempts: 10,
            sentinel: SentinelConfig::default(),
            block_height_cache_lookback: chrono::Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconnectState {
    pub attempt: u32,
    pub next_delay: Duration,
}

struct SinkState {
    connection: ConnectionState,
    buffer: VecDeque<Measurement>,
    overflow_logged: bool,
    block_height_cache: HashMap<(u64, String), u64>,
    reconnect_attempt: u32,
}

/// Typed measurement writer with batching, a bounded in-memory buffer during
/// outages, reconnect with exponential backoff, and sentinel-value policy
/// for "endpoint unreachable" data points (§4.4).
pub struct MetricsSink<T: MetricsTransport> {
    transport: Arc<T>,
    config: MetricsSinkConfig,
    state: Mutex<SinkState>,
}

impl<T: MetricsTransport + 'static> MetricsSink<T> {
    pub fn new(transport: Arc<T>, config: MetricsSinkConfig) -> Self {
        Self {
            transport,
            config,
            state: Mutex::new(SinkState {
                connection: ConnectionState::Disconnected,
                buffer: VecDeque::new(),
                overflow_logged: false,
                block_height_cache: HashMap::new(),
                reconnect_attempt: 0,
            }),
        }
    }

    /// Delay ~3s, then attempt the first connection, then warm the
    /// sentinel block-height cache from the last 24h of writes (§4.9).
    pub async fn startup(&self, chains: &[(u64, Vec<String>)]) {
        tokio::time::sleep(self.config.startup_delay).await;
        self.attempt_reconnect().await;
        self.warm_block_height_cache(chains).await;
    }

    async fn warm_block_height_cache(&self, chains: &[(u64, Vec<String>)]) {
        for (chain_id, endpoints) in chains {
            for endpoint in endpoints {
                match self
                    .transport
                    .query_last_block_height(*chain_id, endpoint, self.config.block_height_cache_lookback)
                    .await
                {
                    Ok(Some(height)) => {
                        let mut state = self.state.lock().await;
                        state.block_height_cache.insert((*chain_id, endpoint.clone()), height);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(chain_id, endpoint, error = %e, "failed to warm block height cache");
                    }
                }
            }
        }
    }

    async fn attempt_reconnect(&self) -> bool {
        let probe = Measurement::new("monitor_startup").field("ok", true);
        match self.transport.write_batch(std::slice::from_ref(&probe)).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.connection = ConnectionState::Connected;
                state.reconnect_attempt = 0;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "metrics sink connection attempt failed");
                let mut state = self.state.lock().await;
                state.connection = ConnectionState::Disconnected;
                false
            }
        }
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    pub async fn buffer_len(&self) -> usize {
        self.state.lock().await.buffer.len()
    }

    pub async fn reconnect_state(&self) -> ReconnectState {
        let state = self.state.lock().await;
        (self.config.clone(), state.reconnect_attempt).into()
    }

    /// Enqueue a measurement for the next flush. Order is preserved per
    /// producer (§5); on overflow the oldest queued measurement is dropped
    /// and the event logged once per overflow episode, not per entry.
    pub async fn enqueue(&self, measurement: Measurement) {
        let mut state = self.state.lock().await;
        if state.buffer.len() >= self.config.buffer_capacity {
            state.buffer.pop_front();
            if !state.overflow_logged {
                tracing::warn!(
                    capacity = self.config.buffer_capacity,
                    "metrics buffer overflow, dropping oldest measurements"
                );
                state.overflow_logged = true;
            }
        } else {
            state.overflow_logged = false;
        }
        state.buffer.push_back(measurement);
    }

    /// Flush up to one batch. A no-op on an empty buffer. Returns the
    /// number of measurements written.
    pub async fn flush_once(&self) -> usize {
        if self.connection_state().await != ConnectionState::Connected {
            if !self.attempt_reconnect().await {
                self.schedule_reconnect_backoff().await;
                return 0;
            }
        }

        let batch = {
            let mut state = self.state.lock().await;
            let take = self.config.batch_size.min(state.buffer.len());
            state.buffer.drain(0..take).collect::<Vec<_>>()
        };

        if batch.is_empty() {
            return 0;
        }

        match self.write_with_retry(&batch).await {
            Ok(()) => batch.len(),
            Err(_) => {
                let mut state = self.state.lock().await;
                for measurement in batch.into_iter().rev() {
                    state.buffer.push_front(measurement);
                }
                state.connection = ConnectionState::Disconnected;
                drop(state);
                self.schedule_reconnect_backoff().await;
                0
            }
        }
    }

    async fn write_with_retry(&self, batch: &[Measurement]) -> Result<(), TransportError> {
        let mut last_err = TransportError::HostUnreachable;
        for attempt in 0..self.config.max_write_retries {
            match self.transport.write_batch(batch).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_err = e;
                    let jitter_ms = rand::rng().random_range(0..50);
                    tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1) + jitter_ms)).await;
                }
            }
        }
        Err(last_err)
    }

    async fn schedule_reconnect_backoff(&self) {
        let attempt = {
            let mut state = self.state.lock().await;
            state.reconnect_attempt += 1;
            if state.reconnect_attempt > self.config.reconnect_max_attempts {
                state.reconnect_attempt = 1;
            }
            state.reconnect_attempt
        };

        let delay = self.delay_for_attempt(attempt);
        tokio::time::sleep(delay).await;
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let secs = self.config.reconnect_base_delay.as_secs_f64()
            * self.config.reconnect_backoff_factor.powi(attempt as i32 - 1);
        Duration::from_secs_f64(secs.min(self.config.reconnect_max_delay.as_secs_f64()))
    }

    /// Run the periodic flush loop until cancelled (§4.9 shutdown).
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
            }
        }
    }

    /// Flush with a bounded deadline, used during shutdown (§4.9).
    pub async fn flush_with_deadline(&self, deadline: Duration) {
        let _ = tokio::time::timeout(deadline, async {
            while self.buffer_len().await > 0 {
                if self.flush_once().await == 0 {
                    break;
                }
            }
        })
        .await;
    }

    fn sentinel_block_height_sync(&self, state: &SinkState, chain_id: u64, endpoint: &str) -> i64 {
        state
            .block_height_cache
            .get(&(chain_id, endpoint.to_string()))
            .map(|h| *h as i64)
            .unwrap_or(-1)
    }

    async fn sentinel_block_height(&self, chain_id: u64, endpoint: &str) -> i64 {
        let state = self.state.lock().await;
        self.sentinel_block_height_sync(&state, chain_id, endpoint)
    }

    // ---- typed emitters (§4.4) ----

    pub async fn block_height(&self, chain_id: u64, endpoint: &str, outcome: ProbeOutcome<u64>) {
        let value = match outcome {
            ProbeOutcome::Ok(height) => {
                let mut state = self.state.lock().await;
                state.block_height_cache.insert((chain_id, endpoint.to_string()), height);
                height as i64
            }
            ProbeOutcome::Unreachable(_) if !self.config.sentinel.enabled => return,
            ProbeOutcome::Unreachable(_) => self.sentinel_block_height(chain_id, endpoint).await,
        };
        let measurement = Measurement::new("block_height")
            .tag("chain_id", chain_id.to_string())
            .tag("endpoint", endpoint)
            .field("height", value);
        self.enqueue(measurement).await;
    }

    pub async fn block_time(&self, chain_id: u64, seconds: f64) {
        let measurement = Measurement::new("block_time")
            .tag("chain_id", chain_id.to_string())
            .field("seconds", seconds);
        self.enqueue(measurement).await;
    }

    pub async fn rpc_latency(&self, chain_id: u64, endpoint: &str, outcome: ProbeOutcome<i64>) {
        let value = match outcome {
            ProbeOutcome::Ok(ms) => ms.max(0),
            ProbeOutcome::Unreachable(_) if !self.config.sentinel.enabled => return,
            ProbeOutcome::Unreachable(_) => self.config.sentinel.latency,
        };
        let measurement = Measurement::new("rpc_latency")
            .tag("chain_id", chain_id.to_string())
            .tag("endpoint", endpoint)
            .field("latency_ms", value);
        self.enqueue(measurement).await;
    }

    pub async fn rpc_status(&self, chain_id: u64, endpoint: &str, active: bool) {
        if !active && !self.config.sentinel.enabled {
            return;
        }
        let value = if active { 1 } else { self.config.sentinel.status_down };
        let measurement = Measurement::new("rpc_status")
            .tag("chain_id", chain_id.to_string())
            .tag("endpoint", endpoint)
            .field("status", value);
        self.enqueue(measurement).await;
    }

    pub async fn websocket_status(&self, chain_id: u64, endpoint: &str, active: bool) {
        if !active && !self.config.sentinel.enabled {
            return;
        }
        let value = if active { 1 } else { self.config.sentinel.status_down };
        let measurement = Measurement::new("websocket_status")
            .tag("chain_id", chain_id.to_string())
            .tag("endpoint", endpoint)
            .field("status", value);
        self.enqueue(measurement).await;
    }

    pub async fn explorer_status(&self, chain_id: u64, active: bool) {
        if !active && !self.config.sentinel.enabled {
            return;
        }
        let value = if active { 1 } else { self.config.sentinel.status_down };
        let measurement = Measurement::new("explorer_status")
            .tag("chain_id", chain_id.to_string())
            .field("status", value);
        self.enqueue(measurement).await;
    }

    pub async fn faucet_status(&self, chain_id: u64, active: bool) {
        if !active && !self.config.sentinel.enabled {
            return;
        }
        let value = if active { 1 } else { self.config.sentinel.status_down };
        let measurement = Measurement::new("faucet_status")
            .tag("chain_id", chain_id.to_string())
            .field("status", value);
        self.enqueue(measurement).await;
    }

    pub async fn transactions_per_block(&self, chain_id: u64, block_number: u64, total: u64, success: u64, failed: u64) {
        for (status, count) in [("total", total), ("success", success), ("failed", failed)] {
            let measurement = Measurement::new("transactions_per_block")
                .tag("chain_id", chain_id.to_string())
                .tag("block_number", block_number.to_string())
                .tag("status", status)
                .field("count", count as i64);
            self.enqueue(measurement).await;
        }
    }

    pub async fn transactions_per_minute(&self, chain_id: u64, rate: f64) {
        let measurement = Measurement::new("transactions_per_minute")
            .tag("chain_id", chain_id.to_string())
            .field("rate", rate);
        self.enqueue(measurement).await;
    }

    pub async fn block_height_variance(&self, chain_id: u64, variance: u64) {
        let measurement = Measurement::new("block_height_variance")
            .tag("chain_id", chain_id.to_string())
            .field("variance", variance as i64);
        self.enqueue(measurement).await;
    }

    pub async fn alert_count(&self, severity: &str, category: &str, count: u64) {
        let measurement = Measurement::new("alert_count")
            .tag("severity", severity)
            .tag("category", category)
            .field("count", count as i64);
        self.enqueue(measurement).await;
    }

    pub async fn alert_history(&self, severity: &str, category: &str, component: &str, title: &str, message: &str) {
        let measurement = Measurement::new("alert_history")
            .tag("severity", severity)
            .tag("category", category)
            .tag("component", component)
            .field("title", title)
            .field("message", message);
        self.enqueue(measurement).await;
    }

    pub async fn consensus_missed_rounds(&self, chain_id: u64, block_number: u64, round: u64, missed_count: u64) {
        let measurement = Measurement::new("consensus_missed_rounds")
            .tag("chain_id", chain_id.to_string())
            .tag("block_number", block_number.to_string())
            .tag("round", round.to_string())
            .field("missed_count", missed_count as i64);
        self.enqueue(measurement).await;
    }

    pub async fn consensus_timeout_periods(
        &self,
        chain_id: u64,
        block_number: u64,
        round: u64,
        expected_seconds: f64,
        actual_seconds: f64,
        variance_seconds: f64,
        consistent: bool,
    ) {
        let measurement = Measurement::new("consensus_timeout_periods")
            .tag("chain_id", chain_id.to_string())
            .tag("block_number", block_number.to_string())
            .tag("round", round.to_string())
            .field("expected_seconds", expected_seconds)
            .field("actual_seconds", actual_seconds)
            .field("variance_seconds", variance_seconds)
            .field("consistent", consistent);
        self.enqueue(measurement).await;
    }

    pub async fn consensus_miner_performance(&self, chain_id: u64, miner: &str, mined: u64, missed: u64, success_rate: f64) {
        let measurement = Measurement::new("consensus_miner_performance")
            .tag("chain_id", chain_id.to_string())
            .tag("miner", miner)
            .field("mined", mined as i64)
            .field("missed", missed as i64)
            .field("success_rate", success_rate);
        self.enqueue(measurement).await;
    }

    pub async fn consensus_miner_missed_rounds(&self, chain_id: u64, miner: &str, missed_count: u64) {
        let measurement = Measurement::new("consensus_miner_missed_rounds")
            .tag("chain_id", chain_id.to_string())
            .tag("miner", miner)
            .field("missed_count", missed_count as i64);
        self.enqueue(measurement).await;
    }
}

impl From<(MetricsSinkConfig, u32)> for ReconnectState {
    fn from((config, attempt): (MetricsSinkConfig, u32)) -> Self {
        let effective_attempt = attempt.max(1);
        let secs = config.reconnect_base_delay.as_secs_f64()
            * config.reconnect_backoff_factor.powi(effective_attempt as i32 - 1);
        ReconnectState {
            attempt,
            next_delay: Duration::from_secs_f64(secs.min(config.reconnect_max_delay.as_secs_f64())),
        }
    }
}
