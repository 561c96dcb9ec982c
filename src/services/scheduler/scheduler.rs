use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::services::block_monitor::BlockMonitor;
use crate::services::consensus_monitor::ConsensusMonitor;
use crate::services::endpoint_monitor::RpcEndpointMonitor;
use crate::services::metrics::{MetricsSink, MetricsTransport};

use super::registration::{TickHandle, DEFAULT_FLUSH_DEADLINE};

/// Registers and owns every monitor's periodic tick, and drives the
/// sequential startup order from §4.9: metrics sink warm-up → endpoint
/// state cache warm-up → RPC endpoint monitor → block monitor → consensus
/// monitor. Each monitor runs its own task; a slow chain's tick never
/// delays another monitor's tick (§5).
pub struct Scheduler {
    root_cancel: CancellationToken,
    ticks: Vec<TickHandle>,
}

impl Scheduler {
    pub async fn start<T: MetricsTransport + 'static>(
        chains_for_warmup: &[(u64, Vec<String>)],
        sink: Arc<MetricsSink<T>>,
        scan_interval: Duration,
        endpoint_monitor: Option<Arc<RpcEndpointMonitor<T>>>,
        block_monitor: Option<Arc<BlockMonitor<T>>>,
        consensus_monitor: Option<(Arc<ConsensusMonitor<T>>, Duration)>,
    ) -> Self {
        sink.startup(chains_for_warmup).await;

        let root_cancel = CancellationToken::new();
        let mut ticks = Vec::new();

        ticks.push(TickHandle::spawn("metrics-flusher", &root_cancel, {
            let sink = sink.clone();
            move |cancel| async move { sink.run(cancel).await }
        }));

        if let Some(endpoint_monitor) = endpoint_monitor {
            ticks.push(TickHandle::spawn("rpc-endpoint-monitor", &root_cancel, move |cancel| async move {
                endpoint_monitor.run(scan_interval, cancel).await
            }));
        }

        if let Some(block_monitor) = block_monitor {
            ticks.push(TickHandle::spawn("block-monitor", &root_cancel, move |cancel| async move {
                block_monitor.run(scan_interval, cancel).await
            }));
        }

        if let Some((consensus_monitor, consensus_interval)) = consensus_monitor {
            ticks.push(TickHandle::spawn("consensus-monitor", &root_cancel, move |cancel| async move {
                consensus_monitor.run(consensus_interval, cancel).await
            }));
        }

        Self { root_cancel, ticks }
    }

    /// Deregister all ticks, flush the metrics buffer within the bounded
    /// deadline, and wait for every task to finish.
    pub async fn shutdown<T: MetricsTransport + 'static>(self, sink: Arc<MetricsSink<T>>) {
        self.shutdown_with_deadline(sink, DEFAULT_FLUSH_DEADLINE).await
    }

    pub async fn shutdown_with_deadline<T: MetricsTransport + 'static>(self, sink: Arc<MetricsSink<T>>, deadline: Duration) {
        self.root_cancel.cancel();
        for tick in self.ticks {
            if let Err(e) = tick.join.await {
                tracing::warn!(tick = tick.name, error = %e, "tick task panicked during shutdown");
            }
        }
        sink.flush_with_deadline(deadline).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::chains::ChainDescriptor;
    use crate::services::alerts::{AlertRouter, ThrottleConfig};
    use crate::services::metrics::{Measurement, MetricsSinkConfig, TransportError};

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

    #[tokio::test]
    async fn starts_and_shuts_down_with_only_the_metrics_flusher_registered() {
        let sink = Arc::new(MetricsSink::new(Arc::new(NullTransport), MetricsSinkConfig { startup_delay: Duration::from_millis(1), ..Default::default() }));

        let scheduler = Scheduler::start::<NullTransport>(&[], sink.clone(), Duration::from_millis(50), None, None, None).await;

        scheduler.shutdown_with_deadline(sink, Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn runs_a_full_monitor_set_and_shuts_down_cleanly() {
        let sink = Arc::new(MetricsSink::new(Arc::new(NullTransport), MetricsSinkConfig { startup_delay: Duration::from_millis(1), ..Default::default() }));
        let chain = ChainDescriptor { chain_id: 1, display_name: "t".into(), target_block_time_seconds: 2, endpoints: vec![] };

        let endpoint_monitor = Arc::new(RpcEndpointMonitor::new(vec![chain.clone()], false, sink.clone()));
        let alerts = Arc::new(AlertRouter::new(vec![], 1000, ThrottleConfig::default()));
        let block_monitor = Arc::new(BlockMonitor::new(vec![chain.clone()], endpoint_monitor.clone(), sink.clone(), alerts.clone(), 2));
        let consensus_monitor = Arc::new(ConsensusMonitor::new(vec![chain], sink.clone(), alerts));

        let scheduler = Scheduler::start(
            &[],
            sink.clone(),
            Duration::from_millis(20),
            Some(endpoint_monitor),
            Some(block_monitor),
            Some((consensus_monitor, Duration::from_millis(20))),
        )
        .await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        scheduler.shutdown_with_deadline(sink, Duration::from_millis(50)).await;
    }
}
