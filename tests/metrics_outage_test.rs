mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeMetricsTransport;
use xdc_monitor::services::metrics::{MetricsSink, MetricsSinkConfig};

fn fast_config() -> MetricsSinkConfig {
    MetricsSinkConfig {
        batch_size: 2,
        flush_interval: Duration::from_millis(5),
        max_write_retries: 1,
        buffer_capacity: 1000,
        startup_delay: Duration::from_millis(1),
        reconnect_base_delay: Duration::from_millis(5),
        reconnect_max_delay: Duration::from_millis(20),
        reconnect_backoff_factor: 1.5,
        reconnect_max_attempts: 10,
        ..MetricsSinkConfig::default()
    }
}

/// Scenario D (spec.md §8): the metrics store is unreachable at startup;
/// monitors keep emitting and the sink buffers up to its cap, then drains
/// in insertion order once the store recovers.
#[tokio::test]
async fn buffered_measurements_drain_in_order_once_store_recovers() {
    let transport = Arc::new(FakeMetricsTransport::failing(3));
    let sink = Arc::new(MetricsSink::new(transport.clone(), fast_config()));

    sink.startup(&[]).await;

    for i in 0..4 {
        sink.rpc_latency(50, "primary", xdc_monitor::services::probe::ProbeOutcome::Ok(i)).await;
    }

    // The first few flush attempts still hit the failing transport.
    sink.flush_once().await;
    sink.flush_once().await;

    // Transport has now exhausted its scripted failures; subsequent flushes succeed.
    while sink.buffer_len().await > 0 {
        if sink.flush_once().await == 0 {
            break;
        }
    }

    let written = transport.written.lock().unwrap();
    let latencies: Vec<i64> = written
        .iter()
        .filter_map(|m| match m.fields.get("latency_ms") {
            Some(xdc_monitor::services::metrics::FieldValue::Int(v)) => Some(*v),
            _ => None,
        })
        .collect();

    assert_eq!(latencies, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn sentinel_block_height_warms_from_store_on_startup() {
    let transport = Arc::new(FakeMetricsTransport::new());
    transport.seed_last_height(50, "primary", 12_345);
    let sink = Arc::new(MetricsSink::new(transport, fast_config()));

    sink.startup(&[(50, vec!["primary".to_string()])]).await;

    sink.block_height(50, "primary", xdc_monitor::services::probe::ProbeOutcome::Unreachable("timeout".into())).await;

    sink.flush_once().await;
    assert_eq!(sink.buffer_len().await, 0);
}

#[tokio::test]
async fn flushing_an_empty_buffer_is_a_noop() {
    let transport = Arc::new(FakeMetricsTransport::new());
    let sink = MetricsSink::new(transport, fast_config());
    sink.startup(&[]).await;
    assert_eq!(sink.flush_once().await, 0);
}
