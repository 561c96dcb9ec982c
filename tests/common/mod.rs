use std::sync::Mutex;

use async_trait::async_trait;
use xdc_monitor::services::metrics::{Measurement, MetricsTransport, TransportError};

/// In-memory stand-in for the external time-series store, per SPEC_FULL.md
/// §8.1: no database is available to these tests, so the store is a fake
/// rather than a real backend behind a `TestContext`.
#[allow(dead_code)]
pub struct FakeMetricsTransport {
    pub written: Mutex<Vec<Measurement>>,
    pub last_heights: Mutex<Vec<((u64, String), u64)>>,
    pub fail_next_writes: Mutex<usize>,
}

#[allow(dead_code)]
impl FakeMetricsTransport {
    pub fn new() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            last_heights: Mutex::new(Vec::new()),
            fail_next_writes: Mutex::new(0),
        }
    }

    pub fn failing(times: usize) -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            last_heights: Mutex::new(Vec::new()),
            fail_next_writes: Mutex::new(times),
        }
    }

    pub fn seed_last_height(&self, chain_id: u64, endpoint: &str, height: u64) {
        self.last_heights.lock().unwrap().push(((chain_id, endpoint.to_string()), height));
    }

    pub fn written_count(&self) -> usize {
        self.written.lock().unwrap().len()
    }
}

#[async_trait]
impl MetricsTransport for FakeMetricsTransport {
    async fn write_batch(&self, measurements: &[Measurement]) -> Result<(), TransportError> {
        let mut remaining = self.fail_next_writes.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(TransportError::ConnectionRefused);
        }
        self.written.lock().unwrap().extend_from_slice(measurements);
        Ok(())
    }

    async fn query_last_block_height(
        &self,
        chain_id: u64,
        endpoint: &str,
        _lookback: chrono::Duration,
    ) -> Result<Option<u64>, TransportError> {
        let heights = self.last_heights.lock().unwrap();
        Ok(heights
            .iter()
            .find(|((c, e), _)| *c == chain_id && e == endpoint)
            .map(|(_, h)| *h))
    }
}
