use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub general: Duration,
    pub rpc_endpoint_down: Duration,
    pub high_block_time: Duration,
    pub sync_blocks_lag: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            general: Duration::minutes(5),
            rpc_endpoint_down: Duration::minutes(10),
            high_block_time: Duration::minutes(15),
            sync_blocks_lag: Duration::minutes(60),
        }
    }
}

impl ThrottleConfig {
    pub fn default_window_for(&self, throttle_key: &str) -> Duration {
        if throttle_key.contains("rpc-endpoint-down") {
            self.rpc_endpoint_down
        } else if throttle_key.contains("high-block-time") {
            self.high_block_time
        } else if throttle_key.contains("sync_blocks_lag") || throttle_key.contains("sync-blocks-lag") {
            self.sync_blocks_lag
        } else {
            self.general
        }
    }
}

/// Tracks, per (alert-type, chainId) key, the timestamp of the last
/// successfully routed alert (§4.5).
#[derive(Debug, Default)]
pub struct Throttle {
    last_routed: HashMap<String, DateTime<Utc>>,
    config: ThrottleConfig,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self { last_routed: HashMap::new(), config }
    }

    pub fn should_throttle(&self, key: &str, now: DateTime<Utc>, window: Option<Duration>) -> bool {
        let window = window.unwrap_or_else(|| self.config.default_window_for(key));
        match self.last_routed.get(key) {
            Some(last) => now - *last < window,
            None => false,
        }
    }

    pub fn record(&mut self, key: &str, at: DateTime<Utc>) {
        self.last_routed.insert(key.to_string(), at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_alert_within_window_is_throttled() {
        let mut throttle = Throttle::new(ThrottleConfig::default());
        let t0 = Utc::now();
        throttle.record("sync_blocks_lag:51", t0);
        assert!(throttle.should_throttle("sync_blocks_lag:51", t0 + Duration::minutes(10), None));
    }

    #[test]
    fn alert_after_window_is_not_throttled() {
        let mut throttle = Throttle::new(ThrottleConfig::default());
        let t0 = Utc::now();
        throttle.record("sync_blocks_lag:51", t0);
        assert!(!throttle.should_throttle("sync_blocks_lag:51", t0 + Duration::minutes(61), None));
    }

    #[test]
    fn default_window_selection_matches_alert_type() {
        let config = ThrottleConfig::default();
        assert_eq!(config.default_window_for("rpc-endpoint-down:50"), Duration::minutes(10));
        assert_eq!(config.default_window_for("high-block-time:50"), Duration::minutes(15));
        assert_eq!(config.default_window_for("unusual-timeout:50"), Duration::minutes(5));
    }
}
