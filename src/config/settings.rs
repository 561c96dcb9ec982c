use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Typed view over the process environment. Loaded once at startup;
/// a missing or malformed required key is fatal (`ConfigError`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub scan_interval: Duration,
    pub blocks_to_scan: u64,
    pub block_time_threshold_secs: u64,

    pub enable_rpc_monitoring: bool,
    pub enable_port_monitoring: bool,
    pub enable_block_monitoring: bool,
    pub enable_transaction_monitoring: bool,
    pub enable_consensus_monitoring: bool,

    pub enable_dashboard_alerts: bool,
    pub enable_chat_notifications: bool,
    pub notification_webhook_url: Option<String>,
    pub chat_bot_token: Option<String>,
    pub chat_bot_channel: Option<String>,

    pub metrics_url: Option<String>,
    pub metrics_token: Option<String>,
    pub metrics_org: Option<String>,
    pub metrics_bucket: Option<String>,

    pub consensus_monitoring_chain_ids: Vec<u64>,
    pub consensus_scan_interval: Duration,

    pub enable_sentinel_values: bool,
    pub sentinel_peer_count: i64,
    pub sentinel_latency: i64,
    pub sentinel_status_down: i64,

    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            scan_interval: Duration::from_secs(parse_u64_default("SCAN_INTERVAL", 15)?),
            blocks_to_scan: parse_u64_default("BLOCKS_TO_SCAN", 10)?,
            block_time_threshold_secs: parse_u64_default("BLOCK_TIME_THRESHOLD", 2)?,

            enable_rpc_monitoring: parse_bool_default("ENABLE_RPC_MONITORING", true)?,
            enable_port_monitoring: parse_bool_default("ENABLE_PORT_MONITORING", true)?,
            enable_block_monitoring: parse_bool_default("ENABLE_BLOCK_MONITORING", true)?,
            enable_transaction_monitoring: parse_bool_default("ENABLE_TRANSACTION_MONITORING", true)?,
            enable_consensus_monitoring: parse_bool_default("ENABLE_CONSENSUS_MONITORING", true)?,

            enable_dashboard_alerts: parse_bool_default("ENABLE_DASHBOARD_ALERTS", true)?,
            enable_chat_notifications: parse_bool_default("ENABLE_CHAT_NOTIFICATIONS", false)?,
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL").ok(),
            chat_bot_token: env::var("CHAT_BOT_TOKEN").ok(),
            chat_bot_channel: env::var("CHAT_BOT_CHANNEL").ok(),

            metrics_url: env::var("METRICS_URL").ok(),
            metrics_token: env::var("METRICS_TOKEN").ok(),
            metrics_org: env::var("METRICS_ORG").ok(),
            metrics_bucket: env::var("METRICS_BUCKET").ok(),

            consensus_monitoring_chain_ids: parse_chain_id_list("CONSENSUS_MONITORING_CHAIN_IDS")?,
            consensus_scan_interval: Duration::from_millis(parse_u64_default(
                "CONSENSUS_SCAN_INTERVAL",
                15_000,
            )?),

            enable_sentinel_values: parse_bool_default("ENABLE_SENTINEL_VALUES", true)?,
            sentinel_peer_count: parse_i64_default("SENTINEL_PEER_COUNT", -1)?,
            sentinel_latency: parse_i64_default("SENTINEL_LATENCY", -1)?,
            sentinel_status_down: parse_i64_default("SENTINEL_STATUS_DOWN", 0)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_u64_default(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::Invalid { key, reason: e.to_string() }),
        Err(_) => Ok(default),
    }
}

fn parse_i64_default(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<i64>()
            .map_err(|e| ConfigError::Invalid { key, reason: e.to_string() }),
        Err(_) => Ok(default),
    }
}

fn parse_bool_default(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::Invalid {
                key,
                reason: format!("expected a boolean, got '{other}'"),
            }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_chain_id_list(key: &'static str) -> Result<Vec<u64>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u64>()
                    .map_err(|e| ConfigError::Invalid { key, reason: e.to_string() })
            })
            .collect(),
        Err(_) => Ok(Vec::new()),
    }
}
