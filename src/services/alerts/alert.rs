use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Blockchain,
    Rpc,
    Sync,
    Consensus,
    System,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Blockchain => "blockchain",
            Category::Rpc => "rpc",
            Category::Sync => "sync",
            Category::Consensus => "consensus",
            Category::System => "system",
        }
    }
}

/// Input to the alert router. `throttle_key` and `throttle_window` let a
/// monitor opt an alert into the router's per-(type, chainId) throttling
/// (§4.5); omit both for alerts that should always route.
#[derive(Debug, Clone)]
pub struct AlertOptions {
    pub severity: Severity,
    pub category: Category,
    pub component: String,
    pub title: String,
    pub message: String,
    pub metadata: HashMap<String, String>,
    pub channels: Option<Vec<String>>,
    pub throttle_key: Option<String>,
    pub throttle_window: Option<chrono::Duration>,
}

impl AlertOptions {
    pub fn new(severity: Severity, category: Category, component: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            component: component.into(),
            title: title.into(),
            message: message.into(),
            metadata: HashMap::new(),
            channels: None,
            throttle_key: None,
            throttle_window: None,
        }
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn channels(mut self, channels: Vec<String>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn throttled(mut self, key: impl Into<String>, window: chrono::Duration) -> Self {
        self.throttle_key = Some(key.into());
        self.throttle_window = Some(window);
        self
    }

    /// Throttle using the router's default window for this key (§4.5
    /// defaults: general, rpc-endpoint-down, high-block-time, sync-blocks-lag).
    pub fn throttled_default(mut self, key: impl Into<String>) -> Self {
        self.throttle_key = Some(key.into());
        self.throttle_window = None;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub category: Category,
    pub component: String,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
    pub acknowledged: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub channels: Option<Vec<String>>,
}

impl Alert {
    pub fn from_options(options: AlertOptions, created_at: DateTime<Utc>) -> Self {
        let id = generate_id(created_at, options.category.as_str(), &options.component);
        Self {
            id,
            severity: options.severity,
            category: options.category,
            component: options.component,
            title: options.title,
            message: options.message,
            created_at,
            metadata: options.metadata,
            acknowledged: false,
            resolved_at: None,
            channels: options.channels,
        }
    }
}

/// `${timestamp}-${category}-${component}-${short-random}` (§4.5).
fn generate_id(timestamp: DateTime<Utc>, category: &str, component: &str) -> String {
    let suffix: String = {
        let mut rng = rand::rng();
        (0..6).map(|_| std::char::from_digit(rng.random_range(0..36), 36).unwrap()).collect()
    };
    format!("{}-{}-{}-{}", timestamp.timestamp_millis(), category, component, suffix)
}
