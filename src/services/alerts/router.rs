use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::alert::{Alert, AlertOptions, Category, Severity};
use super::channel::NotificationChannel;
use super::throttle::{Throttle, ThrottleConfig};

#[derive(Debug, Default, Clone)]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub category: Option<Category>,
    pub component: Option<String>,
    pub acknowledged: Option<bool>,
    pub since: Option<DateTime<Utc>>,
}

struct RouterState {
    ring: VecDeque<Alert>,
    throttle: Throttle,
}

/// Owns alerts end to end: submission, throttling, channel fan-out, and
/// bounded retention (§4.5). Monitors submit; the router stores.
pub struct AlertRouter {
    capacity: usize,
    channels: Vec<Arc<dyn NotificationChannel>>,
    state: Mutex<RouterState>,
}

impl AlertRouter {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>, capacity: usize, throttle_config: ThrottleConfig) -> Self {
        Self {
            capacity,
            channels,
            state: Mutex::new(RouterState {
                ring: VecDeque::new(),
                throttle: Throttle::new(throttle_config),
            }),
        }
    }

    /// Submit a candidate alert. Returns `None` if it was dropped by
    /// throttling, otherwise the stored `Alert`.
    pub async fn submit(&self, options: AlertOptions) -> Option<Alert> {
        let now = Utc::now();

        if let Some(key) = options.throttle_key.clone() {
            let state = self.state.lock().await;
            if state.throttle.should_throttle(&key, now, options.throttle_window) {
                return None;
            }
        }

        let throttle_key = options.throttle_key.clone();
        let channel_filter = options.channels.clone();
        let alert = Alert::from_options(options, now);

        {
            let mut state = self.state.lock().await;
            if state.ring.len() >= self.capacity {
                state.ring.pop_front();
            }
            state.ring.push_back(alert.clone());
            if let Some(key) = throttle_key {
                state.throttle.record(&key, now);
            }
        }

        self.dispatch(&alert, channel_filter.as_deref()).await;
        Some(alert)
    }

    /// Alerts are routed in submission order; a slow channel never reorders
    /// subsequent submissions because delivery is fire-and-forget per alert
    /// (§5 ordering guarantee).
    async fn dispatch(&self, alert: &Alert, channel_filter: Option<&[String]>) {
        for channel in &self.channels {
            if !channel.enabled() {
                continue;
            }
            if let Some(filter) = channel_filter {
                if !filter.iter().any(|id| id == channel.id()) {
                    continue;
                }
            }
            if let Err(e) = channel.send(alert).await {
                tracing::warn!(channel = channel.id(), alert_id = %alert.id, error = %e, "alert channel delivery failed");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.ring.len()
    }

    pub async fn query(&self, filter: AlertFilter) -> Vec<Alert> {
        let state = self.state.lock().await;
        state
            .ring
            .iter()
            .filter(|a| filter.severity.map(|s| s == a.severity).unwrap_or(true))
            .filter(|a| filter.category.map(|c| c == a.category).unwrap_or(true))
            .filter(|a| filter.component.as_deref().map(|c| c == a.component).unwrap_or(true))
            .filter(|a| filter.acknowledged.map(|ack| ack == a.acknowledged).unwrap_or(true))
            .filter(|a| filter.since.map(|since| a.created_at >= since).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Returns true if the alert exists (acknowledging an already
    /// acknowledged alert succeeds and changes nothing, §5 edge case).
    pub async fn acknowledge(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.ring.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub async fn resolve(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.ring.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.resolved_at.get_or_insert(Utc::now());
                true
            }
            None => false,
        }
    }
}
