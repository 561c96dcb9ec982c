use chrono::{DateTime, Utc};

/// Tracks downtime of a chain's currently-designated best endpoint (§4.7.3).
#[derive(Debug, Clone)]
pub struct PrimaryEndpointStatus {
    pub url: String,
    pub down_since: Option<DateTime<Utc>>,
    pub alerted: bool,
}

impl PrimaryEndpointStatus {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), down_since: None, alerted: false }
    }

    /// Returns `Some(downtime)` the first time downtime crosses the
    /// 1-hour threshold for this down period.
    pub fn on_probe_failure(&mut self, now: DateTime<Utc>, threshold: chrono::Duration) -> Option<chrono::Duration> {
        match self.down_since {
            None => {
                self.down_since = Some(now);
                self.alerted = false;
                None
            }
            Some(since) => {
                let downtime = now - since;
                if downtime >= threshold && !self.alerted {
                    self.alerted = true;
                    Some(downtime)
                } else {
                    None
                }
            }
        }
    }

    pub fn on_probe_success(&mut self) {
        self.down_since = None;
        self.alerted = false;
    }
}
