use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use super::alert::Alert;

#[derive(Debug, Error, Clone)]
pub enum ChannelError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("channel rejected delivery: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn id(&self) -> &str;
    fn enabled(&self) -> bool;
    async fn send(&self, alert: &Alert) -> Result<(), ChannelError>;
}

#[derive(Serialize)]
struct AlertEnvelopeInner<'a> {
    id: &'a str,
    severity: &'a str,
    category: &'a str,
    component: &'a str,
    title: &'a str,
    message: &'a str,
    timestamp: i64,
    metadata: &'a std::collections::HashMap<String, String>,
}

#[derive(Serialize)]
struct AlertEnvelope<'a> {
    alert: AlertEnvelopeInner<'a>,
}

fn envelope(alert: &Alert) -> AlertEnvelope<'_> {
    AlertEnvelope {
        alert: AlertEnvelopeInner {
            id: &alert.id,
            severity: alert.severity.as_str(),
            category: alert.category.as_str(),
            component: &alert.component,
            title: &alert.title,
            message: &alert.message,
            timestamp: alert.created_at.timestamp(),
            metadata: &alert.metadata,
        },
    }
}

/// Posts the §4.5 JSON envelope to a webhook URL.
pub struct WebhookChannel {
    id: String,
    enabled: bool,
    url: String,
    http: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(id: impl Into<String>, url: impl Into<String>, enabled: bool) -> Self {
        Self {
            id: id.into(),
            enabled,
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }

    fn classify(err: &reqwest::Error) -> ChannelError {
        if err.is_timeout() {
            ChannelError::Timeout
        } else {
            ChannelError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let response = self
            .http
            .post(&self.url)
            .json(&envelope(alert))
            .send()
            .await
            .map_err(|e| Self::classify(&e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::Rejected(format!("http status {}", response.status())))
        }
    }
}

/// Composes a human-readable message and posts it to a chat-bot API.
pub struct ChatBotChannel {
    id: String,
    enabled: bool,
    endpoint: String,
    bot_token: String,
    chat_id: String,
    http: reqwest::Client,
}

impl ChatBotChannel {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>, bot_token: impl Into<String>, chat_id: impl Into<String>, enabled: bool) -> Self {
        Self {
            id: id.into(),
            enabled,
            endpoint: endpoint.into(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            http: reqwest::Client::new(),
        }
    }

    fn format_message(alert: &Alert) -> String {
        format!(
            "[{}] {} ({}/{})\n{}",
            alert.severity.as_str().to_uppercase(),
            alert.title,
            alert.category.as_str(),
            alert.component,
            alert.message
        )
    }
}

#[async_trait]
impl NotificationChannel for ChatBotChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": Self::format_message(alert),
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::Rejected(format!("http status {}", response.status())))
        }
    }
}

/// A sink the dashboard UI polls; always succeeds, just retains the alert
/// (storage happens in the router's ring buffer, not here).
pub struct DashboardChannel {
    id: String,
    enabled: bool,
}

impl DashboardChannel {
    pub fn new(id: impl Into<String>, enabled: bool) -> Self {
        Self { id: id.into(), enabled }
    }
}

#[async_trait]
impl NotificationChannel for DashboardChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, _alert: &Alert) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Specified but not required by the core (§4.5); left unimplemented
/// pending a concrete SMTP/API choice.
pub struct EmailChannel {
    id: String,
    enabled: bool,
}

impl EmailChannel {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), enabled: false }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, _alert: &Alert) -> Result<(), ChannelError> {
        Err(ChannelError::Rejected("email channel not configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::alerts::alert::{AlertOptions, Category, Severity};
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn webhook_channel_posts_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let channel = WebhookChannel::new("w1", format!("{}/hook", server.uri()), true);
        let alert = Alert::from_options(
            AlertOptions::new(Severity::Critical, Category::Rpc, "endpoint-monitor", "down", "primary endpoint unreachable"),
            Utc::now(),
        );

        assert!(channel.send(&alert).await.is_ok());
    }

    #[tokio::test]
    async fn webhook_channel_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let channel = WebhookChannel::new("w1", server.uri(), true);
        let alert = Alert::from_options(AlertOptions::new(Severity::Info, Category::System, "x", "t", "m"), Utc::now());

        assert!(matches!(channel.send(&alert).await, Err(ChannelError::Rejected(_))));
    }

    #[tokio::test]
    async fn dashboard_channel_always_succeeds() {
        let channel = DashboardChannel::new("dash", true);
        let alert = Alert::from_options(AlertOptions::new(Severity::Info, Category::System, "x", "t", "m"), Utc::now());
        assert!(channel.send(&alert).await.is_ok());
    }
}
