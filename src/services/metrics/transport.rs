use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use thiserror::Error;

use super::line_protocol::encode_batch;
use super::types::Measurement;

/// The metrics sink cannot reach the external time-series store.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("connection refused")]
    ConnectionRefused,
    #[error("timed out")]
    Timeout,
    #[error("dns resolution failed: {0}")]
    Dns(String),
    #[error("host unreachable")]
    HostUnreachable,
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Abstraction over the external time-series store so the sink can be
/// tested without a live store and so a non-InfluxDB backend can be slotted
/// in later without touching buffering/reconnect logic.
#[async_trait]
pub trait MetricsTransport: Send + Sync {
    async fn write_batch(&self, measurements: &[Measurement]) -> Result<(), TransportError>;

    /// Query the most recent positive block height written for
    /// (chain_id, endpoint) within `lookback`, used to warm the sentinel
    /// cache at startup (§4.9).
    async fn query_last_block_height(
        &self,
        chain_id: u64,
        endpoint: &str,
        lookback: ChronoDuration,
    ) -> Result<Option<u64>, TransportError>;
}

/// InfluxDB-compatible HTTP write API transport (§4.4: `METRICS_URL` is
/// authoritative per spec.md's open question over a Prometheus exposition
/// path).
pub struct HttpMetricsTransport {
    http: reqwest::Client,
    write_url: String,
    query_url: String,
    token: String,
}

impl HttpMetricsTransport {
    pub fn new(base_url: &str, org: &str, bucket: &str, token: &str) -> Self {
        let write_url = format!(
            "{}/api/v2/write?org={}&bucket={}&precision=ns",
            base_url.trim_end_matches('/'),
            org,
            bucket
        );
        let query_url = format!("{}/api/v2/query?org={}", base_url.trim_end_matches('/'), org);
        Self {
            http: reqwest::Client::new(),
            write_url,
            query_url,
            token: token.to_string(),
        }
    }

    fn classify_error(err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::ConnectionRefused
        } else {
            TransportError::HostUnreachable
        }
    }
}

#[async_trait]
impl MetricsTransport for HttpMetricsTransport {
    async fn write_batch(&self, measurements: &[Measurement]) -> Result<(), TransportError> {
        if measurements.is_empty() {
            return Ok(());
        }

        let body = encode_batch(measurements);
        let response = self
            .http
            .post(&self.write_url)
            .header("Authorization", format!("Token {}", self.token))
            .header("content-type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| Self::classify_error(&e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected(format!("http status {}", response.status())))
        }
    }

    async fn query_last_block_height(
        &self,
        chain_id: u64,
        endpoint: &str,
        lookback: ChronoDuration,
    ) -> Result<Option<u64>, TransportError> {
        let since = Utc::now() - lookback;
        let flux = format!(
            "from(bucket: \"\") |> range(start: {}) |> filter(fn: (r) => r._measurement == \"block_height\" and r.chain_id == \"{}\" and r.endpoint == \"{}\") |> last()",
            since.to_rfc3339(),
            chain_id,
            endpoint
        );

        let response = self
            .http
            .post(&self.query_url)
            .header("Authorization", format!("Token {}", self.token))
            .header("content-type", "application/vnd.flux")
            .body(flux)
            .send()
            .await
            .map_err(|e| Self::classify_error(&e))?;

        if !response.status().is_success() {
            return Err(TransportError::Rejected(format!("http status {}", response.status())));
        }

        let body = response.text().await.map_err(|e| Self::classify_error(&e))?;
        Ok(parse_last_value_csv(&body))
    }
}

/// Pull the final numeric `_value` column out of an InfluxDB CSV query
/// response. Returns `None` if the result set is empty.
fn parse_last_value_csv(body: &str) -> Option<u64> {
    let mut header: Option<Vec<&str>> = None;
    let mut last_value = None;

    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let columns: Vec<&str> = line.split(',').collect();
        if header.is_none() {
            header = Some(columns);
            continue;
        }
        if let Some(cols) = &header {
            if let Some(idx) = cols.iter().position(|c| *c == "_value") {
                if let Some(raw) = columns.get(idx) {
                    if let Ok(v) = raw.trim().parse::<u64>() {
                        last_value = Some(v);
                    }
                }
            }
        }
    }

    last_value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_last_value_from_flux_csv() {
        let csv = "result,table,_value\n_result,0,100\n_result,0,105\n";
        assert_eq!(parse_last_value_csv(csv), Some(105));
    }

    #[test]
    fn empty_csv_has_no_value() {
        assert_eq!(parse_last_value_csv(""), None);
    }
}
