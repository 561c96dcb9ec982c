use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

use super::error::{RpcError, RpcExhausted};
use super::jsonrpc::{IdSequence, JsonRpcRequest, JsonRpcResponse};

/// Tuning knobs for one `RpcClient`. Separate instances exist for the
/// endpoint monitor's short-timeout probes (§4.6) and the block monitor's
/// long-timeout reads (§4.7).
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

impl RpcClientConfig {
    /// Short-timeout config used by health probes (§4.6 step 1).
    pub fn probe() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            max_retries: 1,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
        }
    }

    /// Long-timeout config used by the block monitor against a selected
    /// best endpoint (§4.7 step 3).
    pub fn block_fetch() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let millis = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32 - 1) * 1000.0;
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

/// Resilient JSON-RPC client. Holds a primary URL and an ordered list of
/// fallbacks that can be promoted at runtime (§4.1).
pub struct RpcClient {
    http: reqwest::Client,
    primary_url: RwLock<String>,
    fallback_urls: RwLock<Vec<String>>,
    config: RpcClientConfig,
    ids: IdSequence,
}

impl RpcClient {
    pub fn new(primary_url: impl Into<String>, config: RpcClientConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .unwrap_or_default(),
            primary_url: RwLock::new(primary_url.into()),
            fallback_urls: RwLock::new(Vec::new()),
            config,
            ids: IdSequence::new(),
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<String>) -> Self {
        self.fallback_urls = RwLock::new(fallbacks);
        self
    }

    pub async fn set_primary_url(&self, url: impl Into<String>) {
        *self.primary_url.write().await = url.into();
    }

    pub async fn set_fallback_urls(&self, urls: Vec<String>) {
        *self.fallback_urls.write().await = urls;
    }

    pub async fn primary_url(&self) -> String {
        self.primary_url.read().await.clone()
    }

    async fn urls_in_order(&self) -> Vec<String> {
        let mut urls = vec![self.primary_url.read().await.clone()];
        urls.extend(self.fallback_urls.read().await.iter().cloned());
        urls
    }

    /// Issue a JSON-RPC call, retrying with backoff on the current URL and
    /// falling back to the next configured URL once retries are exhausted.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcExhausted> {
        let urls = self.urls_in_order().await;
        let mut last_reason = "no urls configured".to_string();
        let mut urls_tried = 0usize;

        for url in &urls {
            urls_tried += 1;
            for attempt in 1..=self.config.max_retries.max(1) {
                match self.execute_once(url, method, params.clone()).await {
                    Ok(value) => {
                        return serde_json::from_value(value).map_err(|e| RpcExhausted {
                            method: method.to_string(),
                            urls_tried,
                            last_reason: format!("failed to parse result: {e}"),
                        });
                    }
                    Err(err) => {
                        last_reason = err.reason.clone();
                        if attempt < self.config.max_retries.max(1) {
                            tokio::time::sleep(self.config.delay_for_attempt(attempt)).await;
                        }
                    }
                }
            }
        }

        Err(RpcExhausted {
            method: method.to_string(),
            urls_tried,
            last_reason,
        })
    }

    async fn execute_once(&self, url: &str, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = JsonRpcRequest::new(self.ids.next(), method, params);

        let response = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError {
                url: url.to_string(),
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RpcError {
                url: url.to_string(),
                method: method.to_string(),
                reason: format!("http status {}", response.status()),
            });
        }

        let body: JsonRpcResponse = response.json().await.map_err(|e| RpcError {
            url: url.to_string(),
            method: method.to_string(),
            reason: format!("invalid json-rpc envelope: {e}"),
        })?;

        if let Some(error) = body.error {
            return Err(RpcError {
                url: url.to_string(),
                method: method.to_string(),
                reason: format!("rpc error {}: {}", error.code, error.message),
            });
        }

        // A `result` of JSON null is a successful call returning null.
        Ok(body.result.unwrap_or(Value::Null))
    }
}

/// Clamp a latency reading to zero; negative values only arise from clock
/// skew and must never be emitted to the metrics sink (§4.1 edge cases).
pub fn clamp_latency_ms(latency: i64) -> i64 {
    latency.max(0)
}

/// Measure latency around an async call and clamp it before it is reported.
pub async fn timed<F, T, E>(fut: F) -> (Result<T, E>, i64)
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = fut.await;
    let latency_ms = clamp_latency_ms(start.elapsed().as_millis() as i64);
    (result, latency_ms)
}

pub type SharedRpcClient = Arc<RpcClient>;
