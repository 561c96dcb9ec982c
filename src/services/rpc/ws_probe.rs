use std::time::{Duration, Instant};

use tokio::time::timeout;
use tokio_tungstenite::connect_async;

/// Probes a WebSocket endpoint by connection attempt only, per §6: "WebSocket
/// endpoints are probed by connection attempt only." Returns the measured
/// latency on success.
pub async fn probe_websocket(url: &str, probe_timeout: Duration) -> Result<i64, String> {
    let start = Instant::now();
    match timeout(probe_timeout, connect_async(url)).await {
        Ok(Ok((mut stream, _response))) => {
            use futures::SinkExt;
            let _ = stream.close(None).await;
            Ok(super::client::clamp_latency_ms(start.elapsed().as_millis() as i64))
        }
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("connection attempt exceeded {probe_timeout:?}")),
    }
}
