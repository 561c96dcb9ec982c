use serde::Deserialize;

/// Raw JSON-RPC block shape, the subset this service reads from
/// `eth_getBlockByNumber` (§4.7).
#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    pub number: String,
    pub timestamp: String,
    pub transactions: Vec<serde_json::Value>,
    #[serde(default)]
    pub miner: Option<String>,
    #[serde(default)]
    pub round: Option<String>,
}

/// Parsed view of one block, short-lived for the duration of one probe
/// cycle (§3 Entities: BlockObservation).
#[derive(Debug, Clone)]
pub struct BlockObservation {
    pub block_number: u64,
    pub timestamp: i64,
    pub tx_hashes: Vec<String>,
    pub miner: Option<String>,
    pub round: Option<u64>,
}

pub fn parse_hex_u64(raw: &str) -> Option<u64> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

impl RawBlock {
    pub fn into_observation(self) -> Option<BlockObservation> {
        let block_number = parse_hex_u64(&self.number)?;
        let timestamp = parse_hex_u64(&self.timestamp)? as i64;
        let round = self.round.as_deref().and_then(parse_hex_u64);

        let tx_hashes = self
            .transactions
            .iter()
            .map(|tx| match tx {
                serde_json::Value::String(hash) => hash.clone(),
                serde_json::Value::Object(obj) => obj.get("hash").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                _ => String::new(),
            })
            .filter(|hash| !hash.is_empty())
            .collect();

        Some(BlockObservation {
            block_number,
            timestamp,
            tx_hashes,
            miner: self.miner,
            round,
        })
    }
}
