use serde::Deserialize;

/// One missed round as reported by the chain's own consensus query, e.g.
/// `XDPoS_getMissedRoundsInEpochByBlockNum` (§4.8 step 2). The monitor
/// treats this as authoritative and never predicts the expected miner
/// purely from masternode position.
#[derive(Debug, Clone, Deserialize)]
pub struct MissedRound {
    pub round: u64,
    #[serde(rename = "blockNumber")]
    pub block_number: u64,
    #[serde(rename = "expectedMiner")]
    pub expected_miner: String,
    #[serde(rename = "actualMiner")]
    pub actual_miner: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MissedRoundsReport {
    #[serde(default)]
    pub missed: Vec<MissedRound>,
}

/// Outcome of analyzing one reported missed round against its surrounding
/// blocks (§4.8 step 3).
#[derive(Debug, Clone, Copy)]
pub struct TimeoutAnalysis {
    pub skipped_count: u64,
    pub expected_seconds: f64,
    pub actual_seconds: f64,
    pub variance_seconds: f64,
    pub consistent: bool,
}

const SECONDS_PER_SKIPPED_ROUND: f64 = 10.0;
const CONSISTENCY_TOLERANCE_SECONDS: f64 = 2.0;

impl TimeoutAnalysis {
    pub fn compute(skipped_count: u64, actual_seconds: f64) -> Self {
        let expected_seconds = SECONDS_PER_SKIPPED_ROUND * skipped_count as f64;
        let variance_seconds = (actual_seconds - expected_seconds).abs();
        Self {
            skipped_count,
            expected_seconds,
            actual_seconds,
            variance_seconds,
            consistent: variance_seconds <= CONSISTENCY_TOLERANCE_SECONDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_e_variance_is_nine_and_inconsistent() {
        let analysis = TimeoutAnalysis::compute(2, 29.0);
        assert_eq!(analysis.expected_seconds, 20.0);
        assert_eq!(analysis.variance_seconds, 9.0);
        assert!(!analysis.consistent);
    }

    #[test]
    fn variance_within_tolerance_is_consistent() {
        let analysis = TimeoutAnalysis::compute(1, 11.5);
        assert_eq!(analysis.variance_seconds, 1.5);
        assert!(analysis.consistent);
    }

    #[test]
    fn variance_at_exactly_two_seconds_is_consistent() {
        let analysis = TimeoutAnalysis::compute(1, 12.0);
        assert_eq!(analysis.variance_seconds, 2.0);
        assert!(analysis.consistent);
    }
}
