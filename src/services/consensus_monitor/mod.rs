mod masternode;
mod missed_round;
mod monitor;
mod performance;

pub use masternode::skipped_count;
pub use missed_round::{MissedRound, MissedRoundsReport, TimeoutAnalysis};
pub use monitor::ConsensusMonitor;
pub use performance::MinerPerformanceRecord;
