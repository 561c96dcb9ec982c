mod block_data;
mod monitor;
mod primary_status;
mod selection;
mod sync_lag;
mod tx_analysis;

pub use block_data::{BlockObservation, RawBlock};
pub use monitor::BlockMonitor;
pub use primary_status::PrimaryEndpointStatus;
pub use selection::select_best;
pub use sync_lag::{variance, LagClass, LagGroup};
pub use tx_analysis::{analyze, batch_size, TxAnalysis};
