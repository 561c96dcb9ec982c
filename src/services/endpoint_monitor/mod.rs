mod monitor;
mod state;

pub use monitor::RpcEndpointMonitor;
pub use state::{EndpointState, EndpointStatusSnapshot, Status};
