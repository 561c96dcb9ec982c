mod line_protocol;
mod sink;
mod transport;
mod types;

pub use sink::{ConnectionState, MetricsSink, MetricsSinkConfig, ReconnectState};
pub use transport::{HttpMetricsTransport, MetricsTransport, TransportError};
pub use types::{FieldValue, Measurement, SentinelConfig};
