pub mod model;

pub use model::{ChainDescriptor, EndpointKind, RpcEndpoint};
