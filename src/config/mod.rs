pub mod chains;
pub mod settings;

pub use chains::default_chains;
pub use settings::{ConfigError, Settings};
