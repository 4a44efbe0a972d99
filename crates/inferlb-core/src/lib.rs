pub mod config;
pub mod snapshot;
pub mod types;

pub use config::{ConfigError, InferlbConfig, PolicyConfig, SelectionConfig, SelectionMode, Thresholds};
pub use snapshot::PodMetricsSnapshot;
pub use types::*;
