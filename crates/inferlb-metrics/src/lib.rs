//! inferlb-metrics — turns scraped model-server metrics into scheduling input.
//!
//! Each backend pod exposes Prometheus text. This crate parses that text
//! into the structured [`PodMetrics`](inferlb_core::PodMetrics) record and
//! assembles the request-scoped
//! [`PodMetricsSnapshot`](inferlb_core::PodMetricsSnapshot) the scheduler
//! consumes.
//!
//! # Architecture
//!
//! ```text
//! SnapshotBuilder
//!   ├── add_scrape(pod, healthy, text) ← one call per backend
//!   │   ├── unhealthy → skipped
//!   │   └── ExpositionParser::pod_metrics() → PodMetrics or excluded
//!   └── build() → PodMetricsSnapshot, or NoPodsAvailable
//! ```

pub mod error;
pub mod prometheus;
pub mod snapshot;

pub use error::{IngestError, IngestResult, SnapshotError};
pub use prometheus::{ExpositionParser, Sample};
pub use snapshot::{ExcludedPod, SnapshotBuilder};
