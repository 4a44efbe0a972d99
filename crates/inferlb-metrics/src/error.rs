//! Metrics ingestion error types.

use thiserror::Error;

/// Errors raised while parsing one pod's metrics text.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed sample on line {line}: {content}")]
    MalformedLine { line: usize, content: String },

    #[error("invalid value {value:?} for metric {metric}")]
    InvalidValue { metric: String, value: String },

    #[error("invalid label {label}={value:?} on metric {metric}")]
    InvalidLabel {
        metric: String,
        label: String,
        value: String,
    },

    #[error("required metric missing: {0}")]
    MissingMetric(&'static str),

    #[error("invalid sample pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Errors raised while assembling a snapshot across pods.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no pods available for scheduling")]
    NoPodsAvailable,
}
