//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while picking a pod for a request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulingError {
    #[error("no pods available for scheduling")]
    NoPodsAvailable,

    #[error("failed to apply filter chain, resulted in {remaining} pods: insufficient backend capacity, dropping request")]
    InsufficientCapacity { remaining: usize },

    #[error("failed to apply filter chain, resulted in {remaining} pods: no pods satisfied filter {last_filter:?}")]
    ChainExhausted { remaining: usize, last_filter: String },

    #[error("unknown scheduling policy: {0}")]
    UnknownPolicy(String),

    #[error("scheduling policy {0:?} requires a target metric")]
    MissingTargetMetric(String),
}

pub type SchedulerResult<T> = Result<T, SchedulingError>;

/// How a failed decision should be surfaced to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Backends exist but none has room; the client may retry later.
    Backpressure,
    /// No healthy backend exists at all.
    Unavailable,
    /// The policy configuration cannot produce a chain.
    Misconfigured,
}

impl Rejection {
    /// HTTP status the gateway answers with.
    pub fn status_code(self) -> u16 {
        match self {
            Rejection::Backpressure => 429,
            Rejection::Unavailable => 503,
            Rejection::Misconfigured => 500,
        }
    }
}

impl SchedulingError {
    pub fn rejection(&self) -> Rejection {
        match self {
            SchedulingError::InsufficientCapacity { .. } | SchedulingError::ChainExhausted { .. } => {
                Rejection::Backpressure
            }
            SchedulingError::NoPodsAvailable => Rejection::Unavailable,
            SchedulingError::UnknownPolicy(_) | SchedulingError::MissingTargetMetric(_) => {
                Rejection::Misconfigured
            }
        }
    }

    /// True when the request was deliberately shed to protect critical traffic.
    pub fn is_shed(&self) -> bool {
        matches!(self, SchedulingError::InsufficientCapacity { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shed_and_exhausted_share_backpressure_class() {
        let shed = SchedulingError::InsufficientCapacity { remaining: 0 };
        let exhausted = SchedulingError::ChainExhausted {
            remaining: 0,
            last_filter: "least user metric".to_string(),
        };

        assert_eq!(shed.rejection(), Rejection::Backpressure);
        assert_eq!(exhausted.rejection(), Rejection::Backpressure);
        assert!(shed.is_shed());
        assert!(!exhausted.is_shed());
    }

    #[test]
    fn empty_snapshot_is_unavailable() {
        let err = SchedulingError::NoPodsAvailable;
        assert_eq!(err.rejection().status_code(), 503);
        assert_eq!(err.to_string(), "no pods available for scheduling");
    }

    #[test]
    fn shed_maps_to_429() {
        let err = SchedulingError::InsufficientCapacity { remaining: 0 };
        assert_eq!(err.rejection().status_code(), 429);
        assert!(err.to_string().contains("resulted in 0 pods"));
    }
}
