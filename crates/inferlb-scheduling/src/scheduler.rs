//! Scheduler: one chain evaluation over one snapshot.
//!
//! The `Scheduler` is built per request from the request's metrics snapshot
//! and the chain root chosen by the policy resolver. It:
//! - Rejects an empty snapshot before touching the chain
//! - Walks the chain to a deterministic set of surviving pods
//! - Picks uniformly at random among the survivors

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use inferlb_core::{LlmRequest, Pod, PodMetrics, PodMetricsSnapshot};

use crate::chain::{Evaluation, FilterNode};
use crate::error::{SchedulerResult, SchedulingError};

/// Picks a pod for a request from a fixed snapshot.
///
/// Holds only borrowed inputs; constructing one performs no I/O.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler<'a> {
    snapshot: &'a PodMetricsSnapshot,
    root: &'a FilterNode,
}

impl<'a> Scheduler<'a> {
    pub fn new(snapshot: &'a PodMetricsSnapshot, root: &'a FilterNode) -> Self {
        Self { snapshot, root }
    }

    /// Walk the chain and return the full evaluation, including the trace.
    pub fn evaluate(&self, req: &LlmRequest) -> SchedulerResult<Evaluation<'a>> {
        if self.snapshot.is_empty() {
            return Err(SchedulingError::NoPodsAvailable);
        }
        Ok(self.root.evaluate(req, self.snapshot.iter().collect()))
    }

    /// The pods a request may be routed to, before the random pick.
    pub fn survivors(&self, req: &LlmRequest) -> SchedulerResult<Vec<&'a PodMetrics>> {
        let eval = self.evaluate(req)?;
        let remaining = eval.pods.len();

        if eval.dropped {
            debug!(%req, "request shed by filter chain");
            return Err(SchedulingError::InsufficientCapacity { remaining });
        }
        if eval.pods.is_empty() {
            let last_filter = eval.last_filter().unwrap_or(self.root.name.as_str()).to_string();
            warn!(%req, %last_filter, "filter chain left no pods");
            return Err(SchedulingError::ChainExhausted {
                remaining,
                last_filter,
            });
        }
        Ok(eval.pods)
    }

    /// Pick a pod for the request.
    pub fn schedule(&self, req: &LlmRequest) -> SchedulerResult<Pod> {
        self.schedule_with_rng(req, &mut rand::thread_rng())
    }

    /// Pick a pod using the given random source for the tie-break.
    pub fn schedule_with_rng<R: Rng + ?Sized>(&self, req: &LlmRequest, rng: &mut R) -> SchedulerResult<Pod> {
        let survivors = self.survivors(req)?;
        let chosen = survivors.choose(rng).ok_or_else(|| SchedulingError::ChainExhausted {
            remaining: 0,
            last_filter: self.root.name.clone(),
        })?;

        debug!(%req, pod = %chosen.pod, candidates = survivors.len(), "selected pod");
        Ok(chosen.pod.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains;
    use crate::filter::{Filter, SelectionMetric};
    use inferlb_core::{Metrics, SelectionMode, Thresholds};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pod(name: &str, waiting: usize, kv: f64) -> PodMetrics {
        PodMetrics::new(
            Pod::new(name, format!("{name}:8000")),
            Metrics {
                waiting_queue_size: waiting,
                kv_cache_usage_percent: kv,
                max_active_models: 4,
                ..Metrics::default()
            },
        )
    }

    fn tree() -> FilterNode {
        chains::decision_tree(&Thresholds::default(), SelectionMode::Strict)
    }

    #[test]
    fn scheduler_creation_is_pure() {
        let snapshot = PodMetricsSnapshot::default();
        let root = tree();
        let scheduler = Scheduler::new(&snapshot, &root);
        assert!(scheduler.snapshot.is_empty());
        assert_eq!(scheduler.root.name, "critical request");
    }

    #[test]
    fn empty_snapshot_errors() {
        let snapshot = PodMetricsSnapshot::default();
        let root = tree();
        let scheduler = Scheduler::new(&snapshot, &root);

        for critical in [true, false] {
            let result = scheduler.schedule(&LlmRequest::new("m", critical));
            assert_eq!(result, Err(SchedulingError::NoPodsAvailable));
        }
    }

    #[test]
    fn shed_request_reports_insufficient_capacity() {
        let snapshot = PodMetricsSnapshot::new(vec![pod("a", 10, 0.2), pod("b", 0, 0.95)]);
        let root = tree();
        let scheduler = Scheduler::new(&snapshot, &root);

        let err = scheduler.schedule(&LlmRequest::new("m", false)).unwrap_err();
        assert_eq!(err, SchedulingError::InsufficientCapacity { remaining: 0 });
        assert!(err.is_shed());
    }

    #[test]
    fn metric_chain_falls_back_to_queue_depth() {
        let snapshot = PodMetricsSnapshot::new(vec![pod("a", 4, 0.2), pod("b", 1, 0.2)]);
        let root = chains::user_metric_chain("custom", false, SelectionMode::Strict);
        let scheduler = Scheduler::new(&snapshot, &root);

        // No pod reports "custom", so the tail ranks the full input.
        let chosen = scheduler.schedule(&LlmRequest::new("m", true)).unwrap();
        assert_eq!(chosen.name, "b");
    }

    #[test]
    fn leaf_with_no_survivors_is_exhausted() {
        let snapshot = PodMetricsSnapshot::new(vec![pod("a", 0, 0.2)]);
        let root = FilterNode::new(
            "least custom",
            Filter::select(SelectionMetric::LeastUserMetric, SelectionMode::Strict),
        );
        let scheduler = Scheduler::new(&snapshot, &root);

        let err = scheduler.schedule(&LlmRequest::new("m", true)).unwrap_err();
        assert_eq!(
            err,
            SchedulingError::ChainExhausted {
                remaining: 0,
                last_filter: "least custom".to_string(),
            }
        );
        assert!(!err.is_shed());
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let snapshot = PodMetricsSnapshot::new(vec![pod("a", 0, 0.2), pod("b", 0, 0.2), pod("c", 0, 0.2)]);
        let root = tree();
        let scheduler = Scheduler::new(&snapshot, &root);
        let req = LlmRequest::new("m", true);

        let first: Vec<Pod> = {
            let mut rng = StdRng::seed_from_u64(7);
            (0..20).map(|_| scheduler.schedule_with_rng(&req, &mut rng).unwrap()).collect()
        };
        let second: Vec<Pod> = {
            let mut rng = StdRng::seed_from_u64(7);
            (0..20).map(|_| scheduler.schedule_with_rng(&req, &mut rng).unwrap()).collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn schedule_returns_survivor() {
        let snapshot = PodMetricsSnapshot::new(vec![pod("busy", 30, 0.7), pod("idle", 0, 0.1)]);
        let root = tree();
        let scheduler = Scheduler::new(&snapshot, &root);

        let chosen = scheduler.schedule(&LlmRequest::new("m", true)).unwrap();
        assert_eq!(chosen.name, "idle");
    }
}
