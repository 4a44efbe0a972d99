//! Snapshot assembly: one scrape per pod in, one immutable snapshot out.

use tracing::{debug, warn};

use inferlb_core::{Pod, PodMetrics, PodMetricsSnapshot};

use crate::error::{IngestResult, SnapshotError};
use crate::prometheus::ExpositionParser;

/// A pod left out of the snapshot and the reason why.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedPod {
    pub pod: Pod,
    pub reason: String,
}

/// Collects scrape results for a single scheduling decision.
///
/// Unhealthy pods and pods whose metrics fail to parse are excluded
/// individually; they never abort the snapshot.
pub struct SnapshotBuilder {
    parser: ExpositionParser,
    target_metric: Option<String>,
    pods: Vec<PodMetrics>,
    excluded: Vec<ExcludedPod>,
}

impl SnapshotBuilder {
    pub fn new() -> IngestResult<Self> {
        Ok(Self {
            parser: ExpositionParser::new()?,
            target_metric: None,
            pods: Vec::new(),
            excluded: Vec::new(),
        })
    }

    /// Also capture `name` as each pod's user-selected metric.
    pub fn with_target_metric(mut self, name: Option<String>) -> Self {
        self.target_metric = name;
        self
    }

    /// Add the scrape result for one backend.
    pub fn add_scrape(&mut self, pod: Pod, healthy: bool, text: &str) -> &mut Self {
        if !healthy {
            debug!(%pod, "skipping unhealthy pod");
            self.excluded.push(ExcludedPod {
                pod,
                reason: "unhealthy".to_string(),
            });
            return self;
        }

        match self
            .parser
            .pod_metrics(pod.clone(), text, self.target_metric.as_deref())
        {
            Ok(pm) => {
                debug!(pod = %pm, "added pod to snapshot");
                self.pods.push(pm);
            }
            Err(e) => {
                warn!(%pod, error = %e, "excluding pod with unreadable metrics");
                self.excluded.push(ExcludedPod {
                    pod,
                    reason: e.to_string(),
                });
            }
        }
        self
    }

    /// Add already-structured metrics, e.g. from another ingestion path.
    pub fn add_pod_metrics(&mut self, pm: PodMetrics) -> &mut Self {
        self.pods.push(pm);
        self
    }

    pub fn excluded(&self) -> &[ExcludedPod] {
        &self.excluded
    }

    /// Freeze the collected pods into a snapshot.
    ///
    /// Fails fast when no pod survived, so the scheduler is never run on an
    /// empty set.
    pub fn build(self) -> Result<PodMetricsSnapshot, SnapshotError> {
        if self.pods.is_empty() {
            warn!(excluded = self.excluded.len(), "no pods available for scheduling");
            return Err(SnapshotError::NoPodsAvailable);
        }
        Ok(PodMetricsSnapshot::new(self.pods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inferlb_core::Metrics;

    fn text(running: u32, waiting: u32, kv: f64) -> String {
        format!(
            "vllm:num_requests_running {running}\nvllm:num_requests_waiting {waiting}\nvllm:gpu_cache_usage_perc {kv}\nvllm:num_preemptions_total 12\n"
        )
    }

    #[test]
    fn builds_snapshot_from_healthy_pods() {
        let mut builder = SnapshotBuilder::new().unwrap();
        builder
            .add_scrape(Pod::new("a", "10.0.0.1:8000"), true, &text(1, 2, 0.3))
            .add_scrape(Pod::new("b", "10.0.0.2:8000"), true, &text(0, 0, 0.1));

        let snapshot = builder.build().unwrap();
        assert_eq!(snapshot.len(), 2);
        let a = snapshot.get(&Pod::new("a", "10.0.0.1:8000")).unwrap();
        assert_eq!(a.metrics.waiting_queue_size, 2);
    }

    #[test]
    fn unhealthy_pods_are_excluded() {
        let mut builder = SnapshotBuilder::new().unwrap();
        builder
            .add_scrape(Pod::new("a", "10.0.0.1:8000"), false, &text(0, 0, 0.0))
            .add_scrape(Pod::new("b", "10.0.0.2:8000"), true, &text(0, 0, 0.0));

        assert_eq!(builder.excluded().len(), 1);
        assert_eq!(builder.excluded()[0].reason, "unhealthy");

        let snapshot = builder.build().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.pods()[0].pod.name, "b");
    }

    #[test]
    fn malformed_metrics_exclude_only_that_pod() {
        let mut builder = SnapshotBuilder::new().unwrap();
        builder
            .add_scrape(Pod::new("bad", "10.0.0.1:8000"), true, "not prometheus {")
            .add_scrape(Pod::new("good", "10.0.0.2:8000"), true, &text(0, 1, 0.2));

        assert_eq!(builder.excluded().len(), 1);
        assert_eq!(builder.excluded()[0].pod.name, "bad");

        let snapshot = builder.build().unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn runaway_queue_gauge_excludes_pod() {
        let flooded = "vllm:num_requests_running 1e30\nvllm:num_requests_waiting 1\nvllm:gpu_cache_usage_perc 0.1\n";
        let mut builder = SnapshotBuilder::new().unwrap();
        builder
            .add_scrape(Pod::new("flooded", "10.0.0.1:8000"), true, flooded)
            .add_scrape(Pod::new("good", "10.0.0.2:8000"), true, &text(3, 1, 0.2));

        assert_eq!(builder.excluded().len(), 1);
        assert_eq!(builder.excluded()[0].pod.name, "flooded");

        let snapshot = builder.build().unwrap();
        assert_eq!(snapshot.pods()[0].metrics.queue_depth(), 4);
    }

    #[test]
    fn empty_snapshot_fails_fast() {
        let mut builder = SnapshotBuilder::new().unwrap();
        builder.add_scrape(Pod::new("a", "10.0.0.1:8000"), false, "");

        let result = builder.build();
        assert!(matches!(result, Err(SnapshotError::NoPodsAvailable)));
    }

    #[test]
    fn target_metric_is_captured_per_pod() {
        let mut builder = SnapshotBuilder::new()
            .unwrap()
            .with_target_metric(Some("vllm:num_preemptions_total".to_string()));
        builder.add_scrape(Pod::new("a", "10.0.0.1:8000"), true, &text(0, 0, 0.0));

        let snapshot = builder.build().unwrap();
        assert_eq!(snapshot.pods()[0].user_metric_value(), Some(12.0));
    }

    #[test]
    fn accepts_structured_metrics() {
        let mut builder = SnapshotBuilder::new().unwrap();
        builder.add_pod_metrics(PodMetrics::new(Pod::new("a", "x"), Metrics::default()));
        assert_eq!(builder.build().unwrap().len(), 1);
    }
}
