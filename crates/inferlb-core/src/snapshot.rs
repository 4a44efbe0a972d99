//! Request-scoped, immutable view of every schedulable pod.

use serde::Serialize;

use crate::types::{Pod, PodMetrics};

/// Metrics for all healthy pods, assembled once per scheduling decision.
///
/// There is no mutating API: once built, the snapshot is read-only, so any
/// number of filters can borrow from it without coordination.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PodMetricsSnapshot {
    pods: Vec<PodMetrics>,
}

impl PodMetricsSnapshot {
    pub fn new(pods: Vec<PodMetrics>) -> Self {
        Self { pods }
    }

    pub fn pods(&self) -> &[PodMetrics] {
        &self.pods
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    pub fn get(&self, pod: &Pod) -> Option<&PodMetrics> {
        self.pods.iter().find(|pm| &pm.pod == pod)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PodMetrics> {
        self.pods.iter()
    }
}

impl FromIterator<PodMetrics> for PodMetricsSnapshot {
    fn from_iter<I: IntoIterator<Item = PodMetrics>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
