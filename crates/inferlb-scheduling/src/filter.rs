//! Filters: the primitive steps of a chain.
//!
//! A filter takes a request and a candidate list and returns the subset of
//! candidates it keeps. Two families exist:
//! - **Predicates** keep every pod passing a boolean test.
//! - **Selections** compute a statistic across the candidates and keep the
//!   pods achieving its minimum.
//!
//! An empty result is the failure signal the chain branches on. Filters
//! never reorder or add pods, so their output is always a subset of their
//! input.

use serde::{Deserialize, Serialize};

use inferlb_core::{LlmRequest, PodMetrics, SelectionMode};

/// A per-pod boolean test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Request-level gate: every pod passes iff the request is critical.
    CriticalRequest,
    /// `waiting_queue_size < threshold`.
    LowQueueing { threshold: usize },
    /// The requested adapter is already resident.
    LoraAffinity,
    /// The pod has a free adapter slot.
    CanAcceptNewLora,
    /// The adapter is resident or there is room to load it.
    LowLoraCost,
    /// `waiting_queue_size <= queue_threshold && kv_cache_usage_percent < kv_cache_threshold`.
    NoQueueAndLessThanKvCache {
        queue_threshold: usize,
        kv_cache_threshold: f64,
    },
}

impl Predicate {
    pub fn no_queue_and_less_than_kv_cache(queue_threshold: usize, kv_cache_threshold: f64) -> Self {
        Predicate::NoQueueAndLessThanKvCache {
            queue_threshold,
            kv_cache_threshold,
        }
    }

    pub fn test(&self, req: &LlmRequest, pod: &PodMetrics) -> bool {
        let m = &pod.metrics;
        match *self {
            Predicate::CriticalRequest => req.critical,
            Predicate::LowQueueing { threshold } => m.waiting_queue_size < threshold,
            Predicate::LoraAffinity => m.has_adapter(&req.model),
            Predicate::CanAcceptNewLora => m.has_free_adapter_slot(),
            Predicate::LowLoraCost => m.has_adapter(&req.model) || m.has_free_adapter_slot(),
            Predicate::NoQueueAndLessThanKvCache {
                queue_threshold,
                kv_cache_threshold,
            } => m.waiting_queue_size <= queue_threshold && m.kv_cache_usage_percent < kv_cache_threshold,
        }
    }
}

/// The statistic a selection filter minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMetric {
    /// `running_queue_size + waiting_queue_size`.
    LeastQueuing,
    LeastKvCache,
    LeastUserMetric,
    MostUserMetric,
}

impl SelectionMetric {
    /// Key to minimize, or `None` when the pod lacks the metric.
    fn key(self, pod: &PodMetrics) -> Option<f64> {
        let key = match self {
            SelectionMetric::LeastQueuing => pod.metrics.queue_depth() as f64,
            SelectionMetric::LeastKvCache => pod.metrics.kv_cache_usage_percent,
            SelectionMetric::LeastUserMetric => pod.user_metric_value()?,
            SelectionMetric::MostUserMetric => -pod.user_metric_value()?,
        };
        key.is_finite().then_some(key)
    }
}

/// A minimizing filter and how wide its tie set is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub metric: SelectionMetric,
    #[serde(default)]
    pub mode: SelectionMode,
}

impl Selection {
    pub fn new(metric: SelectionMetric, mode: SelectionMode) -> Self {
        Self { metric, mode }
    }

    pub fn apply<'a>(&self, pods: &[&'a PodMetrics]) -> Vec<&'a PodMetrics> {
        let keyed: Vec<(&'a PodMetrics, f64)> = pods
            .iter()
            .filter_map(|&pod| self.metric.key(pod).map(|k| (pod, k)))
            .collect();
        if keyed.is_empty() {
            return Vec::new();
        }

        let min = keyed.iter().map(|(_, k)| *k).fold(f64::INFINITY, f64::min);
        let ceiling = match self.mode {
            SelectionMode::Strict => min,
            SelectionMode::Band => {
                let max = keyed.iter().map(|(_, k)| *k).fold(f64::NEG_INFINITY, f64::max);
                min + (max - min) / keyed.len() as f64
            }
        };

        keyed
            .into_iter()
            .filter(|(_, k)| *k <= ceiling)
            .map(|(pod, _)| pod)
            .collect()
    }
}

/// One step of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Predicate(Predicate),
    Select(Selection),
    /// Sheds the request: keeps nothing, whatever the input.
    Drop,
}

impl Filter {
    pub fn predicate(p: Predicate) -> Self {
        Filter::Predicate(p)
    }

    pub fn select(metric: SelectionMetric, mode: SelectionMode) -> Self {
        Filter::Select(Selection::new(metric, mode))
    }

    pub fn apply<'a>(&self, req: &LlmRequest, pods: &[&'a PodMetrics]) -> Vec<&'a PodMetrics> {
        match self {
            Filter::Predicate(p) => pods.iter().copied().filter(|pod| p.test(req, pod)).collect(),
            Filter::Select(s) => s.apply(pods),
            Filter::Drop => Vec::new(),
        }
    }
}
