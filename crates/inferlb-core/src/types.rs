//! Shared types used across inferlb crates.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a backend model-serving instance.
///
/// Used as a map key, so it carries only immutable identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pod {
    pub name: String,
    pub address: String,
}

impl Pod {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Pod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.address)
    }
}

/// Live load state of one pod at snapshot time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Adapters resident on the pod's accelerator → load indicator.
    pub active_models: HashMap<String, u32>,
    /// Capacity ceiling for concurrently resident adapters.
    pub max_active_models: usize,
    pub running_queue_size: usize,
    pub waiting_queue_size: usize,
    /// Fraction in [0, 1] of the KV cache that is occupied.
    pub kv_cache_usage_percent: f64,
    pub kv_cache_max_token_capacity: usize,
}

impl Metrics {
    /// Total requests either in flight or queued, saturating at `usize::MAX`.
    pub fn queue_depth(&self) -> usize {
        self.running_queue_size.saturating_add(self.waiting_queue_size)
    }

    pub fn has_adapter(&self, model: &str) -> bool {
        self.active_models.contains_key(model)
    }

    /// Whether another adapter can be loaded without evicting one.
    pub fn has_free_adapter_slot(&self) -> bool {
        self.active_models.len() < self.max_active_models
    }
}

/// An externally chosen metric a pluggable policy can rank pods by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSelectedMetric {
    pub name: String,
    pub value: f64,
}

/// A pod together with its metrics at snapshot time.
///
/// `Clone` copies the `active_models` map, so a clone never shares
/// bookkeeping with the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodMetrics {
    pub pod: Pod,
    pub metrics: Metrics,
    pub user_metric: Option<UserSelectedMetric>,
}

impl PodMetrics {
    pub fn new(pod: Pod, metrics: Metrics) -> Self {
        Self {
            pod,
            metrics,
            user_metric: None,
        }
    }

    pub fn with_user_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.user_metric = Some(UserSelectedMetric {
            name: name.into(),
            value,
        });
        self
    }

    /// Value of the user-selected metric, if this pod reported one.
    pub fn user_metric_value(&self) -> Option<f64> {
        self.user_metric.as_ref().map(|m| m.value)
    }
}

impl fmt::Display for PodMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} running={} waiting={} kv={:.2} adapters={}/{}",
            self.pod,
            self.metrics.running_queue_size,
            self.metrics.waiting_queue_size,
            self.metrics.kv_cache_usage_percent,
            self.metrics.active_models.len(),
            self.metrics.max_active_models,
        )
    }
}

/// The inbound unit of work being scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Adapter or model identifier requested.
    pub model: String,
    /// Critical requests are never shed; sheddable ones may be rejected under load.
    pub critical: bool,
    /// Metric name used by custom-metric policies. Opaque to the built-in chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_metric: Option<String>,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, critical: bool) -> Self {
        Self {
            model: model.into(),
            critical,
            target_metric: None,
        }
    }
}

impl fmt::Display for LlmRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = if self.critical { "critical" } else { "sheddable" };
        write!(f, "{} ({class})", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_display_includes_address() {
        let pod = Pod::new("pod-1", "10.0.0.1:8000");
        assert_eq!(pod.to_string(), "pod-1(10.0.0.1:8000)");
    }

    #[test]
    fn pod_usable_as_map_key() {
        let mut hits: HashMap<Pod, u32> = HashMap::new();
        *hits.entry(Pod::new("a", "10.0.0.1:8000")).or_default() += 1;
        *hits.entry(Pod::new("a", "10.0.0.1:8000")).or_default() += 1;
        *hits.entry(Pod::new("b", "10.0.0.2:8000")).or_default() += 1;

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[&Pod::new("a", "10.0.0.1:8000")], 2);
    }

    #[test]
    fn clone_does_not_share_active_models() {
        let mut metrics = Metrics::default();
        metrics.active_models.insert("sql-lora".to_string(), 1);
        let original = PodMetrics::new(Pod::new("p", "addr"), metrics);

        let mut copy = original.clone();
        copy.metrics.active_models.insert("tweet-lora".to_string(), 1);
        copy.metrics.active_models.remove("sql-lora");

        assert!(original.metrics.has_adapter("sql-lora"));
        assert!(!original.metrics.has_adapter("tweet-lora"));
    }

    #[test]
    fn adapter_slot_accounting() {
        let mut metrics = Metrics {
            max_active_models: 2,
            ..Metrics::default()
        };
        assert!(metrics.has_free_adapter_slot());

        metrics.active_models.insert("a".to_string(), 1);
        metrics.active_models.insert("b".to_string(), 3);
        assert!(!metrics.has_free_adapter_slot());
        assert!(metrics.has_adapter("b"));
    }

    #[test]
    fn queue_depth_sums_running_and_waiting() {
        let metrics = Metrics {
            running_queue_size: 3,
            waiting_queue_size: 4,
            ..Metrics::default()
        };
        assert_eq!(metrics.queue_depth(), 7);
    }

    #[test]
    fn queue_depth_saturates() {
        let metrics = Metrics {
            running_queue_size: usize::MAX,
            waiting_queue_size: 1,
            ..Metrics::default()
        };
        assert_eq!(metrics.queue_depth(), usize::MAX);
    }

    #[test]
    fn request_serializes_without_empty_target_metric() {
        let req = LlmRequest::new("m1", true);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("target_metric"));

        let back: LlmRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn user_metric_value_reflects_builder() {
        let pm = PodMetrics::new(Pod::new("p", "addr"), Metrics::default())
            .with_user_metric("vllm:num_requests_waiting", 3.0);
        assert_eq!(pm.user_metric_value(), Some(3.0));
    }
}
