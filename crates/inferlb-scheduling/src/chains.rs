//! Canonical filter chains.
//!
//! ```text
//! critical request
//!   ├── success: low queueing
//!   │     ├── success: lora affinity
//!   │     │     ├── success: least queuing → least kv cache
//!   │     │     └── failure: can accept new lora ⇒ least queuing → least kv cache
//!   │     └── failure: least queuing → low lora cost → least kv cache
//!   └── failure: sheddable request
//!         ├── success: least queuing → low lora cost → least kv cache
//!         └── failure: drop request
//! ```

use inferlb_core::{SelectionMode, Thresholds};

use crate::chain::FilterNode;
use crate::filter::{Filter, Predicate, SelectionMetric};

fn least_queuing(mode: SelectionMode) -> FilterNode {
    FilterNode::new("least queuing", Filter::select(SelectionMetric::LeastQueuing, mode))
}

fn least_kv_cache(mode: SelectionMode) -> FilterNode {
    FilterNode::new("least kv cache", Filter::select(SelectionMetric::LeastKvCache, mode))
}

/// The common tail every path converges to: least queuing, optionally the
/// low-LoRA-cost predicate, then least KV cache.
pub fn terminal_chain(mode: SelectionMode, with_lora_cost: bool) -> FilterNode {
    let tail = least_kv_cache(mode);
    let tail = if with_lora_cost {
        FilterNode::new("low lora cost", Filter::predicate(Predicate::LowLoraCost)).then(tail)
    } else {
        tail
    };
    least_queuing(mode).then(tail)
}

/// Path for critical requests: chase adapter affinity while queues are calm.
pub fn latency_path(thresholds: &Thresholds, mode: SelectionMode) -> FilterNode {
    let affinity = FilterNode::new("lora affinity", Filter::predicate(Predicate::LoraAffinity))
        .on_success(terminal_chain(mode, false))
        .on_failure(
            FilterNode::new("can accept new lora", Filter::predicate(Predicate::CanAcceptNewLora))
                .then(terminal_chain(mode, false)),
        );

    FilterNode::new(
        "low queueing",
        Filter::predicate(Predicate::LowQueueing {
            threshold: thresholds.low_queue,
        }),
    )
    .on_success(affinity)
    .on_failure(terminal_chain(mode, true))
}

/// Leaf that sheds the request.
pub fn drop_node() -> FilterNode {
    FilterNode::new("drop request", Filter::Drop)
}

/// Path for sheddable requests: admit only onto pods with spare capacity.
pub fn shed_path(thresholds: &Thresholds, mode: SelectionMode) -> FilterNode {
    FilterNode::new(
        "sheddable request",
        Filter::predicate(Predicate::no_queue_and_less_than_kv_cache(
            thresholds.queue_critical,
            thresholds.kv_cache,
        )),
    )
    .on_success(terminal_chain(mode, true))
    .on_failure(drop_node())
}

/// The full decision tree, rooted on request criticality.
pub fn decision_tree(thresholds: &Thresholds, mode: SelectionMode) -> FilterNode {
    FilterNode::new("critical request", Filter::predicate(Predicate::CriticalRequest))
        .on_success(latency_path(thresholds, mode))
        .on_failure(shed_path(thresholds, mode))
}

/// Single-node chain ignoring criticality and adapters.
pub fn least_queue_chain(mode: SelectionMode) -> FilterNode {
    least_queuing(mode)
}

/// Rank by the user-selected metric, then break ties on queue depth.
pub fn user_metric_chain(target_metric: &str, most: bool, mode: SelectionMode) -> FilterNode {
    let (label, metric) = if most {
        ("most", SelectionMetric::MostUserMetric)
    } else {
        ("least", SelectionMetric::LeastUserMetric)
    };
    FilterNode::new(format!("{label} {target_metric}"), Filter::select(metric, mode))
        .then(least_queuing(mode))
}
