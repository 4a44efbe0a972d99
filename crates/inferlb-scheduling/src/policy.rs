//! Policy resolution: configuration in, chain root out.
//!
//! Kept apart from the scheduler so new policies only add a variant here.

use std::fmt;
use std::str::FromStr;

use inferlb_core::{InferlbConfig, SelectionMode, Thresholds};

use crate::chain::FilterNode;
use crate::chains;
use crate::error::{SchedulerResult, SchedulingError};

/// A named scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Full decision tree over criticality, queues, KV cache and adapters.
    Default,
    /// Least queue depth only.
    LeastQueue,
    /// Smallest value of the target metric.
    Least,
    /// Largest value of the target metric.
    Most,
}

impl Policy {
    pub const ALL: [Policy; 4] = [Policy::Default, Policy::LeastQueue, Policy::Least, Policy::Most];

    pub fn as_str(self) -> &'static str {
        match self {
            Policy::Default => "default",
            Policy::LeastQueue => "least_queue",
            Policy::Least => "least",
            Policy::Most => "most",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Policy::Default => "decision tree over criticality, queue depth, KV cache and LoRA affinity",
            Policy::LeastQueue => "pods with the fewest running plus waiting requests",
            Policy::Least => "pods with the smallest value of the target metric",
            Policy::Most => "pods with the largest value of the target metric",
        }
    }

    pub fn needs_target_metric(self) -> bool {
        matches!(self, Policy::Least | Policy::Most)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Policy::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| SchedulingError::UnknownPolicy(s.to_string()))
    }
}

/// Builds chain roots for policies under fixed thresholds.
#[derive(Debug, Clone, Default)]
pub struct PolicyResolver {
    thresholds: Thresholds,
    mode: SelectionMode,
}

impl PolicyResolver {
    pub fn new(thresholds: Thresholds, mode: SelectionMode) -> Self {
        Self { thresholds, mode }
    }

    pub fn from_config(config: &InferlbConfig) -> Self {
        Self::new(config.thresholds, config.selection.mode)
    }

    /// Resolve a policy name and optional target metric to a chain root.
    ///
    /// An empty name selects the default policy.
    pub fn resolve(&self, policy: &str, target_metric: Option<&str>) -> SchedulerResult<FilterNode> {
        let policy = if policy.is_empty() {
            Policy::Default
        } else {
            policy.parse()?
        };
        self.resolve_policy(policy, target_metric)
    }

    pub fn resolve_policy(&self, policy: Policy, target_metric: Option<&str>) -> SchedulerResult<FilterNode> {
        let chain = match policy {
            Policy::Default => chains::decision_tree(&self.thresholds, self.mode),
            Policy::LeastQueue => chains::least_queue_chain(self.mode),
            Policy::Least | Policy::Most => {
                let target = target_metric
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| SchedulingError::MissingTargetMetric(policy.to_string()))?;
                chains::user_metric_chain(target, policy == Policy::Most, self.mode)
            }
        };
        Ok(chain)
    }
}
