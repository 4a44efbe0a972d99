//! Filter chains: decision trees of filters.
//!
//! Each [`FilterNode`] runs its filter and then follows one edge:
//!
//! - [`Next::Always`] descends regardless of the outcome.
//! - [`Next::Branch`] descends `on_success` when the filter kept at least
//!   one pod and `on_failure` when it kept none.
//! - [`Next::Leaf`] ends the walk; the filter's output is the result.
//!
//! On success the next node sees the filtered pods. On failure it sees the
//! failed node's *input*, so an empty result never propagates past a node
//! that has somewhere to go.

use serde::{Deserialize, Serialize};
use tracing::debug;

use inferlb_core::{LlmRequest, PodMetrics};

use crate::filter::Filter;

/// A named filter and the edge taken after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    pub name: String,
    pub filter: Filter,
    #[serde(default)]
    pub next: Next,
}

/// Outgoing edge of a [`FilterNode`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Next {
    #[default]
    Leaf,
    Always(Box<FilterNode>),
    Branch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_success: Option<Box<FilterNode>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_failure: Option<Box<FilterNode>>,
    },
}

/// Which edge a step took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Success,
    Failure,
    Always,
    End,
}

/// Record of one filter run during an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub filter: String,
    pub input: usize,
    pub output: usize,
    pub edge: Edge,
}

/// Result of walking a chain over a candidate list.
#[derive(Debug, Clone)]
pub struct Evaluation<'a> {
    /// Pods surviving the final filter.
    pub pods: Vec<&'a PodMetrics>,
    /// Every filter run, in order.
    pub steps: Vec<Step>,
    /// The walk ended on a drop node.
    pub dropped: bool,
}

impl Evaluation<'_> {
    /// Name of the filter that produced the final result.
    pub fn last_filter(&self) -> Option<&str> {
        self.steps.last().map(|s| s.filter.as_str())
    }
}

impl FilterNode {
    pub fn new(name: impl Into<String>, filter: Filter) -> Self {
        Self {
            name: name.into(),
            filter,
            next: Next::Leaf,
        }
    }

    /// Continue with `next` whatever this filter returns.
    pub fn then(mut self, next: FilterNode) -> Self {
        self.next = Next::Always(Box::new(next));
        self
    }

    /// Continue with `next` when this filter keeps at least one pod.
    pub fn on_success(mut self, next: FilterNode) -> Self {
        let on_failure = self.take_failure();
        self.next = Next::Branch {
            on_success: Some(Box::new(next)),
            on_failure,
        };
        self
    }

    /// Continue with `next` when this filter keeps no pods.
    pub fn on_failure(mut self, next: FilterNode) -> Self {
        let on_success = self.take_success();
        self.next = Next::Branch {
            on_success,
            on_failure: Some(Box::new(next)),
        };
        self
    }

    fn take_success(&mut self) -> Option<Box<FilterNode>> {
        match std::mem::take(&mut self.next) {
            Next::Branch { on_success, .. } => on_success,
            _ => None,
        }
    }

    fn take_failure(&mut self) -> Option<Box<FilterNode>> {
        match std::mem::take(&mut self.next) {
            Next::Branch { on_failure, .. } => on_failure,
            _ => None,
        }
    }

    /// Walk the chain starting at this node.
    pub fn evaluate<'a>(&self, req: &LlmRequest, pods: Vec<&'a PodMetrics>) -> Evaluation<'a> {
        let mut node = self;
        let mut input = pods;
        let mut steps = Vec::new();

        loop {
            let filtered = node.filter.apply(req, &input);
            let success = !filtered.is_empty();

            let (edge, next) = match &node.next {
                Next::Leaf => (Edge::End, None),
                Next::Always(n) => (Edge::Always, Some(n.as_ref())),
                Next::Branch { on_success, on_failure } => {
                    if success {
                        (Edge::Success, on_success.as_deref())
                    } else {
                        (Edge::Failure, on_failure.as_deref())
                    }
                }
            };
            let edge = if next.is_some() { edge } else { Edge::End };

            debug!(
                filter = %node.name,
                %req,
                input = input.len(),
                output = filtered.len(),
                ?edge,
                "ran filter"
            );
            steps.push(Step {
                filter: node.name.clone(),
                input: input.len(),
                output: filtered.len(),
                edge,
            });

            match next {
                None => {
                    return Evaluation {
                        pods: filtered,
                        steps,
                        dropped: matches!(node.filter, Filter::Drop),
                    };
                }
                Some(n) => {
                    if success {
                        input = filtered;
                    }
                    node = n;
                }
            }
        }
    }

    /// Names of every node reachable from this one, depth first.
    pub fn node_names(&self) -> Vec<&str> {
        let mut out = vec![self.name.as_str()];
        match &self.next {
            Next::Leaf => {}
            Next::Always(n) => out.extend(n.node_names()),
            Next::Branch { on_success, on_failure } => {
                for n in [on_success, on_failure].into_iter().flatten() {
                    out.extend(n.node_names());
                }
            }
        }
        out
    }
}
