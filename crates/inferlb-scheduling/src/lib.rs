//! inferlb-scheduling — metrics-driven pod selection for LLM requests.
//!
//! Given a [`PodMetricsSnapshot`](inferlb_core::PodMetricsSnapshot) and an
//! [`LlmRequest`](inferlb_core::LlmRequest), the scheduler:
//!
//! - Narrows the candidates through a decision tree of filters
//! - Sheds sheddable requests when no pod has spare capacity
//! - Picks uniformly at random among the surviving pods
//!
//! # Architecture
//!
//! ```text
//! PolicyResolver (policy name, target metric)
//!   └── FilterNode chain root
//!         ├── Filter::Predicate (criticality, queue, adapters, spare capacity)
//!         ├── Filter::Select (least queuing, least KV cache, user metric)
//!         └── Filter::Drop (shed)
//!
//! Scheduler (snapshot, chain root)
//!   ├── evaluate() → Evaluation { pods, steps, dropped }
//!   └── schedule() → Pod, or SchedulingError
//! ```
//!
//! Nothing here keeps state between decisions; build a new `Scheduler`
//! per request.

pub mod chain;
pub mod chains;
pub mod error;
pub mod filter;
pub mod policy;
pub mod scheduler;

pub use chain::{Edge, Evaluation, FilterNode, Next, Step};
pub use error::{Rejection, SchedulerResult, SchedulingError};
pub use filter::{Filter, Predicate, Selection, SelectionMetric};
pub use policy::{Policy, PolicyResolver};
pub use scheduler::Scheduler;
