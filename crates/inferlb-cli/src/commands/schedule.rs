use std::path::Path;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::info;

use inferlb_core::{InferlbConfig, LlmRequest, Pod};
use inferlb_scheduling::{PolicyResolver, Scheduler, Step};

use crate::manifest::{self, LoadedSnapshot};

pub struct RequestArgs {
    pub model: String,
    pub critical: bool,
}

/// Outcome of one scheduling decision, as printed by `inferlb schedule`.
#[derive(Debug, Serialize)]
pub struct ScheduleReport {
    pub request: LlmRequest,
    pub policy: String,
    pub candidates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<Pod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<ExcludedReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
pub struct RejectionReport {
    pub status: u16,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ExcludedReport {
    pub pod: Pod,
    pub reason: String,
}

pub fn schedule(
    config: Option<&str>,
    pods: &str,
    request: RequestArgs,
    format: &str,
    explain: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(config)?;
    let loaded = manifest::load(Path::new(pods), config.policy.target_metric.as_deref())?;
    let request = LlmRequest {
        model: request.model,
        critical: request.critical,
        target_metric: config.policy.target_metric.clone(),
    };

    let report = plan(&config, loaded, request, explain)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text(&report),
    }

    if let Some(rejection) = &report.rejection {
        bail!("request rejected with status {}", rejection.status);
    }
    Ok(())
}

/// Resolve the configured policy and make one decision over the snapshot.
///
/// A rejected request is a normal outcome and lands in the report; only
/// an unusable config is an error.
pub fn plan(
    config: &InferlbConfig,
    loaded: LoadedSnapshot,
    request: LlmRequest,
    explain: bool,
) -> anyhow::Result<ScheduleReport> {
    let root = PolicyResolver::from_config(config)
        .resolve(&config.policy.name, config.policy.target_metric.as_deref())
        .context("resolving scheduling policy")?;
    let scheduler = Scheduler::new(&loaded.snapshot, &root);

    let steps = if explain {
        scheduler.evaluate(&request).map(|e| e.steps).unwrap_or_default()
    } else {
        Vec::new()
    };

    let (selected, rejection) = match scheduler.schedule(&request) {
        Ok(pod) => {
            info!(%pod, %request, "selected pod");
            (Some(pod), None)
        }
        Err(e) => {
            let rejection = RejectionReport {
                status: e.rejection().status_code(),
                reason: e.to_string(),
            };
            (None, Some(rejection))
        }
    };

    Ok(ScheduleReport {
        policy: config.policy.name.clone(),
        candidates: loaded.snapshot.len(),
        request,
        selected,
        rejection,
        excluded: loaded
            .excluded
            .into_iter()
            .map(|e| ExcludedReport {
                pod: e.pod,
                reason: e.reason,
            })
            .collect(),
        steps,
    })
}

fn print_text(report: &ScheduleReport) {
    for e in &report.excluded {
        println!("  excluded {}: {}", e.pod, e.reason);
    }
    if !report.steps.is_empty() {
        println!("Filter chain ({} policy):", report.policy);
        for step in &report.steps {
            println!(
                "  {:<24} {:>3} → {:<3} {:?}",
                step.filter, step.input, step.output, step.edge
            );
        }
    }

    match (&report.selected, &report.rejection) {
        (Some(pod), _) => {
            println!("✓ {} → {}", report.request, pod);
        }
        (None, Some(r)) => {
            eprintln!("✗ {} rejected ({}): {}", report.request, r.status, r.reason);
        }
        (None, None) => {}
    }
}
