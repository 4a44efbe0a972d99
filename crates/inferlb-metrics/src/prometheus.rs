//! Prometheus text exposition parsing.
//!
//! Reads the text format scraped from a model server's `/metrics` endpoint
//! and extracts the load signals the scheduler ranks pods by. Metric names
//! follow the vLLM server.

use std::collections::HashMap;

use regex::Regex;

use inferlb_core::{Metrics, Pod, PodMetrics};

use crate::error::{IngestError, IngestResult};

/// Metric names read from vLLM model servers.
pub mod names {
    pub const RUNNING_QUEUE_SIZE: &str = "vllm:num_requests_running";
    pub const WAITING_QUEUE_SIZE: &str = "vllm:num_requests_waiting";
    pub const KV_CACHE_USAGE_PERCENT: &str = "vllm:gpu_cache_usage_perc";
    pub const LORA_REQUESTS_INFO: &str = "vllm:lora_requests_info";
    pub const CACHE_CONFIG_INFO: &str = "vllm:cache_config_info";

    pub const LORA_RUNNING_ADAPTERS: &str = "running_lora_adapters";
    pub const LORA_WAITING_ADAPTERS: &str = "waiting_lora_adapters";
    pub const LORA_MAX_ADAPTERS: &str = "max_lora";
    pub const CACHE_BLOCK_SIZE: &str = "block_size";
    pub const CACHE_NUM_GPU_BLOCKS: &str = "num_gpu_blocks";
}

/// One parsed sample line.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub value: f64,
}

impl Sample {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Parser for Prometheus text exposition, holding its compiled patterns.
///
/// Build one per snapshot and reuse it for every pod.
pub struct ExpositionParser {
    sample_re: Regex,
    label_re: Regex,
}

impl ExpositionParser {
    pub fn new() -> IngestResult<Self> {
        let sample_re = Regex::new(
            r#"^([a-zA-Z_:][a-zA-Z0-9_:]*)(?:\{((?:[^"}]|"(?:[^"\\]|\\.)*")*)\})?\s+(\S+)(?:\s+-?\d+)?\s*$"#,
        )?;
        let label_re = Regex::new(r#"([a-zA-Z_][a-zA-Z0-9_]*)\s*=\s*"((?:[^"\\]|\\.)*)""#)?;
        Ok(Self { sample_re, label_re })
    }

    /// Parse every sample line. Comment and blank lines are skipped.
    pub fn parse(&self, text: &str) -> IngestResult<Vec<Sample>> {
        let mut samples = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let caps = self
                .sample_re
                .captures(line)
                .ok_or_else(|| IngestError::MalformedLine {
                    line: idx + 1,
                    content: line.to_string(),
                })?;

            let name = caps[1].to_string();
            let labels = caps
                .get(2)
                .map(|m| self.parse_labels(m.as_str()))
                .unwrap_or_default();
            let raw_value = &caps[3];
            let value: f64 = raw_value.parse().map_err(|_| IngestError::InvalidValue {
                metric: name.clone(),
                value: raw_value.to_string(),
            })?;

            samples.push(Sample { name, labels, value });
        }

        Ok(samples)
    }

    fn parse_labels(&self, body: &str) -> HashMap<String, String> {
        self.label_re
            .captures_iter(body)
            .map(|c| (c[1].to_string(), unescape(&c[2])))
            .collect()
    }

    /// Convert one pod's metrics text into a [`PodMetrics`] record.
    ///
    /// Queue sizes and KV-cache usage are required. Adapter and cache-config
    /// info are optional. When `target_metric` is set, its first sample
    /// becomes the pod's user-selected metric.
    pub fn pod_metrics(
        &self,
        pod: Pod,
        text: &str,
        target_metric: Option<&str>,
    ) -> IngestResult<PodMetrics> {
        let samples = self.parse(text)?;

        let mut metrics = Metrics {
            running_queue_size: count(&samples, names::RUNNING_QUEUE_SIZE)?,
            waiting_queue_size: count(&samples, names::WAITING_QUEUE_SIZE)?,
            kv_cache_usage_percent: gauge(&samples, names::KV_CACHE_USAGE_PERCENT)?,
            ..Metrics::default()
        };

        // Several info samples may be present; the value is a timestamp and
        // the newest one describes the current adapter set.
        let lora = samples
            .iter()
            .filter(|s| s.name == names::LORA_REQUESTS_INFO)
            .max_by(|a, b| a.value.total_cmp(&b.value));
        if let Some(info) = lora {
            for key in [names::LORA_RUNNING_ADAPTERS, names::LORA_WAITING_ADAPTERS] {
                let adapters = info.label(key).unwrap_or_default();
                for adapter in adapters.split(',').map(str::trim).filter(|a| !a.is_empty()) {
                    *metrics.active_models.entry(adapter.to_string()).or_insert(0) += 1;
                }
            }
            if let Some(max) = info.label(names::LORA_MAX_ADAPTERS) {
                metrics.max_active_models = parse_label(info, names::LORA_MAX_ADAPTERS, max)?;
            }
        }

        if let Some(cache) = samples.iter().find(|s| s.name == names::CACHE_CONFIG_INFO) {
            if let (Some(block_size), Some(blocks)) = (
                cache.label(names::CACHE_BLOCK_SIZE),
                cache.label(names::CACHE_NUM_GPU_BLOCKS),
            ) {
                let block_size = parse_label(cache, names::CACHE_BLOCK_SIZE, block_size)?;
                let blocks = parse_label(cache, names::CACHE_NUM_GPU_BLOCKS, blocks)?;
                metrics.kv_cache_max_token_capacity = block_size.saturating_mul(blocks);
            }
        }

        let mut pod_metrics = PodMetrics::new(pod, metrics);
        if let Some(target) = target_metric {
            if let Some(sample) = samples.iter().find(|s| s.name == target) {
                pod_metrics = pod_metrics.with_user_metric(target, sample.value);
            }
        }
        Ok(pod_metrics)
    }
}

fn gauge(samples: &[Sample], name: &'static str) -> IngestResult<f64> {
    let sample = samples
        .iter()
        .find(|s| s.name == name)
        .ok_or(IngestError::MissingMetric(name))?;
    if !sample.value.is_finite() || sample.value < 0.0 {
        return Err(IngestError::InvalidValue {
            metric: name.to_string(),
            value: sample.value.to_string(),
        });
    }
    Ok(sample.value)
}

/// Largest queue size accepted from a scrape.
const MAX_COUNT: f64 = u32::MAX as f64;

fn count(samples: &[Sample], name: &'static str) -> IngestResult<usize> {
    // Gauges are exported as floats ("3.0"); only whole, bounded values are counts.
    let value = gauge(samples, name)?;
    if value.fract() != 0.0 || value > MAX_COUNT {
        return Err(IngestError::InvalidValue {
            metric: name.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value as usize)
}

fn parse_label(sample: &Sample, label: &str, value: &str) -> IngestResult<usize> {
    value.trim().parse().map_err(|_| IngestError::InvalidLabel {
        metric: sample.name.clone(),
        label: label.to_string(),
        value: value.to_string(),
    })
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
