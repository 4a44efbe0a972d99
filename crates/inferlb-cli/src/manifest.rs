//! Pod manifest: the backends to schedule over and where their metrics live.
//!
//! ```toml
//! [[pod]]
//! name = "vllm-0"
//! address = "10.0.0.1:8000"
//! metrics = "scrapes/vllm-0.prom"
//! healthy = true
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use inferlb_core::{Pod, PodMetricsSnapshot};
use inferlb_metrics::{ExcludedPod, SnapshotBuilder};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodManifest {
    #[serde(default, rename = "pod")]
    pub pods: Vec<PodEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodEntry {
    pub name: String,
    pub address: String,
    /// Prometheus text file, relative to the manifest.
    pub metrics: PathBuf,
    #[serde(default = "default_healthy")]
    pub healthy: bool,
}

fn default_healthy() -> bool {
    true
}

/// A snapshot plus the pods that did not make it in.
pub struct LoadedSnapshot {
    pub snapshot: PodMetricsSnapshot,
    pub excluded: Vec<ExcludedPod>,
}

impl PodManifest {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading pod manifest {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing pod manifest {}", path.display()))
    }

    /// Read every healthy pod's metrics file and build the snapshot.
    ///
    /// A pod whose metrics cannot be parsed is excluded; a missing metrics
    /// file is an error since it means the manifest itself is wrong.
    pub fn load_snapshot(&self, base_dir: &Path, target_metric: Option<&str>) -> anyhow::Result<LoadedSnapshot> {
        let mut builder = SnapshotBuilder::new()?.with_target_metric(target_metric.map(str::to_string));

        for entry in &self.pods {
            let pod = Pod::new(&entry.name, &entry.address);
            let text = if entry.healthy {
                let path = base_dir.join(&entry.metrics);
                debug!(%pod, path = %path.display(), "reading metrics");
                std::fs::read_to_string(&path)
                    .with_context(|| format!("reading metrics for {} from {}", entry.name, path.display()))?
            } else {
                String::new()
            };
            builder.add_scrape(pod, entry.healthy, &text);
        }

        let excluded = builder.excluded().to_vec();
        // Nothing healthy is a scheduling outcome (503), not a load failure.
        let snapshot = builder.build().unwrap_or_default();
        Ok(LoadedSnapshot { snapshot, excluded })
    }
}

/// Load a manifest and its metrics files in one step.
pub fn load(path: &Path, target_metric: Option<&str>) -> anyhow::Result<LoadedSnapshot> {
    let manifest = PodManifest::from_file(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    manifest.load_snapshot(base_dir, target_metric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrape(waiting: u32, kv: f64) -> String {
        format!(
            "vllm:num_requests_running 0\nvllm:num_requests_waiting {waiting}\nvllm:gpu_cache_usage_perc {kv}\nvllm:queue_tokens 12\n"
        )
    }

    #[test]
    fn parses_manifest_with_default_health() {
        let manifest: PodManifest = toml::from_str(
            r#"
[[pod]]
name = "a"
address = "10.0.0.1:8000"
metrics = "a.prom"

[[pod]]
name = "b"
address = "10.0.0.2:8000"
metrics = "b.prom"
healthy = false
"#,
        )
        .unwrap();

        assert_eq!(manifest.pods.len(), 2);
        assert!(manifest.pods[0].healthy);
        assert!(!manifest.pods[1].healthy);
    }

    #[test]
    fn loads_metrics_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("scrapes")).unwrap();
        std::fs::write(dir.path().join("scrapes/a.prom"), scrape(1, 0.2)).unwrap();
        std::fs::write(dir.path().join("scrapes/b.prom"), "not metrics at all {").unwrap();
        std::fs::write(
            dir.path().join("pods.toml"),
            r#"
[[pod]]
name = "a"
address = "10.0.0.1:8000"
metrics = "scrapes/a.prom"

[[pod]]
name = "b"
address = "10.0.0.2:8000"
metrics = "scrapes/b.prom"

[[pod]]
name = "c"
address = "10.0.0.3:8000"
metrics = "scrapes/missing.prom"
healthy = false
"#,
        )
        .unwrap();

        let loaded = load(&dir.path().join("pods.toml"), Some("vllm:queue_tokens")).unwrap();
        assert_eq!(loaded.snapshot.len(), 1);
        let a = loaded.snapshot.get(&Pod::new("a", "10.0.0.1:8000")).unwrap();
        assert_eq!(a.metrics.waiting_queue_size, 1);
        assert_eq!(a.user_metric_value(), Some(12.0));

        let excluded: Vec<&str> = loaded.excluded.iter().map(|e| e.pod.name.as_str()).collect();
        assert_eq!(excluded, vec!["b", "c"]);
    }

    #[test]
    fn missing_metrics_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pods.toml"),
            "[[pod]]\nname = \"a\"\naddress = \"x:1\"\nmetrics = \"nope.prom\"\n",
        )
        .unwrap();

        let err = load(&dir.path().join("pods.toml"), None).err().unwrap();
        assert!(err.to_string().contains("reading metrics for a"));
    }

    #[test]
    fn all_unhealthy_yields_empty_snapshot() {
        let manifest = PodManifest {
            pods: vec![PodEntry {
                name: "a".to_string(),
                address: "x:1".to_string(),
                metrics: PathBuf::from("unused.prom"),
                healthy: false,
            }],
        };
        let loaded = manifest.load_snapshot(Path::new("."), None).unwrap();
        assert!(loaded.snapshot.is_empty());
        assert_eq!(loaded.excluded.len(), 1);
    }
}
