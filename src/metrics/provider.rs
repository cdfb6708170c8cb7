//! Metrics provider trait and the file-backed implementation.

use crate::types::MetricsSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Source of one metrics snapshot per cycle.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Take a fresh snapshot.
    async fn fetch(&self) -> Result<MetricsSnapshot>;
}

/// Reads a snapshot from a JSON document (dry runs and offline evaluation).
#[derive(Debug, Clone)]
pub struct FileMetricsProvider {
    path: PathBuf,
}

impl FileMetricsProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MetricsProvider for FileMetricsProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<MetricsSnapshot> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read metrics file {}", self.path.display()))?;
        let metrics: MetricsSnapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse metrics file {}", self.path.display()))?;
        debug!(treasury_eth = metrics.treasury_eth, "Metrics loaded from file");
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(
            &path,
            r#"{"treasuryEth": 2.5, "holderCount": 640, "stakingTvl": 12000.0,
                "nftsMinted": 12, "nftsMaxSupply": 1000, "gasRunwayHours": 2000.0}"#,
        )
        .unwrap();

        let metrics = FileMetricsProvider::new(&path).fetch().await.unwrap();
        assert_eq!(metrics.treasury_eth, 2.5);
        assert_eq!(metrics.holder_count, 640);
        assert_eq!(metrics.staking_apy, 0.0);
    }

    #[tokio::test]
    async fn test_missing_required_field_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, r#"{"treasuryEth": 2.5}"#).unwrap();
        assert!(FileMetricsProvider::new(&path).fetch().await.is_err());
    }
}
