use crate::{ArtifactStore, RetentionManager};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub overall: HealthLevel,
    pub output_dir_writable: bool,
    pub stored_artifacts: Option<usize>,
    pub pending_sweeps: usize,
    pub uptime_secs: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HealthThresholds {
    /// Stored frame count above which the report degrades to Warning
    pub max_stored_artifacts: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            max_stored_artifacts: 10_000,
        }
    }
}

#[derive(Clone)]
pub struct HealthChecker {
    store: Arc<ArtifactStore>,
    retention: RetentionManager,
    thresholds: HealthThresholds,
    started: Instant,
}

impl HealthChecker {
    pub fn new(store: Arc<ArtifactStore>, retention: RetentionManager) -> Self {
        Self {
            store,
            retention,
            thresholds: HealthThresholds::default(),
            started: Instant::now(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub async fn check(&self) -> HealthStatus {
        let output_dir_writable = self.store.is_writable().await;
        let stored_artifacts = match self.store.count().await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Could not count stored artifacts: {}", e);
                None
            }
        };

        let overall = if !output_dir_writable || stored_artifacts.is_none() {
            HealthLevel::Critical
        } else if stored_artifacts.unwrap_or(0) > self.thresholds.max_stored_artifacts {
            HealthLevel::Warning
        } else {
            HealthLevel::Healthy
        };

        HealthStatus {
            overall,
            output_dir_writable,
            stored_artifacts,
            pending_sweeps: self.retention.pending_sweeps(),
            uptime_secs: self.started.elapsed().as_secs(),
            timestamp: Utc::now(),
        }
    }
}
