use metrics::{register_counter, register_histogram, Counter, Histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::info;

/// Handles are bound to whichever recorder is installed when `Metrics::new` runs;
/// without one they are no-ops.
pub struct Metrics {
    pub captures_completed: Counter,
    pub captures_failed: Counter,
    pub frames_written: Counter,
    pub captures_truncated: Counter,
    pub renders_completed: Counter,
    pub artifacts_swept: Counter,
    pub cleanup_failures: Counter,
    pub capture_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            captures_completed: register_counter!("snapshot_captures_completed_total"),
            captures_failed: register_counter!("snapshot_captures_failed_total"),
            frames_written: register_counter!("snapshot_frames_written_total"),
            captures_truncated: register_counter!("snapshot_captures_truncated_total"),
            renders_completed: register_counter!("snapshot_renders_completed_total"),
            artifacts_swept: register_counter!("snapshot_artifacts_swept_total"),
            cleanup_failures: register_counter!("snapshot_cleanup_failures_total"),
            capture_duration: register_histogram!("snapshot_capture_duration_seconds"),
        }
    }

    pub fn record_capture(&self, duration: Duration, frames: usize, truncated: bool) {
        self.captures_completed.increment(1);
        self.frames_written.increment(frames as u64);
        if truncated {
            self.captures_truncated.increment(1);
        }
        self.capture_duration.record(duration.as_secs_f64());
    }

    pub fn record_render(&self, duration: Duration) {
        self.renders_completed.increment(1);
        self.capture_duration.record(duration.as_secs_f64());
    }

    pub fn record_failure(&self) {
        self.captures_failed.increment(1);
    }

    pub fn record_sweep(&self, removed: usize, failed: usize) {
        self.artifacts_swept.increment(removed as u64);
        self.cleanup_failures.increment(failed as u64);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the global Prometheus recorder. Call before constructing [`Metrics`].
pub fn install_prometheus() -> Result<PrometheusHandle, anyhow::Error> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("Prometheus recorder installed");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_metrics_accept_records() {
        let metrics = Metrics::new();
        metrics.record_capture(Duration::from_millis(250), 4, false);
        metrics.record_capture(Duration::from_secs(3), 20, true);
        metrics.record_render(Duration::from_millis(80));
        metrics.record_failure();
        metrics.record_sweep(4, 0);
    }
}
