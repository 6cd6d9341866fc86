//! Deferred deletion of session artifacts
//!
//! After a successful scrolling capture a sweep is scheduled for the session;
//! when the grace window elapses every file prefixed by the session id is
//! removed. Scheduled sweeps cannot be cancelled.

use crate::{ArtifactStore, Metrics, SessionId, SweepReport};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct RetentionManager {
    store: Arc<ArtifactStore>,
    delay: Duration,
    pending: Arc<DashMap<SessionId, DateTime<Utc>>>,
    metrics: Arc<Metrics>,
}

impl RetentionManager {
    pub fn new(store: Arc<ArtifactStore>, delay: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            delay,
            pending: Arc::new(DashMap::new()),
            metrics,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sweeps the session's artifacts once the grace window has elapsed.
    ///
    /// The returned handle can be awaited for the report; dropping it does not
    /// cancel the sweep.
    pub fn schedule_cleanup(&self, session: &SessionId) -> JoinHandle<SweepReport> {
        let due = Utc::now()
            + chrono::Duration::from_std(self.delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.pending.insert(session.clone(), due);
        debug!("Sweep for session {} scheduled at {}", session, due);

        let manager = self.clone();
        let session = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(manager.delay).await;
            let report = manager.cleanup(&session).await;
            manager.pending.remove(&session);
            report
        })
    }

    /// Immediate sweep for administrative use.
    pub async fn cleanup(&self, session: &SessionId) -> SweepReport {
        let report = self.store.sweep(session).await;
        self.metrics
            .record_sweep(report.removed.len(), report.failures.len());

        if report.failures.is_empty() {
            info!(
                "Swept {} artifacts for session {}",
                report.removed.len(),
                session
            );
        } else {
            warn!(
                "Swept {} artifacts for session {}, {} could not be removed",
                report.removed.len(),
                session,
                report.failures.len()
            );
        }
        report
    }

    pub fn pending_sweeps(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, session: &SessionId) -> bool {
        self.pending.contains_key(session)
    }
}
