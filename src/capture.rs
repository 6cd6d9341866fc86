//! Capture controller
//!
//! Turns a validated request into either an ordered set of viewport frames
//! (scrolling capture) or one full-page image (single-shot render). Both
//! strategies share the same session lifecycle:
//!
//! 1. stage the markup as a uniquely named temp document,
//! 2. launch a browser configured for the resolved viewport,
//! 3. load the document and let it settle,
//! 4. capture,
//! 5. release the browser and the staged document, whatever step 3 or 4 returned.

use crate::{
    format_duration, Artifact, ArtifactStore, BrowserLauncher, CaptureError, CaptureRequest,
    CaptureSettings, DeviceProfile, Metrics, PageDriver, SessionId, SnapshotRequest, Viewport,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Total scrollable height; a document without a body measures as 0.
pub const SCROLL_HEIGHT_SCRIPT: &str = "document.body ? document.body.scrollHeight : 0";

/// Effective viewport height after device emulation.
pub const VIEWPORT_HEIGHT_SCRIPT: &str = "window.innerHeight";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureMode {
    /// Scroll through the document, one viewport-sized frame per step.
    Paginated(DeviceProfile),
    /// One full-page image at the fixed single-shot viewport.
    FullPage,
}

impl CaptureMode {
    pub fn viewport(&self) -> Viewport {
        match self {
            CaptureMode::Paginated(profile) => profile.viewport(),
            CaptureMode::FullPage => Viewport::single_shot(),
        }
    }
}

/// Frames produced by one scrolling capture, ordered by scroll offset
#[derive(Debug, Clone, Serialize)]
pub struct FrameSet {
    pub session_id: SessionId,
    pub frames: Vec<Artifact>,
    /// The frame cap stopped the loop before the end of the document.
    pub truncated: bool,
    pub viewport: Viewport,
}

#[derive(Debug)]
pub enum CaptureOutput {
    Frames(FrameSet),
    Image(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollPlan {
    pub offsets: Vec<u32>,
    pub truncated: bool,
}

/// Offsets visited by the scroll loop.
///
/// Starting at 0, advance by the viewport height while the offset is below the
/// scroll height and fewer than `max_frames` offsets have been taken. A zero,
/// negative or non-finite scroll height still yields the single offset 0. A
/// viewport height that cannot be used as a step falls back to `fallback_step`.
pub fn plan_scroll(
    scroll_height: f64,
    viewport_height: f64,
    fallback_step: u32,
    max_frames: usize,
) -> ScrollPlan {
    let step = if viewport_height.is_finite() && viewport_height >= 1.0 {
        viewport_height.round() as u64
    } else {
        u64::from(fallback_step.max(1))
    };

    let height = if scroll_height.is_finite() && scroll_height > 0.0 {
        (scroll_height.ceil() as u64).min(u64::from(u32::MAX))
    } else {
        0
    };
    let bound = height.max(1);

    let mut offsets = Vec::new();
    let mut offset = 0u64;
    while offset < bound && offsets.len() < max_frames {
        offsets.push(offset as u32);
        offset += step;
    }

    ScrollPlan {
        offsets,
        truncated: offset < bound,
    }
}

#[derive(Clone)]
pub struct CaptureService {
    launcher: Arc<dyn BrowserLauncher>,
    store: Arc<ArtifactStore>,
    settings: CaptureSettings,
    scratch_dir: PathBuf,
    metrics: Arc<Metrics>,
}

impl CaptureService {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        store: Arc<ArtifactStore>,
        settings: CaptureSettings,
        scratch_dir: impl Into<PathBuf>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            launcher,
            store,
            settings,
            scratch_dir: scratch_dir.into(),
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Single entry point for both strategies.
    pub async fn capture(
        &self,
        content: &str,
        mode: CaptureMode,
    ) -> Result<CaptureOutput, CaptureError> {
        match mode {
            CaptureMode::Paginated(profile) => {
                let request = CaptureRequest::new(content, profile)?;
                self.capture_frames(request).await.map(CaptureOutput::Frames)
            }
            CaptureMode::FullPage => {
                let request = SnapshotRequest {
                    content: content.to_string(),
                };
                self.render_full_page(request).await.map(CaptureOutput::Image)
            }
        }
    }

    pub async fn capture_frames(&self, request: CaptureRequest) -> Result<FrameSet, CaptureError> {
        let started = Instant::now();
        let session = SessionId::generate();
        let viewport = request.profile.viewport();
        info!("Starting capture session {} ({:?})", session, request.profile);

        let document = self.stage_document(&session, &request.content).await?;
        let url = document_url(document.path()).await?;

        let driver = match self.launcher.launch(&viewport).await {
            Ok(driver) => driver,
            Err(e) => {
                self.metrics.record_failure();
                error!("Session {} could not acquire a browser: {}", session, e);
                return Err(e);
            }
        };

        let result = self.paginate(driver.as_ref(), &session, &url, &viewport).await;
        self.release(driver, document).await;

        match result {
            Ok((frames, truncated)) => {
                let elapsed = started.elapsed();
                self.metrics.record_capture(elapsed, frames.len(), truncated);
                if truncated {
                    warn!(
                        "Session {} hit the {}-frame cap before the end of the document",
                        session, self.settings.max_frames
                    );
                }
                info!(
                    "Session {} captured {} frames in {}",
                    session,
                    frames.len(),
                    format_duration(elapsed)
                );
                Ok(FrameSet {
                    session_id: session,
                    frames,
                    truncated,
                    viewport,
                })
            }
            Err(e) => {
                self.metrics.record_failure();
                error!("Session {} failed: {}", session, e);
                let report = self.store.sweep(&session).await;
                if !report.removed.is_empty() {
                    debug!(
                        "Removed {} partial frames of session {}",
                        report.removed.len(),
                        session
                    );
                }
                Err(e)
            }
        }
    }

    pub async fn render_full_page(&self, request: SnapshotRequest) -> Result<Vec<u8>, CaptureError> {
        if request.content.is_empty() {
            return Err(CaptureError::InvalidInput(
                "code and language are required".to_string(),
            ));
        }

        let started = Instant::now();
        let session = SessionId::generate();
        let viewport = Viewport::single_shot();

        let document = self.stage_document(&session, &request.content).await?;
        let url = document_url(document.path()).await?;

        let driver = match self.launcher.launch(&viewport).await {
            Ok(driver) => driver,
            Err(e) => {
                self.metrics.record_failure();
                return Err(e);
            }
        };

        let result = match self.load(driver.as_ref(), &url).await {
            Ok(()) => driver.screenshot(true).await,
            Err(e) => Err(e),
        };
        self.release(driver, document).await;

        match result {
            Ok(png) => {
                self.metrics.record_render(started.elapsed());
                info!(
                    "Rendered full-page snapshot ({}) in {}",
                    crate::format_bytes(png.len()),
                    format_duration(started.elapsed())
                );
                Ok(png)
            }
            Err(e) => {
                self.metrics.record_failure();
                error!("Full-page render failed: {}", e);
                Err(e)
            }
        }
    }

    async fn paginate(
        &self,
        driver: &dyn PageDriver,
        session: &SessionId,
        url: &str,
        viewport: &Viewport,
    ) -> Result<(Vec<Artifact>, bool), CaptureError> {
        self.load(driver, url).await?;

        let scroll_height = driver.evaluate_number(SCROLL_HEIGHT_SCRIPT).await?;
        let viewport_height = driver.evaluate_number(VIEWPORT_HEIGHT_SCRIPT).await?;
        let plan = plan_scroll(
            scroll_height,
            viewport_height,
            viewport.height,
            self.settings.max_frames,
        );
        debug!(
            "Session {}: scroll height {}, viewport height {}, {} frames planned",
            session,
            scroll_height,
            viewport_height,
            plan.offsets.len()
        );

        let mut frames = Vec::with_capacity(plan.offsets.len());
        for (index, offset) in plan.offsets.iter().enumerate() {
            driver.scroll_to(*offset).await?;
            sleep(self.settings.scroll_settle).await;

            let png = driver.screenshot(false).await?;
            let artifact = self
                .store
                .write_frame(session, index, &png)
                .await
                .map_err(|e| {
                    CaptureError::CaptureFailed(format!("could not store frame {index}: {e}"))
                })?;
            debug!("Session {}: frame {} at offset {}", session, index, offset);
            frames.push(artifact);
        }

        Ok((frames, plan.truncated))
    }

    async fn load(&self, driver: &dyn PageDriver, url: &str) -> Result<(), CaptureError> {
        timeout(self.settings.load_timeout, driver.open(url))
            .await
            .map_err(|_| CaptureError::LoadTimeout(self.settings.load_timeout))??;

        // The load event does not cover script-driven content
        sleep(self.settings.load_settle).await;
        Ok(())
    }

    async fn stage_document(
        &self,
        session: &SessionId,
        content: &str,
    ) -> Result<NamedTempFile, CaptureError> {
        let staging_failed = |e: std::io::Error| {
            CaptureError::CaptureFailed(format!("could not stage document: {e}"))
        };

        let document = tempfile::Builder::new()
            .prefix(&format!("{session}_"))
            .suffix(".html")
            .tempfile_in(&self.scratch_dir)
            .map_err(staging_failed)?;
        tokio::fs::write(document.path(), content)
            .await
            .map_err(staging_failed)?;
        Ok(document)
    }

    async fn release(&self, driver: Box<dyn PageDriver>, document: NamedTempFile) {
        if let Err(e) = driver.close().await {
            warn!("Failed to close browser: {}", e);
        }
        let path = document.path().to_path_buf();
        if let Err(e) = document.close() {
            warn!("Failed to remove staged document {}: {}", path.display(), e);
        }
    }
}

async fn document_url(path: &Path) -> Result<String, CaptureError> {
    let absolute = tokio::fs::canonicalize(path)
        .await
        .map_err(|e| {
            CaptureError::CaptureFailed(format!("could not resolve {}: {e}", path.display()))
        })?;
    url::Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .map_err(|_| {
            CaptureError::CaptureFailed(format!("not a file path: {}", absolute.display()))
        })
}
