//! Browser acquisition for capture sessions
//!
//! Each capture session launches its own Chrome instance with a throwaway
//! profile directory; nothing is pooled or shared between requests. The
//! controller talks to the page only through [`PageDriver`], so the scroll
//! loop can be exercised without a real browser.

use crate::{create_browser_config, CaptureError, Config, Viewport};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One configured page inside one browser instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates to `url` and waits for the load event.
    async fn open(&self, url: &str) -> Result<(), CaptureError>;

    async fn evaluate_number(&self, expression: &str) -> Result<f64, CaptureError>;

    async fn scroll_to(&self, offset: u32) -> Result<(), CaptureError>;

    /// PNG bytes of the viewport, or of the whole page when `full_page` is set.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, CaptureError>;

    /// Releases the browser. Must be safe to call on every exit path.
    async fn close(&self) -> Result<(), CaptureError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, viewport: &Viewport) -> Result<Box<dyn PageDriver>, CaptureError>;
}

/// Launches a fresh headless Chrome per session via chromiumoxide
pub struct ChromiumLauncher {
    config: Config,
}

impl ChromiumLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    async fn configure_page(&self, page: &Page, viewport: &Viewport) -> Result<(), CaptureError> {
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width)
            .height(viewport.height)
            .device_scale_factor(viewport.device_scale_factor)
            .mobile(viewport.mobile)
            .build()
            .map_err(CaptureError::CaptureFailed)?;
        page.execute(metrics).await?;

        if viewport.mobile {
            page.execute(SetUserAgentOverrideParams::new(
                self.config.mobile_user_agent.clone(),
            ))
            .await?;
            page.execute(SetTouchEmulationEnabledParams::new(true)).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, viewport: &Viewport) -> Result<Box<dyn PageDriver>, CaptureError> {
        let profile_dir = tempfile::Builder::new()
            .prefix("snapshot-chrome-")
            .tempdir_in(self.config.scratch_dir())?;

        let browser_config = create_browser_config(&self.config, viewport, profile_dir.path())?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("browser launch failed: {e}")))?;

        // The handler implements Stream and must be polled for the browser to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::error!("Handler error: {}", e);
                    return Err(e);
                }
            }
            debug!("Handler stream ended");
            Ok(())
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(CaptureError::CaptureFailed(format!("could not open page: {e}")));
            }
        };

        if let Err(e) = self.configure_page(&page, viewport).await {
            let _ = browser.close().await;
            handler_task.abort();
            return Err(e);
        }

        info!(
            "Browser launched with {}x{} viewport (mobile: {})",
            viewport.width, viewport.height, viewport.mobile
        );

        Ok(Box::new(ChromiumPage {
            browser: Mutex::new(Some(browser)),
            handler: handler_task,
            page,
            _profile_dir: profile_dir,
        }))
    }
}

pub struct ChromiumPage {
    browser: Mutex<Option<Browser>>,
    handler: JoinHandle<Result<(), chromiumoxide::error::CdpError>>,
    page: Page,
    _profile_dir: tempfile::TempDir,
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn open(&self, url: &str) -> Result<(), CaptureError> {
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn evaluate_number(&self, expression: &str) -> Result<f64, CaptureError> {
        self.page
            .evaluate(expression)
            .await?
            .into_value::<f64>()
            .map_err(CaptureError::capture)
    }

    async fn scroll_to(&self, offset: u32) -> Result<(), CaptureError> {
        self.page
            .evaluate(format!("window.scrollTo(0, {offset})"))
            .await?;
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, CaptureError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();

        self.page
            .screenshot(params)
            .await
            .map_err(CaptureError::capture)
    }

    async fn close(&self) -> Result<(), CaptureError> {
        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            let closed = browser.close().await;
            if let Err(e) = browser.wait().await {
                warn!("Browser process did not exit cleanly: {}", e);
            }
            self.handler.abort();
            closed?;
        }
        Ok(())
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
