//! Configuration management with serde serialization/deserialization
//!
//! `Config` is read from an optional JSON file, overlaid by the environment
//! and CLI flags, then validated once at startup. It also knows how to turn a
//! resolved [`Viewport`] into a chromiumoxide `BrowserConfig`.

use crate::{CaptureError, Viewport, MOBILE_USER_AGENT};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the Chrome/Chromium binary
pub const CHROME_BIN_ENV: &str = "CHROME_BIN";

/// Binary location used when neither config nor environment names one
pub const DEFAULT_CHROME_PATH: &str = "/usr/bin/google-chrome";

pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Main configuration structure for the snapshot service
///
/// # Examples
///
/// ```rust
/// use snapshot_service::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     retention_delay: Duration::from_secs(30),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to (default: 0.0.0.0:8000)
    pub bind_address: String,

    /// Base used to turn artifact paths into absolute URLs
    ///
    /// When None, the request's `Host` header is used with an `http` scheme.
    pub public_base_url: Option<String>,

    /// Directory holding produced frames (default: `static`)
    pub output_dir: PathBuf,

    /// Route prefix under which frames are served (default: `/static`)
    pub static_route: String,

    /// Where staged markup documents are written (default: OS temp dir)
    pub scratch_dir: Option<PathBuf>,

    /// Grace window before a session's frames are swept (default: 120 seconds)
    pub retention_delay: Duration,

    /// Timing and limits for the capture loop
    pub capture: CaptureSettings,

    /// Path to Chrome/Chromium executable
    ///
    /// Falls back to `CHROME_BIN`, then to [`DEFAULT_CHROME_PATH`] if it exists,
    /// then to chromiumoxide's own detection.
    pub chrome_path: Option<String>,

    /// User agent used for phone profiles
    pub mobile_user_agent: String,

    /// Install the Prometheus recorder and expose `/metrics` (default: false)
    pub enable_metrics: bool,

    /// Upper bound on a capture request body (default: 64 MiB)
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            public_base_url: None,
            output_dir: PathBuf::from("static"),
            static_route: "/static".to_string(),
            scratch_dir: None,
            retention_delay: Duration::from_secs(120),
            capture: CaptureSettings::default(),
            chrome_path: None,
            mobile_user_agent: MOBILE_USER_AGENT.to_string(),
            enable_metrics: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Timing and limits for a capture session
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Wait after the load event before measuring layout (default: 2 seconds)
    pub load_settle: Duration,

    /// Wait after each scroll before taking the frame (default: 500ms)
    pub scroll_settle: Duration,

    /// Hard cap on frames per session (default: 20)
    pub max_frames: usize,

    /// Upper bound on navigation to the staged document (default: 30 seconds)
    pub load_timeout: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            load_settle: Duration::from_secs(2),
            scroll_settle: Duration::from_millis(500),
            max_frames: 20,
            load_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub async fn load(path: Option<&Path>) -> Result<Self, CaptureError> {
        let config = match path {
            Some(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                serde_json::from_str(&content)?
            }
            None => Config::default(),
        };
        Ok(config)
    }

    /// Fill unset values from the environment; `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.chrome_path.is_none() {
            self.chrome_path = lookup(CHROME_BIN_ENV).filter(|p| !p.is_empty());
        }
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.capture.max_frames == 0 {
            return Err(CaptureError::Configuration(
                "max_frames must be greater than 0".into(),
            ));
        }

        if self.max_body_bytes == 0 {
            return Err(CaptureError::Configuration(
                "max_body_bytes must be greater than 0".into(),
            ));
        }

        if self.capture.load_timeout.is_zero() {
            return Err(CaptureError::Configuration(
                "load_timeout must be greater than 0".into(),
            ));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(CaptureError::Configuration(
                "output_dir must not be empty".into(),
            ));
        }

        if !self.static_route.starts_with('/') {
            return Err(CaptureError::Configuration(format!(
                "static_route must start with '/': {}",
                self.static_route
            )));
        }

        if let Some(base) = &self.public_base_url {
            url::Url::parse(base).map_err(|e| {
                CaptureError::Configuration(format!("invalid public_base_url {base:?}: {e}"))
            })?;
        }

        self.bind_address.parse::<SocketAddr>().map_err(|e| {
            CaptureError::Configuration(format!(
                "invalid bind_address {:?}: {e}",
                self.bind_address
            ))
        })?;

        Ok(())
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn resolved_chrome_path(&self) -> Option<PathBuf> {
        match &self.chrome_path {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let default = PathBuf::from(DEFAULT_CHROME_PATH);
                default.exists().then_some(default)
            }
        }
    }
}

/// Generate Chrome command-line arguments for one capture session
pub fn get_chrome_args(viewport: &Viewport) -> Vec<String> {
    vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--hide-scrollbars".to_string(),
        "--allow-file-access-from-files".to_string(),
        format!("--window-size={},{}", viewport.width, viewport.height),
    ]
}

pub fn create_browser_config(
    config: &Config,
    viewport: &Viewport,
    user_data_dir: &Path,
) -> Result<chromiumoxide::browser::BrowserConfig, CaptureError> {
    use chromiumoxide::browser::BrowserConfig;
    use chromiumoxide::handler::viewport::Viewport as ChromeViewport;

    let chrome_viewport = ChromeViewport {
        width: viewport.width,
        height: viewport.height,
        device_scale_factor: Some(viewport.device_scale_factor),
        emulating_mobile: viewport.mobile,
        is_landscape: viewport.is_landscape(),
        has_touch: viewport.mobile,
    };

    let mut builder = BrowserConfig::builder()
        .window_size(viewport.width, viewport.height)
        .viewport(chrome_viewport)
        .user_data_dir(user_data_dir)
        .args(get_chrome_args(viewport));

    if let Some(chrome_path) = config.resolved_chrome_path() {
        builder = builder.chrome_executable(chrome_path);
    }

    builder
        .build()
        .map_err(|e| CaptureError::CaptureFailed(format!("invalid browser config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.retention_delay, Duration::from_secs(120));
        assert_eq!(config.capture.load_settle, Duration::from_secs(2));
        assert_eq!(config.capture.scroll_settle, Duration::from_millis(500));
        assert_eq!(config.capture.max_frames, 20);
        assert_eq!(config.static_route, "/static");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"output_dir": "/srv/frames", "enable_metrics": true}"#)
                .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/srv/frames"));
        assert!(config.enable_metrics);
        assert_eq!(config.capture.max_frames, 20);
    }

    #[test]
    fn test_env_overlay_only_fills_unset_chrome_path() {
        let mut config = Config::default();
        config.apply_env(|key| (key == CHROME_BIN_ENV).then(|| "/opt/chrome".to_string()));
        assert_eq!(config.chrome_path.as_deref(), Some("/opt/chrome"));

        let mut config = Config {
            chrome_path: Some("/usr/sbin/chromium".into()),
            ..Default::default()
        };
        config.apply_env(|_| Some("/opt/chrome".to_string()));
        assert_eq!(config.chrome_path.as_deref(), Some("/usr/sbin/chromium"));

        let mut config = Config::default();
        config.apply_env(|_| Some(String::new()));
        assert!(config.chrome_path.is_none());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.capture.max_frames = 0;
        assert!(config.validate().is_err());

        let config = Config {
            static_route: "static".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            public_base_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            bind_address: "localhost".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_body_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chrome_args_generation() {
        let viewport = crate::DeviceProfile::PhoneLandscape.viewport();
        let args = get_chrome_args(&viewport);
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--window-size=667,375".to_string()));
    }

    #[test]
    fn test_explicit_chrome_path_wins() {
        let config = Config {
            chrome_path: Some("/opt/chrome/chrome".into()),
            ..Default::default()
        };
        assert_eq!(
            config.resolved_chrome_path(),
            Some(PathBuf::from("/opt/chrome/chrome"))
        );
    }
}
