use crate::{
    install_prometheus, serve, AppState, ArtifactStore, BrowserLauncher, CaptureRequest,
    CaptureService, ChromiumLauncher, Config, DeviceProfile, Metrics, RetentionManager,
    SessionId, SnapshotRequest,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "snapshot-service")]
#[command(about = "Render HTML markup into PNG snapshots with headless Chrome")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Directory holding captured frames")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP capture server
    Serve {
        #[arg(long, help = "Bind address, e.g. 0.0.0.0:8000")]
        bind: Option<String>,

        #[arg(long, help = "Public base URL used for returned image links")]
        public_url: Option<String>,

        #[arg(long, help = "Enable the Prometheus metrics endpoint")]
        metrics: bool,
    },

    /// Capture an HTML file as a series of viewport frames
    Capture {
        #[arg(short, long, help = "HTML file to capture")]
        input: PathBuf,

        #[arg(long, help = "Device type (desktop or phone)")]
        device_type: Option<String>,

        #[arg(long, help = "Orientation for phone profiles (portrait or landscape)")]
        orientation: Option<String>,
    },

    /// Render an HTML file as one full-page PNG
    Render {
        #[arg(short, long, help = "HTML file to render")]
        input: PathBuf,

        #[arg(short, long, help = "Output PNG path")]
        output: PathBuf,
    },

    /// Remove every stored frame of a session now
    Cleanup {
        #[arg(short, long, help = "Session id")]
        session: String,
    },

    /// Validate configuration
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

pub struct CliRunner {
    pub config: Config,
    launcher: Arc<dyn BrowserLauncher>,
}

impl CliRunner {
    pub fn new(config: Config) -> Self {
        let launcher = Arc::new(ChromiumLauncher::new(config.clone()));
        Self { config, launcher }
    }

    pub fn with_launcher(config: Config, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self { config, launcher }
    }

    /// Runs `command`; a message on `shutdown` stops the server gracefully
    /// and abandons one-shot commands.
    pub async fn run(
        &self,
        command: Commands,
        mut shutdown: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        match command {
            Commands::Serve {
                bind,
                public_url,
                metrics,
            } => self.run_server(bind, public_url, metrics, shutdown).await,
            Commands::Validate { config } => self.validate_config(&config).await,
            other => {
                tokio::select! {
                    result = self.run_once(other) => result,
                    _ = shutdown.recv() => {
                        warn!("Interrupted before the command completed");
                        Ok(())
                    }
                }
            }
        }
    }

    async fn run_once(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Capture {
                input,
                device_type,
                orientation,
            } => {
                self.run_capture(&input, device_type.as_deref(), orientation.as_deref())
                    .await
            }
            Commands::Render { input, output } => self.run_render(&input, &output).await,
            Commands::Cleanup { session } => self.run_cleanup(&session).await,
            Commands::Serve { .. } | Commands::Validate { .. } => Ok(()),
        }
    }

    pub async fn run_server(
        &self,
        bind: Option<String>,
        public_url: Option<String>,
        metrics: bool,
        mut shutdown: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let mut config = self.config.clone();
        if let Some(bind) = bind {
            config.bind_address = bind;
        }
        if public_url.is_some() {
            config.public_base_url = public_url;
        }
        config.enable_metrics |= metrics;
        config.validate()?;

        let prometheus = if config.enable_metrics {
            Some(install_prometheus()?)
        } else {
            None
        };

        let state = Arc::new(AppState::from_config(
            &config,
            self.launcher.clone(),
            prometheus,
        )?);
        let listener = TcpListener::bind(&config.bind_address)
            .await
            .with_context(|| format!("binding {}", config.bind_address))?;

        serve(listener, state, async move {
            let _ = shutdown.recv().await;
        })
        .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    pub async fn run_capture(
        &self,
        input: &Path,
        device_type: Option<&str>,
        orientation: Option<&str>,
    ) -> anyhow::Result<()> {
        let html = read_markup(input).await?;
        let profile = DeviceProfile::resolve(device_type, orientation);
        let request = CaptureRequest::new(html, profile)?;

        let frames = self.capture_service()?.capture_frames(request).await?;

        println!("Capture completed:");
        println!("  Session: {}", frames.session_id);
        println!("  Profile: {:?}", profile);
        println!(
            "  Viewport: {}x{}",
            frames.viewport.width, frames.viewport.height
        );
        for artifact in &frames.frames {
            println!("  Frame {}: {}", artifact.index, artifact.path.display());
        }
        if frames.truncated {
            println!(
                "  Stopped at the {}-frame cap before the end of the document",
                self.config.capture.max_frames
            );
        }
        Ok(())
    }

    pub async fn run_render(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        let html = read_markup(input).await?;
        let png = self
            .capture_service()?
            .render_full_page(SnapshotRequest { content: html })
            .await?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(output, &png).await?;

        println!("Snapshot saved to: {}", output.display());
        println!("  Size: {}", crate::format_bytes(png.len()));
        Ok(())
    }

    pub async fn run_cleanup(&self, session: &str) -> anyhow::Result<()> {
        let session = SessionId::parse(session)?;
        let store = Arc::new(self.open_store()?);
        let retention = RetentionManager::new(
            store,
            self.config.retention_delay,
            Arc::new(Metrics::new()),
        );

        let report = retention.cleanup(&session).await;
        println!("Removed {} files", report.removed.len());
        for file in &report.removed {
            println!("  {file}");
        }
        for failure in &report.failures {
            println!("  failed: {failure}");
        }
        Ok(())
    }

    pub async fn validate_config(&self, config_path: &Path) -> anyhow::Result<()> {
        println!("Validating configuration: {}", config_path.display());

        let config = Config::load(Some(config_path)).await?;
        config.validate()?;

        println!("Configuration is valid:");
        println!("  Bind address: {}", config.bind_address);
        println!("  Output dir: {}", config.output_dir.display());
        println!("  Static route: {}", config.static_route);
        println!(
            "  Retention delay: {}",
            crate::format_duration(config.retention_delay)
        );
        println!("  Max frames: {}", config.capture.max_frames);
        println!(
            "  Load settle: {}",
            crate::format_duration(config.capture.load_settle)
        );

        Ok(())
    }

    fn open_store(&self) -> anyhow::Result<ArtifactStore> {
        ArtifactStore::open(&self.config.output_dir, &self.config.static_route)
            .with_context(|| format!("opening {}", self.config.output_dir.display()))
    }

    fn capture_service(&self) -> anyhow::Result<CaptureService> {
        Ok(CaptureService::new(
            self.launcher.clone(),
            Arc::new(self.open_store()?),
            self.config.capture.clone(),
            self.config.scratch_dir(),
            Arc::new(Metrics::new()),
        ))
    }
}

async fn read_markup(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_capture_command() {
        let cli = Cli::try_parse_from([
            "snapshot-service",
            "--output-dir",
            "/tmp/frames",
            "capture",
            "--input",
            "page.html",
            "--device-type",
            "phone",
            "--orientation",
            "landscape",
        ])
        .unwrap();

        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/frames")));
        match cli.command {
            Commands::Capture {
                input,
                device_type,
                orientation,
            } => {
                assert_eq!(input, PathBuf::from("page.html"));
                assert_eq!(device_type.as_deref(), Some("phone"));
                assert_eq!(orientation.as_deref(), Some("landscape"));
            }
            _ => panic!("expected capture command"),
        }
    }

    #[tokio::test]
    async fn test_cleanup_rejects_malformed_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let runner = CliRunner::new(config);
        assert!(runner.run_cleanup("../etc").await.is_err());
    }
}
