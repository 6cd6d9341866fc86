//! # Snapshot Service
//!
//! An HTTP service that renders caller-supplied HTML in headless Chrome and
//! returns PNG snapshots. Two capture strategies share one browser lifecycle:
//!
//! - **Scrolling capture** (`POST /screenshot`): the markup is rendered at a
//!   desktop or phone viewport and captured one viewport at a time while
//!   scrolling, up to 20 frames. Frames are stored under the output directory,
//!   served from the static route, and swept two minutes later.
//! - **Single-shot render** (`POST /render-screenshot`): one full-page PNG at a
//!   fixed 375x812 viewport, returned directly in the response body.
//!
//! Every request launches its own browser with a throwaway profile and stages
//! its markup as a uniquely named temp document, so concurrent requests never
//! share state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snapshot_service::{AppState, ChromiumLauncher, Config, serve};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let launcher = Arc::new(ChromiumLauncher::new(config.clone()));
//!     let state = Arc::new(AppState::from_config(&config, launcher, None)?);
//!
//!     let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
//!     serve(listener, state, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ### Server
//! ```bash
//! snapshot-service serve --bind 0.0.0.0:8000 --metrics
//! ```
//!
//! ### One-off captures
//! ```bash
//! snapshot-service capture --input page.html --device-type phone --orientation landscape
//! snapshot-service render --input page.html --output page.png
//! ```

/// Configuration and settings for the service
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Device profiles and viewport geometry
pub mod device;

/// Request bodies and their validation
pub mod request;

/// Output directory management and session artifact naming
pub mod storage;

/// Per-session headless browser acquisition
pub mod browser;

/// Capture controller for both capture strategies
pub mod capture;

/// Deferred and manual cleanup of session artifacts
pub mod retention;

/// HTTP routes and server
pub mod server;

/// Command-line interface implementation
pub mod cli;

/// Performance metrics collection
pub mod metrics;

/// Health reporting for the output directory and pending sweeps
pub mod health;

/// Utility functions and helpers
pub mod utils;


pub use browser::*;
pub use capture::*;
pub use cli::*;
pub use config::*;
pub use device::*;
pub use error::*;
pub use health::*;
pub use metrics::*;
pub use request::*;
pub use retention::*;
pub use server::*;
pub use storage::*;
pub use utils::*;
