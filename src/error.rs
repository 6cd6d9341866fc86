use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Unsupported language: {0}. Currently only HTML rendering is supported")]
    UnsupportedLanguage(String),

    #[error("Screenshot capture failed: {0}")]
    CaptureFailed(String),

    #[error("Page load timed out after {0:?}")]
    LoadTimeout(Duration),

    #[error("Failed to remove {file}: {reason}")]
    CleanupFailed { file: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl CaptureError {
    /// Client-caused errors are reported before any temp file or browser is acquired.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CaptureError::InvalidInput(_)
                | CaptureError::UnsupportedLanguage(_)
                | CaptureError::NotFound(_)
                | CaptureError::PayloadTooLarge(_)
        )
    }

    pub fn status_code(&self) -> u16 {
        match self {
            CaptureError::InvalidInput(_) | CaptureError::UnsupportedLanguage(_) => 400,
            CaptureError::NotFound(_) => 404,
            CaptureError::PayloadTooLarge(_) => 413,
            CaptureError::LoadTimeout(_) => 504,
            _ => 500,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CaptureError::InvalidInput(_) => ErrorSeverity::Low,
            CaptureError::UnsupportedLanguage(_) => ErrorSeverity::Low,
            CaptureError::NotFound(_) => ErrorSeverity::Low,
            CaptureError::PayloadTooLarge(_) => ErrorSeverity::Low,
            CaptureError::CleanupFailed { .. } => ErrorSeverity::Low,
            CaptureError::Configuration(_) => ErrorSeverity::High,
            _ => ErrorSeverity::Medium,
        }
    }

    pub(crate) fn capture(err: impl std::fmt::Display) -> Self {
        CaptureError::CaptureFailed(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::Configuration(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for CaptureError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        CaptureError::CaptureFailed(err.to_string())
    }
}
