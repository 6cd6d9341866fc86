//! Request validation for both capture entry points
//!
//! Validation has no side effects: nothing is written and no browser is
//! launched until a request has been turned into a [`CaptureRequest`] or
//! [`SnapshotRequest`].

use crate::{CaptureError, DeviceProfile};
use serde::Deserialize;

/// Body of the scrolling capture endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrollCaptureBody {
    pub html: Option<String>,
    pub device_type: Option<String>,
    pub orientation: Option<String>,
}

/// Body of the single-shot render endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderBody {
    pub code: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub content: String,
    pub profile: DeviceProfile,
}

impl CaptureRequest {
    pub fn new(content: impl Into<String>, profile: DeviceProfile) -> Result<Self, CaptureError> {
        let content = content.into();
        if content.is_empty() {
            return Err(CaptureError::InvalidInput("content required".to_string()));
        }
        Ok(Self { content, profile })
    }
}

impl TryFrom<ScrollCaptureBody> for CaptureRequest {
    type Error = CaptureError;

    fn try_from(body: ScrollCaptureBody) -> Result<Self, Self::Error> {
        let profile =
            DeviceProfile::resolve(body.device_type.as_deref(), body.orientation.as_deref());
        CaptureRequest::new(body.html.unwrap_or_default(), profile)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub content: String,
}

impl TryFrom<RenderBody> for SnapshotRequest {
    type Error = CaptureError;

    fn try_from(body: RenderBody) -> Result<Self, Self::Error> {
        let (code, language) = match (body.code, body.language) {
            (Some(code), Some(language)) if !code.is_empty() && !language.is_empty() => {
                (code, language)
            }
            _ => {
                return Err(CaptureError::InvalidInput(
                    "code and language are required".to_string(),
                ))
            }
        };

        if !language.eq_ignore_ascii_case("html") {
            return Err(CaptureError::UnsupportedLanguage(language));
        }

        Ok(SnapshotRequest { content: code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scroll_body(html: Option<&str>) -> ScrollCaptureBody {
        ScrollCaptureBody {
            html: html.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_or_empty_html_rejected() {
        for body in [scroll_body(None), scroll_body(Some(""))] {
            let err = CaptureRequest::try_from(body).unwrap_err();
            assert!(matches!(err, CaptureError::InvalidInput(ref m) if m == "content required"));
        }
    }

    #[test]
    fn test_defaults_to_desktop() {
        let request = CaptureRequest::try_from(scroll_body(Some("<p>hi</p>"))).unwrap();
        assert_eq!(request.profile, DeviceProfile::Desktop);
        assert_eq!(request.content, "<p>hi</p>");
    }

    #[test]
    fn test_phone_landscape_body() {
        let body = ScrollCaptureBody {
            html: Some("<p>hi</p>".into()),
            device_type: Some("Phone".into()),
            orientation: Some("LANDSCAPE".into()),
        };
        let request = CaptureRequest::try_from(body).unwrap();
        assert_eq!(request.profile, DeviceProfile::PhoneLandscape);
    }

    #[test]
    fn test_body_deserializes_with_missing_fields() {
        let body: ScrollCaptureBody = serde_json::from_str(r#"{"html": "<b>x</b>"}"#).unwrap();
        assert_eq!(body.html.as_deref(), Some("<b>x</b>"));
        assert!(body.device_type.is_none());
        assert!(body.orientation.is_none());
    }

    #[test]
    fn test_html_language_any_case() {
        for language in ["HTML", "Html", "html"] {
            let body = RenderBody {
                code: Some("<h1>x</h1>".into()),
                language: Some(language.into()),
            };
            assert!(SnapshotRequest::try_from(body).is_ok(), "{language} should be accepted");
        }
    }

    #[test]
    fn test_non_html_language_rejected() {
        let body = RenderBody {
            code: Some("# title".into()),
            language: Some("markdown".into()),
        };
        let err = SnapshotRequest::try_from(body).unwrap_err();
        assert!(matches!(err, CaptureError::UnsupportedLanguage(ref l) if l == "markdown"));
    }

    #[test]
    fn test_missing_code_or_language_rejected() {
        let missing_code = RenderBody {
            code: None,
            language: Some("html".into()),
        };
        let missing_language = RenderBody {
            code: Some("<p></p>".into()),
            language: None,
        };
        for body in [missing_code, missing_language, RenderBody::default()] {
            assert!(matches!(
                SnapshotRequest::try_from(body),
                Err(CaptureError::InvalidInput(_))
            ));
        }
    }
}
