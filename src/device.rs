//! Device profiles and the fixed viewport resolution table
//!
//! A capture request names a device type and an orientation as loose strings.
//! Both are folded into a [`DeviceProfile`], which maps to exactly one
//! [`Viewport`]. The table is policy, not configuration.

use serde::{Deserialize, Serialize};

/// User agent sent when a phone profile is emulated (default for `Config::mobile_user_agent`)
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Phone,
}

impl DeviceType {
    /// Case-insensitive; anything absent or unknown is `Desktop`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("phone") => DeviceType::Phone,
            _ => DeviceType::Desktop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Case-insensitive; anything absent or unknown is `Portrait`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("landscape") => Orientation::Landscape,
            _ => Orientation::Portrait,
        }
    }
}

/// Named viewport/emulation configuration used by the scrolling capture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceProfile {
    #[default]
    Desktop,
    PhonePortrait,
    PhoneLandscape,
}

impl DeviceProfile {
    pub fn from_parts(device: DeviceType, orientation: Orientation) -> Self {
        match (device, orientation) {
            (DeviceType::Desktop, _) => DeviceProfile::Desktop,
            (DeviceType::Phone, Orientation::Portrait) => DeviceProfile::PhonePortrait,
            (DeviceType::Phone, Orientation::Landscape) => DeviceProfile::PhoneLandscape,
        }
    }

    pub fn resolve(device_type: Option<&str>, orientation: Option<&str>) -> Self {
        Self::from_parts(
            DeviceType::parse_lenient(device_type),
            Orientation::parse_lenient(orientation),
        )
    }

    pub fn viewport(&self) -> Viewport {
        match self {
            DeviceProfile::Desktop => Viewport {
                width: 1280,
                height: 800,
                device_scale_factor: 1.0,
                mobile: false,
            },
            DeviceProfile::PhonePortrait => Viewport {
                width: 375,
                height: 667,
                device_scale_factor: 2.0,
                mobile: true,
            },
            DeviceProfile::PhoneLandscape => Viewport {
                width: 667,
                height: 375,
                device_scale_factor: 2.0,
                mobile: true,
            },
        }
    }

    pub fn is_phone(&self) -> bool {
        !matches!(self, DeviceProfile::Desktop)
    }
}

/// Browser viewport configuration for screenshots
///
/// Sizes are device-independent pixels. `device_scale_factor` and `mobile`
/// only differ from desktop defaults for phone profiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
}

impl Viewport {
    /// Fixed mobile-sized viewport used by the single-shot render.
    pub const fn single_shot() -> Self {
        Viewport {
            width: 375,
            height: 812,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

impl Default for Viewport {
    fn default() -> Self {
        DeviceProfile::Desktop.viewport()
    }
}
