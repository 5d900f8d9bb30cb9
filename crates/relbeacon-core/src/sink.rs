//! Narrow interfaces to the UI collaborators.
//!
//! The resolver pushes into these; it never reads anything back except the
//! renderer's success or failure.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::release::ReleaseInfo;

/// Error correction level for the rendered code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

/// Foreground and background colours as CSS-style hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderColors {
    pub dark: String,
    pub light: String,
}

impl Default for RenderColors {
    fn default() -> Self {
        Self {
            dark: "#FF6A00".to_string(),
            light: "#FFFFFF".to_string(),
        }
    }
}

/// Visual options handed to the renderer untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Edge length in pixels.
    pub size: u32,
    /// Quiet zone in modules.
    pub margin: u32,
    pub colors: RenderColors,
    pub error_correction: ErrorCorrection,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            size: 256,
            margin: 2,
            colors: RenderColors::default(),
            error_correction: ErrorCorrection::M,
        }
    }
}

/// Opaque code-image capability. Owns its target surface.
pub trait Renderer: Send + Sync {
    fn render(&self, payload_url: &str, options: &RenderOptions) -> Result<(), RenderError>;
}

/// Coarse state shown next to the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewStatus {
    Loading,
    Success,
    Error,
}

/// Display sink. Purely a receiver.
pub trait View: Send + Sync {
    fn show_status(&self, status: ViewStatus, message: &str);
    fn show_release(&self, release: &ReleaseInfo);
}
