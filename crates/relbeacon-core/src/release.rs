//! Normalized release record and the small formatting helpers around it.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Version sentinel used when a source does not name one.
pub const UNKNOWN_VERSION: &str = "unknown";
/// Filename used when a URL has no usable last path segment.
pub const DEFAULT_ARTIFACT_NAME: &str = "app-release.apk";

/// Which kind of build an artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildVariant {
    Release,
    Debug,
    Profile,
    Local,
    Fallback,
}

impl BuildVariant {
    /// Case-insensitive parse of a manifest `BUILD_TYPE` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "release" => Some(Self::Release),
            "debug" => Some(Self::Debug),
            "profile" => Some(Self::Profile),
            "local" => Some(Self::Local),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }
}

impl std::fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Release => "Release",
            Self::Debug => "Debug",
            Self::Profile => "Profile",
            Self::Local => "Local",
            Self::Fallback => "Fallback",
        };
        f.write_str(s)
    }
}

/// Provenance of a [`ReleaseInfo`]. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    RemoteApi,
    LocalManifest,
    StaticFallback,
}

/// The currently installable artifact as reported by one source.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseInfo {
    pub version: String,
    pub download_url: String,
    #[serde(with = "rfc3339")]
    pub published_at: SystemTime,
    /// 0 means unknown.
    pub size_bytes: u64,
    pub build_variant: BuildVariant,
    pub source_kind: SourceKind,
    pub asset_name: String,
    pub commit: String,
    /// Highlighted lines from the release notes; may be empty.
    pub notes: String,
}

impl ReleaseInfo {
    /// Two records describe the same release when version and URL match.
    /// Size, date and provenance are deliberately ignored.
    pub fn same_release(&self, other: &ReleaseInfo) -> bool {
        self.version == other.version && self.download_url == other.download_url
    }

    /// A record is usable only if it points somewhere.
    pub fn is_usable(&self) -> bool {
        !self.download_url.trim().is_empty()
    }
}

/// Trimmed value, or the `"unknown"` sentinel when absent or blank.
pub fn or_unknown(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN_VERSION.to_string(),
    }
}

/// Infers the build variant from an asset filename.
pub fn build_variant_from_name(name: &str) -> BuildVariant {
    if name.contains("Release") {
        BuildVariant::Release
    } else if name.contains("Debug") {
        BuildVariant::Debug
    } else if name.contains("Profile") {
        BuildVariant::Profile
    } else {
        BuildVariant::Release
    }
}

const NOTE_MARKERS: [&str; 3] = ["✅", "🔧", "📱"];
const MAX_NOTE_LINES: usize = 5;

/// Extracts up to five highlighted lines from a release body.
pub fn release_notes_summary(body: &str) -> String {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| NOTE_MARKERS.iter().any(|m| line.contains(m)))
        .take(MAX_NOTE_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Last non-empty path segment of `url`, or [`DEFAULT_ARTIFACT_NAME`].
pub fn filename_from_url(url: &str) -> String {
    let last = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string)),
        // Relative locations such as "./app.apk".
        Err(_) => url.rsplit('/').next().map(str::to_string),
    };
    last.filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string())
}

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Human-readable size with one decimal, trailing `.0` dropped:
/// `0` -> "0 B", `1536` -> "1.5 KB".
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{scaled:.1}");
    let trimmed = rounded.strip_suffix(".0").unwrap_or(&rounded);
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

/// Size in megabytes for display, `None` when unknown.
pub fn format_megabytes(bytes: u64) -> Option<String> {
    if bytes == 0 {
        return None;
    }
    Some(format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0)))
}

/// Parses an RFC 3339 timestamp, falling back to `now` when absent or malformed.
pub fn parse_timestamp_or(value: Option<&str>, now: SystemTime) -> SystemTime {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => humantime::parse_rfc3339_weak(v).unwrap_or_else(|e| {
            tracing::debug!(value = v, error = %e, "unparseable timestamp, using resolution time");
            now
        }),
        None => now,
    }
}

mod rfc3339 {
    use std::time::SystemTime;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(time: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_rfc3339_seconds(*time))
    }
}
