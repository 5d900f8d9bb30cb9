//! Plausibility heuristics and candidate scoring.

use super::ValidationResult;

pub const MIB: u64 = 1024 * 1024;
/// Artifacts at or below this size are treated as placeholders.
pub const MIN_ARTIFACT_BYTES: u64 = MIB;
/// Size above which a candidate earns the "large" bonus.
pub const LARGE_ARTIFACT_BYTES: u64 = 5 * MIB;

/// Content types an installable package is served with (substring match).
pub const INSTALLABLE_CONTENT_TYPES: [&str; 3] = [
    "application/vnd.android.package-archive",
    "application/octet-stream",
    "application/java-archive",
];

const BASE_SCORE: i64 = 100;
const PLAUSIBLE_BONUS: i64 = 50;
const LARGE_BONUS: i64 = 25;
const SECURE_BONUS: i64 = 10;
const SMALL_PENALTY: i64 = 30;

/// Highest score [`score`] can produce.
pub const MAX_SCORE: u32 = 185;

/// Content type on the allow-list and size above the minimum.
pub fn is_artifact_plausible(result: &ValidationResult) -> bool {
    let content_type = result.content_type.to_ascii_lowercase();
    let known_type = INSTALLABLE_CONTENT_TYPES
        .iter()
        .any(|t| content_type.contains(t));
    known_type && result.content_length_bytes > MIN_ARTIFACT_BYTES
}

/// Ranking score in `[0, MAX_SCORE]`. Pure function of the result.
pub fn score(result: &ValidationResult) -> u32 {
    if !result.is_reachable {
        return 0;
    }
    let mut score = BASE_SCORE;
    if result.artifact_plausible {
        score += PLAUSIBLE_BONUS;
    }
    if result.content_length_bytes > LARGE_ARTIFACT_BYTES {
        score += LARGE_BONUS;
    }
    if is_secure(&result.url) {
        score += SECURE_BONUS;
    }
    if result.content_length_bytes < MIN_ARTIFACT_BYTES {
        score -= SMALL_PENALTY;
    }
    u32::try_from(score.max(0)).unwrap_or(0)
}

fn is_secure(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| u.scheme() == "https")
        .unwrap_or(false)
}
