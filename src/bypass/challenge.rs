use crate::constants::{CHALLENGE_MARKERS, INTERSTITIAL_TITLES};

/// Check if a response body is an anti-bot interstitial rather than real content.
#[must_use]
pub fn is_challenge(body: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Check if a response is the interstitial served in place of a page.
///
/// Ordinary pages behind Cloudflare embed `challenge-platform` scripts too, so
/// only a blocking status carrying the interstitial's title counts.
#[must_use]
pub fn is_interstitial_response(status: u16, body: &str) -> bool {
    matches!(status, 403 | 503) && INTERSTITIAL_TITLES.iter().any(|title| body.contains(title))
}
