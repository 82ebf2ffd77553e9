//! Shared constants used across the application.

/// User agent for host resolver requests that do not go through the bypass session.
pub const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// User agent for the unauthenticated direct-mode listing client.
pub const MOBILE_USER_AGENT: &str =
    "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";

/// Accept header sent by the cookie-carrying direct channel.
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Accept header sent by the direct-mode listing client.
pub const ACCEPT_HTML_BROWSER: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// The listed content is Japanese; ask for it first.
pub const ACCEPT_LANGUAGE: &str = "ja,en-US;q=0.9,en;q=0.8";

/// Case-insensitive token the solver's root page must contain for the probe to succeed.
pub const SOLVER_MARKER: &str = "flaresolverr";

/// Fragments that identify an anti-bot interstitial instead of real content.
pub const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "challenge-platform",
    "Just a moment",
    "Checking your browser",
    "cf-spinner",
];

/// Page titles of the interstitial itself, as opposed to scripts Cloudflare injects into real pages.
pub const INTERSTITIAL_TITLES: &[&str] = &["Just a moment", "Checking your browser"];

/// `maxTimeout` handed to the solver when acquiring cookies, in milliseconds.
pub const COOKIE_ACQUIRE_TIMEOUT_MS: u64 = 60_000;

/// `maxTimeout` for listing and post-page fetches routed through the solver.
pub const PAGE_FETCH_TIMEOUT_MS: u64 = 60_000;

/// `maxTimeout` for the secondary `load_video_iframe` call.
pub const IFRAME_FETCH_TIMEOUT_MS: u64 = 30_000;

/// AJAX action returning a page of listing articles.
pub const LOAD_MORE_ACTION: &str = "load_more";

/// AJAX action returning the player iframe for one post.
pub const LOAD_VIDEO_IFRAME_ACTION: &str = "load_video_iframe";
