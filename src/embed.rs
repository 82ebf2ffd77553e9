//! Embed URL discovery in post pages.
//!
//! Everything here is pure text analysis. Candidates are checked against a
//! permissive allow-list; anything wrong that slips through is left for the
//! host resolver to pass along untouched.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

/// Host fragments accepted as video embeds.
const ALLOWED_HOSTS: &[&str] = &[
    "ok.ru",
    "dailymotion",
    "youtube",
    "youtu.be",
    "vimeo",
    "streamtape",
    "dood",
    "mixdrop",
    "fembed",
    "vidoza",
    "upstream",
    "videobin",
    "mp4upload",
    "vidlox",
];

/// A named pattern whose first capture group is a candidate URL.
struct EmbedRule {
    name: &'static str,
    pattern: Regex,
}

/// Script-scan rules, most specific first.
///
/// `src="//ok.ru/videoembed/123"` matches `known-host`;
/// `src="https://cdn.example/player/embed/9"` only matches `embed-src`.
static SCRIPT_RULES: LazyLock<Vec<EmbedRule>> = LazyLock::new(|| {
    vec![
        EmbedRule {
            name: "known-host",
            pattern: Regex::new(
                r#"(?i)src=['"]([^'"]*(?:ok\.ru|dailymotion|youtube|vimeo|streamtape|dood|mixdrop)[^'"]*)['"]"#,
            )
            .unwrap(),
        },
        EmbedRule {
            name: "videoembed-path",
            pattern: Regex::new(r#"(?i)src=['"]([^'"]+/videoembed/[^'"]+)['"]"#).unwrap(),
        },
        EmbedRule {
            name: "embed-src",
            pattern: Regex::new(r#"(?i)src=['"]([^'"]+embed[^'"]+)['"]"#).unwrap(),
        },
        EmbedRule {
            name: "any-iframe",
            pattern: Regex::new(r#"(?i)<iframe[^>]+src=['"]([^'"]+)['"]"#).unwrap(),
        },
    ]
});

static POST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\s+postId\s*=\s*(\d+)").unwrap());

static NONCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"_wpnonce:\s*['"]([^'"]+)['"]"#).unwrap());

static PLAYER_IFRAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#player-embed iframe").unwrap());

static ANY_IFRAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("iframe[src]").unwrap());

/// Rewrite protocol-relative URLs to `https:`; everything else passes through unchanged.
#[must_use]
pub fn normalize_video_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    }
}

/// Whether `url` plausibly points at a video player.
#[must_use]
pub fn is_valid_video_url(url: &str) -> bool {
    if url.trim().is_empty() {
        return false;
    }
    let lower = url.to_lowercase();
    ALLOWED_HOSTS.iter().any(|host| lower.contains(host))
        || lower.contains("embed")
        || lower.contains("player")
}

/// Find a player URL referenced anywhere in the page text, typically an inline script.
#[must_use]
pub fn find_in_script(html: &str) -> Option<String> {
    for rule in SCRIPT_RULES.iter() {
        for caps in rule.pattern.captures_iter(html) {
            let url = normalize_video_url(caps[1].trim());
            if is_valid_video_url(&url) {
                debug!(rule = rule.name, url = %url, "Embed found in page text");
                return Some(url);
            }
        }
    }
    None
}

/// Find an iframe player in the DOM, preferring the dedicated player container.
#[must_use]
pub fn find_in_iframes(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    if let Some(src) = document
        .select(&PLAYER_IFRAME)
        .next()
        .and_then(|iframe| iframe.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
    {
        return Some(normalize_video_url(src));
    }

    document
        .select(&ANY_IFRAME)
        .filter_map(|iframe| iframe.value().attr("src"))
        .map(str::trim)
        .find(|src| is_valid_video_url(src))
        .map(normalize_video_url)
}

/// Numeric post id from `var postId = 123`.
#[must_use]
pub fn extract_post_id(html: &str) -> Option<String> {
    POST_ID.captures(html).map(|caps| caps[1].to_string())
}

/// Nonce from `_wpnonce: 'abc123'`.
#[must_use]
pub fn extract_nonce(html: &str) -> Option<String> {
    NONCE.captures(html).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_protocol_relative() {
        assert_eq!(
            normalize_video_url("//ok.ru/videoembed/123"),
            "https://ok.ru/videoembed/123"
        );
        assert_eq!(
            normalize_video_url("https://vimeo.com/1"),
            "https://vimeo.com/1"
        );
        assert_eq!(normalize_video_url("/relative/path"), "/relative/path");
        assert_eq!(normalize_video_url(" //x.example/e"), " //x.example/e");
    }

    #[test]
    fn test_validity() {
        assert!(is_valid_video_url("https://OK.RU/videoembed/1"));
        assert!(is_valid_video_url("https://youtu.be/abcdefghijk"));
        assert!(is_valid_video_url("https://cdn.example/embed/5"));
        assert!(is_valid_video_url("https://cdn.example/Player.html"));
        assert!(!is_valid_video_url("https://ads.example/banner.js"));
        assert!(!is_valid_video_url(""));
    }

    #[test]
    fn test_script_scan_prefers_known_host() {
        let html = r#"
            <img src="https://cdn.example/embed-thumb.jpg">
            <script>
              jQuery('#player-embed').html('<iframe src="//ok.ru/videoembed/10521329404563"></iframe>');
            </script>
        "#;
        assert_eq!(
            find_in_script(html).as_deref(),
            Some("https://ok.ru/videoembed/10521329404563")
        );
    }

    #[test]
    fn test_script_scan_generic_embed() {
        let html = r#"<script>var p = '<iframe src="https://player.example/embed/77">';</script>"#;
        assert_eq!(
            find_in_script(html).as_deref(),
            Some("https://player.example/embed/77")
        );
    }

    #[test]
    fn test_script_scan_nothing() {
        assert_eq!(find_in_script(r#"<img src="/logo.png">"#), None);
    }

    #[test]
    fn test_iframe_player_container_wins() {
        let html = r#"
            <iframe src="https://www.dailymotion.com/embed/video/x1"></iframe>
            <div id="player-embed"><iframe src="//cdn.example/v/9"></iframe></div>
        "#;
        assert_eq!(
            find_in_iframes(html).as_deref(),
            Some("https://cdn.example/v/9")
        );
    }

    #[test]
    fn test_iframe_src_trimmed_before_normalizing() {
        let html = r#"<div id="player-embed"><iframe src=" //ok.ru/videoembed/7 "></iframe></div>"#;
        assert_eq!(
            find_in_iframes(html).as_deref(),
            Some("https://ok.ru/videoembed/7")
        );

        let html = r#"<iframe src="
            //www.dailymotion.com/embed/video/x2"></iframe>"#;
        assert_eq!(
            find_in_iframes(html).as_deref(),
            Some("https://www.dailymotion.com/embed/video/x2")
        );
    }

    #[test]
    fn test_iframe_any_valid() {
        let html = r#"
            <iframe src="https://ads.example/banner"></iframe>
            <iframe src="https://streamtape.com/e/abc"></iframe>
        "#;
        assert_eq!(
            find_in_iframes(html).as_deref(),
            Some("https://streamtape.com/e/abc")
        );
        assert_eq!(find_in_iframes("<p>no player</p>"), None);
    }

    #[test]
    fn test_post_id_and_nonce() {
        let html = r#"<script>var postId = 4821; jQuery.post(url, {post_id: postId, _wpnonce: 'f00dcafe'});</script>"#;
        assert_eq!(extract_post_id(html).as_deref(), Some("4821"));
        assert_eq!(extract_nonce(html).as_deref(), Some("f00dcafe"));
        assert_eq!(extract_post_id("var other = 1;"), None);
        assert_eq!(extract_nonce("nothing"), None);
    }
}
