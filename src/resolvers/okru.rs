use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ResolveError;
use super::fetch::HostFetcher;
use super::traits::{HostKind, HostResolver, StreamInfo, VideoQuality};

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:videoembed|video)/(\d+)").unwrap());

static HLS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^"'\s]+\.m3u8[^"'\s]*"#).unwrap());

static MP4_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^"'\s]+\.mp4[^"'\s]*"#).unwrap());

static DATA_OPTIONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-options]").unwrap());

pub struct OkRuResolver {
    base_url: String,
}

impl OkRuResolver {
    /// Resolver against ok.ru.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url("https://ok.ru")
    }

    /// Fetch embed pages from `base_url` instead of ok.ru.
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for OkRuResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostResolver for OkRuResolver {
    fn kind(&self) -> HostKind {
        HostKind::OkRu
    }

    async fn resolve(
        &self,
        embed_url: &str,
        fetcher: &HostFetcher,
        cancel: &CancellationToken,
    ) -> Result<StreamInfo, ResolveError> {
        let video_id = extract_video_id(embed_url).ok_or(ResolveError::NotFound("ok.ru video id"))?;
        debug!(video_id = %video_id, "Resolving ok.ru video");

        let page_url = format!("{}/videoembed/{video_id}", self.base_url);
        let html = fetcher.get_text(&page_url, None, cancel).await?;

        match qualities_from_options(&html) {
            Ok(qualities) => {
                if let Some(info) = StreamInfo::from_qualities(embed_url, self.kind(), qualities) {
                    return Ok(info);
                }
            }
            Err(e) => debug!(error = %e, "ok.ru player options unusable, scanning page"),
        }

        stream_from_text(embed_url, &html).ok_or(ResolveError::NotFound("ok.ru stream URL"))
    }
}

/// Numeric video id from a `/videoembed/{id}` or `/video/{id}` URL.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID.captures(url).map(|caps| caps[1].to_string())
}

/// Read renditions from the player's `data-options` attribute.
///
/// The attribute holds JSON whose `flashvars.metadata` is itself JSON, usually
/// as a string.
fn qualities_from_options(html: &str) -> Result<Vec<VideoQuality>, ResolveError> {
    let document = Html::parse_document(html);
    let raw = document
        .select(&DATA_OPTIONS)
        .find_map(|el| el.value().attr("data-options"))
        .ok_or(ResolveError::NotFound("data-options"))?;

    let options: Value = serde_json::from_str(raw)?;
    let metadata: Value = match &options["flashvars"]["metadata"] {
        Value::String(nested) => serde_json::from_str(nested)?,
        object @ Value::Object(_) => object.clone(),
        _ => return Err(ResolveError::NotFound("flashvars.metadata")),
    };

    Ok(metadata["videos"]
        .as_array()
        .map(|videos| {
            videos
                .iter()
                .filter_map(|video| {
                    Some(VideoQuality::new(
                        video["name"].as_str()?,
                        video["url"].as_str()?,
                    ))
                })
                .collect()
        })
        .unwrap_or_default())
}

/// Last resort: any HLS, then MP4, URL in the raw page.
fn stream_from_text(embed_url: &str, html: &str) -> Option<StreamInfo> {
    let text = html
        .replace("\\/", "/")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    HLS_URL
        .find(&text)
        .or_else(|| MP4_URL.find(&text))
        .map(|m| StreamInfo::resolved(embed_url, HostKind::OkRu, m.as_str()))
}
