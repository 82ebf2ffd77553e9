use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ResolveError;
use super::fetch::HostFetcher;
use super::traits::{HostKind, HostResolver, StreamInfo, VideoQuality};

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"vimeo\.com/(?:video/)?(\d+)").unwrap());

pub struct VimeoResolver {
    base_url: String,
}

impl VimeoResolver {
    /// Resolver against the public Vimeo player.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url("https://player.vimeo.com")
    }

    /// Query the player config under `base_url` instead of player.vimeo.com.
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for VimeoResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostResolver for VimeoResolver {
    fn kind(&self) -> HostKind {
        HostKind::Vimeo
    }

    async fn resolve(
        &self,
        embed_url: &str,
        fetcher: &HostFetcher,
        cancel: &CancellationToken,
    ) -> Result<StreamInfo, ResolveError> {
        let video_id =
            extract_video_id(embed_url).ok_or(ResolveError::NotFound("vimeo video id"))?;
        debug!(video_id = %video_id, "Resolving Vimeo video");

        let config: Value = fetcher
            .get_json(&format!("{}/video/{video_id}/config", self.base_url), cancel)
            .await?;
        let files = &config["request"]["files"];

        if let Some(info) = StreamInfo::from_qualities(embed_url, self.kind(), progressive(files)) {
            return Ok(info);
        }
        default_hls(files)
            .map(|url| StreamInfo::resolved(embed_url, self.kind(), url))
            .ok_or(ResolveError::NotFound("vimeo stream"))
    }
}

/// Numeric video id from a vimeo.com or player.vimeo.com URL.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID.captures(url).map(|caps| caps[1].to_string())
}

fn progressive(files: &Value) -> Vec<VideoQuality> {
    files["progressive"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|file| {
            Some(VideoQuality::new(
                file["quality"].as_str()?,
                file["url"].as_str()?,
            ))
        })
        .collect()
}

/// HLS playlist on the CDN the config marks as default.
fn default_hls(files: &Value) -> Option<&str> {
    let hls = &files["hls"];
    let cdn = hls["default_cdn"].as_str()?;
    hls["cdns"][cdn]["url"].as_str().filter(|url| !url.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            extract_video_id("https://player.vimeo.com/video/76979871?h=8272103f6e").as_deref(),
            Some("76979871")
        );
        assert_eq!(
            extract_video_id("https://vimeo.com/76979871").as_deref(),
            Some("76979871")
        );
        assert_eq!(extract_video_id("https://vimeo.com/channels/staff"), None);
    }

    #[test]
    fn test_progressive_and_hls() {
        let config: Value = serde_json::from_str(
            r#"{"request": {"files": {
                "progressive": [
                    {"quality": "360p", "url": "https://vod.example/360.mp4"},
                    {"quality": "720p", "url": "https://vod.example/720.mp4"}
                ],
                "hls": {"default_cdn": "akfire", "cdns": {"akfire": {"url": "https://hls.example/master.m3u8"}}}
            }}}"#,
        )
        .unwrap();
        let files = &config["request"]["files"];
        assert_eq!(progressive(files).len(), 2);
        assert_eq!(default_hls(files), Some("https://hls.example/master.m3u8"));
    }

    #[test]
    fn test_missing_files() {
        let config: Value = serde_json::from_str(r#"{"request": {}}"#).unwrap();
        let files = &config["request"]["files"];
        assert!(progressive(files).is_empty());
        assert_eq!(default_hls(files), None);
    }
}
