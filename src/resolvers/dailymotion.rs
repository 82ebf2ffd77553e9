use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ResolveError;
use super::fetch::HostFetcher;
use super::traits::{HostKind, HostResolver, StreamInfo, VideoQuality};

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:dailymotion\.com/(?:embed/video|video)/|dai\.ly/)([a-zA-Z0-9]+)").unwrap()
});

pub struct DailymotionResolver {
    base_url: String,
}

impl DailymotionResolver {
    /// Resolver against the public Dailymotion API.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url("https://www.dailymotion.com")
    }

    /// Query the metadata API under `base_url` instead of dailymotion.com.
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for DailymotionResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostResolver for DailymotionResolver {
    fn kind(&self) -> HostKind {
        HostKind::Dailymotion
    }

    async fn resolve(
        &self,
        embed_url: &str,
        fetcher: &HostFetcher,
        cancel: &CancellationToken,
    ) -> Result<StreamInfo, ResolveError> {
        let video_id =
            extract_video_id(embed_url).ok_or(ResolveError::NotFound("dailymotion video id"))?;
        debug!(video_id = %video_id, "Resolving Dailymotion video");

        let metadata: Value = fetcher
            .get_json(
                &format!("{}/player/metadata/video/{video_id}", self.base_url),
                cancel,
            )
            .await?;

        StreamInfo::from_qualities(embed_url, self.kind(), flatten_qualities(&metadata))
            .ok_or(ResolveError::NotFound("dailymotion qualities"))
    }
}

/// Video id from a Dailymotion watch, embed or `dai.ly` URL.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID.captures(url).map(|caps| caps[1].to_string())
}

/// `{"qualities": {"auto": [{"url": ..}], "720": [..]}}` into label/URL pairs, in document order.
fn flatten_qualities(metadata: &Value) -> Vec<VideoQuality> {
    let Some(qualities) = metadata["qualities"].as_object() else {
        return Vec::new();
    };
    qualities
        .iter()
        .flat_map(|(label, formats)| {
            formats
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|format| format["url"].as_str())
                .map(move |url| VideoQuality::new(label.as_str(), url))
        })
        .collect()
}
