use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::error::ResolveError;
use super::fetch::HostFetcher;
use super::traits::{HostKind, HostResolver, StreamInfo};

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/|v/)|youtu\.be/)([a-zA-Z0-9_-]{11})",
    )
    .unwrap()
});

/// YouTube streams are signed per client, so the best we hand back is a
/// canonical embed URL for a player that can run the host's own script.
pub struct YouTubeResolver;

impl YouTubeResolver {
    /// Create the resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for YouTubeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostResolver for YouTubeResolver {
    fn kind(&self) -> HostKind {
        HostKind::YouTube
    }

    async fn resolve(
        &self,
        embed_url: &str,
        _fetcher: &HostFetcher,
        _cancel: &CancellationToken,
    ) -> Result<StreamInfo, ResolveError> {
        let direct_url = extract_video_id(embed_url).map_or_else(
            || embed_url.to_string(),
            |id| format!("https://www.youtube.com/embed/{id}"),
        );
        Ok(StreamInfo {
            requires_embedding: true,
            ..StreamInfo::resolved(embed_url, self.kind(), &direct_url)
        })
    }
}

/// 11-character video id from any common YouTube URL form.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID.captures(url).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
        ];
        for url in cases {
            assert_eq!(extract_video_id(url).as_deref(), Some("dQw4w9WgXcQ"), "{url}");
        }
        assert_eq!(extract_video_id("https://www.youtube.com/channel/x"), None);
    }

    #[tokio::test]
    async fn test_resolves_to_embed_player() {
        let fetcher = HostFetcher::new(std::time::Duration::from_secs(1)).unwrap();
        let info = YouTubeResolver::new()
            .resolve(
                "https://youtu.be/dQw4w9WgXcQ",
                &fetcher,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(info.direct_url, "https://www.youtube.com/embed/dQw4w9WgXcQ");
        assert!(info.requires_embedding);
        assert_eq!(info.host, "youtube");
        assert!(info.error.is_none());
    }
}
