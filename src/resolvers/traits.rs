use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::error::ResolveError;
use super::fetch::HostFetcher;
use super::quality::select_best;

/// Video hosts with a dedicated resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    OkRu,
    Dailymotion,
    YouTube,
    Vimeo,
    Streamtape,
    DoodStream,
    Mixdrop,
}

impl HostKind {
    pub const ALL: [Self; 7] = [
        Self::OkRu,
        Self::Dailymotion,
        Self::YouTube,
        Self::Vimeo,
        Self::Streamtape,
        Self::DoodStream,
        Self::Mixdrop,
    ];

    /// Identifier reported in [`StreamInfo::host`].
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::OkRu => "ok.ru",
            Self::Dailymotion => "dailymotion",
            Self::YouTube => "youtube",
            Self::Vimeo => "vimeo",
            Self::Streamtape => "streamtape",
            Self::DoodStream => "doodstream",
            Self::Mixdrop => "mixdrop",
        }
    }

    const fn fragments(self) -> &'static [&'static str] {
        match self {
            Self::OkRu => &["ok.ru"],
            Self::Dailymotion => &["dailymotion", "dai.ly"],
            Self::YouTube => &["youtube", "youtu.be"],
            Self::Vimeo => &["vimeo"],
            Self::Streamtape => &["streamtape"],
            Self::DoodStream => &["dood"],
            Self::Mixdrop => &["mixdrop"],
        }
    }

    /// Substring match against a hostname, ignoring case.
    #[must_use]
    pub fn matches(self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.fragments().iter().any(|fragment| host.contains(fragment))
    }
}

/// One rendition offered by a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoQuality {
    pub name: String,
    pub url: String,
}

impl VideoQuality {
    /// Create a quality entry from a label and its URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Outcome of resolving an embed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub embed_url: String,
    /// Media URL, or the embed URL itself when resolution degraded.
    pub direct_url: String,
    pub host: String,
    pub quality: Option<String>,
    pub qualities: Vec<VideoQuality>,
    pub is_hls: bool,
    /// Only playable inside the host's own player.
    pub requires_embedding: bool,
    /// Referer the media server expects on playback requests.
    pub referer: Option<String>,
    pub error: Option<String>,
}

impl StreamInfo {
    /// The embed URL handed back unchanged, without an error.
    pub fn passthrough(embed_url: &str, host: &str) -> Self {
        Self {
            embed_url: embed_url.to_string(),
            direct_url: embed_url.to_string(),
            host: host.to_string(),
            quality: None,
            qualities: Vec::new(),
            is_hls: false,
            requires_embedding: false,
            referer: None,
            error: None,
        }
    }

    /// The embed URL handed back unchanged, annotated with why.
    pub fn degraded(embed_url: &str, host: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::passthrough(embed_url, host)
        }
    }

    /// A successful resolution to `direct_url`; `.m3u8` URLs are flagged HLS.
    pub fn resolved(embed_url: &str, kind: HostKind, direct_url: &str) -> Self {
        Self {
            direct_url: direct_url.to_string(),
            is_hls: direct_url.contains(".m3u8"),
            ..Self::passthrough(embed_url, kind.id())
        }
    }

    /// Pick the best rendition; `None` if there is nothing usable.
    pub fn from_qualities(
        embed_url: &str,
        kind: HostKind,
        qualities: Vec<VideoQuality>,
    ) -> Option<Self> {
        let best = select_best(&qualities).filter(|q| !q.url.is_empty())?.clone();
        Some(Self {
            quality: Some(best.name),
            qualities,
            ..Self::resolved(embed_url, kind, &best.url)
        })
    }

    /// Whether playback must send [`referer`](Self::referer).
    #[must_use]
    pub const fn requires_referer(&self) -> bool {
        self.referer.is_some()
    }
}

/// Strategy for turning one host's embed URL into a media URL.
#[async_trait]
pub trait HostResolver: Send + Sync {
    fn kind(&self) -> HostKind;

    /// Check if this resolver handles the given (lower-cased) hostname.
    fn matches(&self, host: &str) -> bool {
        self.kind().matches(host)
    }

    /// Resolve `embed_url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the host's markup or API did not yield a media URL.
    async fn resolve(
        &self,
        embed_url: &str,
        fetcher: &HostFetcher,
        cancel: &CancellationToken,
    ) -> Result<StreamInfo, ResolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_matching_is_case_insensitive() {
        assert!(HostKind::OkRu.matches("OK.RU"));
        assert!(HostKind::OkRu.matches("www.ok.ru"));
        assert!(HostKind::YouTube.matches("youtu.be"));
        assert!(HostKind::DoodStream.matches("dood.watch"));
        assert!(!HostKind::Vimeo.matches("example.com"));
    }

    #[test]
    fn test_from_qualities_flags_hls() {
        let info = StreamInfo::from_qualities(
            "https://www.dailymotion.com/embed/video/x1",
            HostKind::Dailymotion,
            vec![
                VideoQuality::new("380", "https://cdn.example/380.mp4"),
                VideoQuality::new("auto", "https://cdn.example/master.m3u8"),
            ],
        )
        .unwrap();
        assert_eq!(info.quality.as_deref(), Some("auto"));
        assert!(info.is_hls);
        assert_eq!(info.qualities.len(), 2);
    }

    #[test]
    fn test_from_qualities_empty() {
        assert!(StreamInfo::from_qualities("u", HostKind::Vimeo, Vec::new()).is_none());
        assert!(StreamInfo::from_qualities(
            "u",
            HostKind::Vimeo,
            vec![VideoQuality::new("720p", "")]
        )
        .is_none());
    }

    #[test]
    fn test_degraded_keeps_embed() {
        let info = StreamInfo::degraded("https://mixdrop.co/e/x", "mixdrop", "not found");
        assert_eq!(info.direct_url, info.embed_url);
        assert_eq!(info.error.as_deref(), Some("not found"));
        assert!(!info.requires_referer());
    }
}
