//! Resolution of third-party embed URLs to playable media URLs.
//!
//! Dispatch is by hostname substring. Unknown hosts and failed resolutions
//! both hand the embed URL back, the latter with an error note.

mod error;
mod fetch;
mod quality;
mod registry;
mod traits;

// Host resolvers
pub mod dailymotion;
pub mod doodstream;
pub mod mixdrop;
pub mod okru;
pub mod streamtape;
pub mod vimeo;
pub mod youtube;

pub use error::ResolveError;
pub use fetch::HostFetcher;
pub use quality::{quality_priority, select_best};
pub use registry::ResolverRegistry;
pub use traits::{HostKind, HostResolver, StreamInfo, VideoQuality};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Resolves embed URLs through a [`ResolverRegistry`].
pub struct VideoResolver {
    registry: ResolverRegistry,
    fetcher: HostFetcher,
}

impl VideoResolver {
    /// Create a resolver over `registry`, fetching through `fetcher`.
    #[must_use]
    pub fn new(registry: ResolverRegistry, fetcher: HostFetcher) -> Self {
        Self { registry, fetcher }
    }

    /// Resolver for every built-in host.
    #[must_use]
    pub fn with_defaults(fetcher: HostFetcher) -> Self {
        Self::new(ResolverRegistry::with_defaults(), fetcher)
    }

    /// Resolve `embed_url`. Never fails; see [`StreamInfo::error`].
    pub async fn resolve(&self, embed_url: &str, cancel: &CancellationToken) -> StreamInfo {
        let embed_url = embed_url.trim();
        let Some(host) = host_of(embed_url) else {
            warn!(url = %embed_url, "Embed URL has no host");
            return StreamInfo::degraded(embed_url, "", "embed URL has no host");
        };

        let Some(resolver) = self.registry.find(&host) else {
            debug!(host = %host, "No resolver for host, passing embed through");
            return StreamInfo::passthrough(embed_url, &host);
        };

        let kind = resolver.kind();
        match resolver.resolve(embed_url, &self.fetcher, cancel).await {
            Ok(info) => {
                info!(
                    host = kind.id(),
                    quality = ?info.quality,
                    hls = info.is_hls,
                    "Resolved embed URL"
                );
                info
            }
            Err(e) => {
                warn!(host = kind.id(), url = %embed_url, error = %e, "Resolution failed, passing embed through");
                StreamInfo::degraded(embed_url, kind.id(), e.to_string())
            }
        }
    }
}

/// Lower-cased hostname of `url`; protocol-relative and scheme-less forms are accepted.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    let url = url.trim();
    let candidate = if url.starts_with("//") {
        format!("https:{url}")
    } else if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    Url::parse(&candidate)
        .ok()?
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://OK.RU/videoembed/1").as_deref(), Some("ok.ru"));
        assert_eq!(host_of("//www.ok.ru/videoembed/1").as_deref(), Some("www.ok.ru"));
        assert_eq!(host_of("ok.ru/videoembed/123").as_deref(), Some("ok.ru"));
        assert_eq!(host_of(""), None);
    }

    #[tokio::test]
    async fn test_unknown_host_passes_through() {
        let resolver =
            VideoResolver::with_defaults(HostFetcher::new(std::time::Duration::from_secs(1)).unwrap());
        let info = resolver
            .resolve("https://player.unknown.example/e/1", &CancellationToken::new())
            .await;
        assert_eq!(info.direct_url, info.embed_url);
        assert_eq!(info.host, "player.unknown.example");
        assert!(info.error.is_none());
    }

    #[tokio::test]
    async fn test_unparsable_ok_ru_url_degrades() {
        let resolver =
            VideoResolver::with_defaults(HostFetcher::new(std::time::Duration::from_secs(1)).unwrap());
        let info = resolver
            .resolve("https://ok.ru/profile/abc", &CancellationToken::new())
            .await;
        assert_eq!(info.direct_url, "https://ok.ru/profile/abc");
        assert_eq!(info.host, "ok.ru");
        assert_eq!(info.error.as_deref(), Some("ok.ru video id not found"));
    }
}
