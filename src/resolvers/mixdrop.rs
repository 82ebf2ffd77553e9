use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::error::ResolveError;
use super::fetch::HostFetcher;
use super::traits::{HostKind, HostResolver, StreamInfo};

static WURL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"MDCore\.wurl\s*=\s*"([^"]+)""#).unwrap());

/// Best effort: only handles pages that expose `MDCore.wurl` unpacked.
pub struct MixdropResolver;

impl MixdropResolver {
    /// Create the resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for MixdropResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostResolver for MixdropResolver {
    fn kind(&self) -> HostKind {
        HostKind::Mixdrop
    }

    async fn resolve(
        &self,
        embed_url: &str,
        fetcher: &HostFetcher,
        cancel: &CancellationToken,
    ) -> Result<StreamInfo, ResolveError> {
        let html = fetcher.get_text(embed_url, None, cancel).await?;
        let direct_url = decode_wurl(&html).ok_or(ResolveError::NotFound("mixdrop wurl"))?;
        Ok(StreamInfo::resolved(embed_url, self.kind(), &direct_url))
    }
}

/// Media URL from the page's `MDCore.wurl` assignment.
#[must_use]
pub fn decode_wurl(html: &str) -> Option<String> {
    let raw = WURL.captures(html)?[1].replace('\\', "");
    if raw.starts_with("http") {
        Some(raw)
    } else {
        Some(format!("https:{raw}"))
    }
}
