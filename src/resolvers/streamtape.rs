use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::error::ResolveError;
use super::fetch::HostFetcher;
use super::traits::{HostKind, HostResolver, StreamInfo};

/// `getElementById('robotlink').innerHTML = '//host/get_video?id=' + ('xyz&token=..')`
static ROBOTLINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"getElementById\('robotlink'\)\.innerHTML\s*=\s*'([^']+)'\s*\+\s*\('([^']+)'\)")
        .unwrap()
});

pub struct StreamtapeResolver;

impl StreamtapeResolver {
    /// Create the resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for StreamtapeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostResolver for StreamtapeResolver {
    fn kind(&self) -> HostKind {
        HostKind::Streamtape
    }

    async fn resolve(
        &self,
        embed_url: &str,
        fetcher: &HostFetcher,
        cancel: &CancellationToken,
    ) -> Result<StreamInfo, ResolveError> {
        let html = fetcher.get_text(embed_url, None, cancel).await?;
        let direct_url = decode_robotlink(&html).ok_or(ResolveError::NotFound("streamtape link"))?;
        Ok(StreamInfo::resolved(embed_url, self.kind(), &direct_url))
    }
}

/// Rebuild the link the page's script assembles: the first fragment plus the
/// second with its three-character decoy prefix dropped.
#[must_use]
pub fn decode_robotlink(html: &str) -> Option<String> {
    let caps = ROBOTLINK.captures(html)?;
    let second = &caps[2];
    let start = second
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(second.len()))
        .nth(3)?;
    Some(format!("https:{}{}", &caps[1], &second[start..]))
}
