use std::sync::Arc;
use std::time::Duration;

use reqwest::header;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::error::ResolveError;
use crate::bypass::{cancellable, BypassSession, FetchError};
use crate::constants::{DESKTOP_USER_AGENT, PAGE_FETCH_TIMEOUT_MS};

/// HTTP access for host resolvers.
///
/// Requests go through a plain client with a desktop user agent, except for
/// hosts under the protected domain while the session holds cookies.
pub struct HostFetcher {
    client: reqwest::Client,
    session: Option<(Arc<BypassSession>, String)>,
}

impl HostFetcher {
    /// Create a fetcher without session routing.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            session: None,
        })
    }

    /// Route requests for `protected_host` and its subdomains through `session`.
    #[must_use]
    pub fn with_session(mut self, session: Arc<BypassSession>, protected_host: &str) -> Self {
        self.session = Some((session, protected_host.to_lowercase()));
        self
    }

    fn session_for(&self, url: &str) -> Option<&BypassSession> {
        let (session, protected) = self.session.as_ref()?;
        let host = Url::parse(url).ok()?.host_str()?.to_lowercase();
        let shares_domain = host == *protected || host.ends_with(&format!(".{protected}"));
        (shares_domain && session.has_direct_channel()).then_some(&**session)
    }

    /// GET `url` as text, optionally sending a `Referer`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, cancellation or a non-success status.
    pub async fn get_text(
        &self,
        url: &str,
        referer: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        if let Some(session) = self.session_for(url) {
            debug!(url = %url, "Resolver fetch through bypass session");
            return session
                .try_get(url, PAGE_FETCH_TIMEOUT_MS, cancel)
                .await
                .map(|page| page.body);
        }

        cancellable(cancel, async {
            let mut request = self.client.get(url);
            if let Some(referer) = referer {
                request = request.header(header::REFERER, referer);
            }
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            Ok(response.text().await?)
        })
        .await
    }

    /// GET `url` and parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the body is not valid JSON for `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T, ResolveError> {
        let body = self.get_text(url, None, cancel).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
