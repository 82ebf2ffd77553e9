//! Listing orchestration against the protected site.
//!
//! Bring-up picks one of three modes once per process: route through the
//! bypass session, fetch directly, or give up and return nothing.

mod discovery;
mod parser;

pub use discovery::{
    default_strategies, discover_embed, load_video_iframe_body, AjaxIframeRequest,
    EmbedStrategy, IframeScan, InlineScriptScan, PageChannel, PostPage,
};
pub use parser::parse_articles;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::bypass::{cancellable, is_challenge, BypassSession, FetchError, Page};
use crate::config::Config;
use crate::constants::{
    ACCEPT_HTML_BROWSER, ACCEPT_LANGUAGE, LOAD_MORE_ACTION, MOBILE_USER_AGENT,
    PAGE_FETCH_TIMEOUT_MS,
};
use crate::resolvers::{HostFetcher, StreamInfo, VideoResolver};

/// One listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    /// Last path segment of the page URL, or `video_{index}`.
    pub id: String,
    pub thumbnail_url: String,
    pub original_title: String,
    /// Filled in later by translation; empty when parsed.
    pub romanized_title: String,
    /// Filled in later by translation; empty when parsed.
    pub localized_title: String,
    pub page_url: String,
}

/// How requests to the site are issued, decided once at bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Through the bypass session (solver, or its cookie-carrying direct channel).
    Solver,
    /// Plain requests; the site is not challenging us.
    Direct,
    /// Blocked with no solver: every call returns nothing.
    Degraded,
}

/// Entry point for listing posts and resolving their players.
pub struct SiteScraper {
    config: Config,
    base_url: Url,
    session: Arc<BypassSession>,
    direct: reqwest::Client,
    resolver: VideoResolver,
    strategies: Vec<Box<dyn EmbedStrategy>>,
    mode: OnceCell<SessionMode>,
}

impl SiteScraper {
    /// Build a scraper with its own bypass session and the default resolvers.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or an HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, FetchError> {
        let session = Arc::new(BypassSession::from_config(&config)?);
        let mut fetcher = HostFetcher::new(config.request_timeout)?;
        if let Some(host) = Url::parse(&config.site_base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
        {
            fetcher = fetcher.with_session(Arc::clone(&session), &host);
        }
        Self::with_parts(config, session, VideoResolver::with_defaults(fetcher))
    }

    /// Build a scraper around an existing session and resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the direct client cannot be built.
    pub fn with_parts(
        config: Config,
        session: Arc<BypassSession>,
        resolver: VideoResolver,
    ) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.site_base_url)
            .map_err(|e| FetchError::invalid_url(&config.site_base_url, e))?;
        let direct = direct_client(&config)?;

        Ok(Self {
            config,
            base_url,
            session,
            direct,
            resolver,
            strategies: default_strategies(),
            mode: OnceCell::new(),
        })
    }

    /// Bypass session shared with the resolvers.
    #[must_use]
    pub fn session(&self) -> &Arc<BypassSession> {
        &self.session
    }

    /// Mode chosen at bring-up, if bring-up has run.
    #[must_use]
    pub fn mode(&self) -> Option<SessionMode> {
        self.mode.get().copied()
    }

    /// Listing root, `{base}/{category}`.
    #[must_use]
    pub fn listing_url(&self) -> String {
        self.config.listing_url()
    }

    /// Run bring-up if it has not completed yet. Concurrent callers share one run.
    ///
    /// A cancelled bring-up is not remembered; the next call tries again.
    pub async fn ensure_session(&self, cancel: &CancellationToken) -> Option<SessionMode> {
        match self
            .mode
            .get_or_try_init(|| self.bring_up(cancel))
            .await
        {
            Ok(mode) => Some(*mode),
            Err(e) => {
                debug!(error = %e, "Session bring-up interrupted");
                None
            }
        }
    }

    async fn bring_up(&self, cancel: &CancellationToken) -> Result<SessionMode, FetchError> {
        info!(site = %self.config.site_base_url, "Initializing scraping session");

        if self.session.configure(None).await {
            info!("Solver available, routing through bypass session");
            if !self
                .session
                .acquire_cookies(&self.config.site_base_url, cancel)
                .await
            {
                warn!(
                    error = ?self.session.last_error(),
                    "Initial cookie acquisition failed, requests will go through the solver"
                );
            }
            return Ok(SessionMode::Solver);
        }

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let listing_url = self.listing_url();
        info!(url = %listing_url, "Solver unavailable, trying direct connection");
        let mode = match self.direct_request(&listing_url, None, cancel).await {
            Ok(page) if !page.is_success() => {
                warn!(status = page.status, "Direct connection refused, degraded mode");
                SessionMode::Degraded
            }
            Ok(page) if is_challenge(&page.body) => {
                warn!("Challenge page served to direct connection, degraded mode");
                SessionMode::Degraded
            }
            Ok(_) => {
                info!("Direct connection works");
                SessionMode::Direct
            }
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Direct connection failed, degraded mode");
                SessionMode::Degraded
            }
        };
        Ok(mode)
    }

    /// Fetch one listing page. `page` is 1-based; at most `page_size` posts are returned.
    ///
    /// Returns an empty list when blocked or on any fetch failure.
    pub async fn get_videos(
        &self,
        page: u32,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> Vec<PostSummary> {
        match self.ensure_session(cancel).await {
            Some(SessionMode::Degraded) => {
                info!(page, "Degraded mode, no listing available");
                return Vec::new();
            }
            None => return Vec::new(),
            Some(_) => {}
        }

        let body = load_more_body(
            page.saturating_sub(1),
            &self.config.listing_template,
            &self.config.category,
        );
        let Some(html) = self
            .post_form(&self.config.ajax_url(), &body, PAGE_FETCH_TIMEOUT_MS, cancel)
            .await
        else {
            return Vec::new();
        };

        let mut posts = parse_articles(&html, &self.base_url);
        posts.truncate(page_size);
        if posts.is_empty() {
            info!(page, "No posts parsed from listing");
        } else {
            info!(page, count = posts.len(), "Fetched listing page");
        }
        posts
    }

    /// Find the embed URL on a post page.
    pub async fn find_embed_url(&self, page_url: &str, cancel: &CancellationToken) -> Option<String> {
        match self.ensure_session(cancel).await? {
            SessionMode::Degraded => return None,
            SessionMode::Solver | SessionMode::Direct => {}
        }

        let html = self.fetch_page(page_url, cancel).await?;
        let page = PostPage {
            url: page_url.to_string(),
            html,
        };
        discover_embed(&self.strategies, &page, self, cancel).await
    }

    /// Find a post's embed URL and resolve it to a stream.
    pub async fn resolve_post(
        &self,
        page_url: &str,
        cancel: &CancellationToken,
    ) -> Option<StreamInfo> {
        let embed_url = self.find_embed_url(page_url, cancel).await?;
        Some(self.resolver.resolve(&embed_url, cancel).await)
    }

    /// Direct media URL for a post, or the embed URL when it could not be resolved further.
    pub async fn extract_video_url(
        &self,
        page_url: &str,
        cancel: &CancellationToken,
    ) -> Option<String> {
        self.resolve_post(page_url, cancel)
            .await
            .map(|info| info.direct_url)
    }

    /// Resolve an embed URL without visiting a post page.
    pub async fn resolve_embed(&self, embed_url: &str, cancel: &CancellationToken) -> StreamInfo {
        self.resolver.resolve(embed_url, cancel).await
    }

    async fn fetch_page(&self, url: &str, cancel: &CancellationToken) -> Option<String> {
        match self.mode.get()? {
            SessionMode::Solver => {
                let page = self.session.get(url, PAGE_FETCH_TIMEOUT_MS, cancel).await;
                if page.is_none() {
                    warn!(url = %url, error = ?self.session.last_error(), "Page fetch failed");
                }
                page.map(|page| page.body)
            }
            SessionMode::Direct => self.direct_body(url, None, cancel).await,
            SessionMode::Degraded => None,
        }
    }

    async fn direct_body(
        &self,
        url: &str,
        form: Option<&str>,
        cancel: &CancellationToken,
    ) -> Option<String> {
        match self.direct_request(url, form, cancel).await {
            Ok(page) if page.is_success() => Some(page.body),
            Ok(page) => {
                warn!(url = %url, status = page.status, "Direct request rejected");
                None
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Direct request failed");
                None
            }
        }
    }

    async fn direct_request(
        &self,
        url: &str,
        form: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Page, FetchError> {
        cancellable(cancel, async {
            let request = match form {
                None => self.direct.get(url),
                Some(body) => self
                    .direct
                    .post(url)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header("X-Requested-With", "XMLHttpRequest")
                    .header(header::ORIGIN, &self.config.site_base_url)
                    .body(body.to_string()),
            };
            Page::read(request.send().await?).await
        })
        .await
    }
}

#[async_trait]
impl PageChannel for SiteScraper {
    fn ajax_url(&self) -> String {
        self.config.ajax_url()
    }

    async fn post_form(
        &self,
        url: &str,
        body: &str,
        max_timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Option<String> {
        match self.mode.get()? {
            SessionMode::Solver => {
                let page = self.session.post(url, body, max_timeout_ms, cancel).await;
                if page.is_none() {
                    warn!(url = %url, error = ?self.session.last_error(), "Form post failed");
                }
                page.map(|page| page.body)
            }
            SessionMode::Direct => self.direct_body(url, Some(body), cancel).await,
            SessionMode::Degraded => None,
        }
    }
}

/// Unauthenticated client used when no solver is available.
fn direct_client(config: &Config) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_HTML_BROWSER));
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));
    if let Ok(referer) = HeaderValue::from_str(&config.site_base_url) {
        headers.insert(header::REFERER, referer);
    }

    Ok(reqwest::Client::builder()
        .user_agent(MOBILE_USER_AGENT)
        .default_headers(headers)
        .cookie_store(true)
        .gzip(true)
        .timeout(config.request_timeout)
        .build()?)
}

/// Form body for the `load_more` action; `page_index` is zero-based.
#[must_use]
pub fn load_more_body(page_index: u32, template: &str, category: &str) -> String {
    format!(
        "action={LOAD_MORE_ACTION}&page={page_index}&template={}&vars%5Bcategory_name%5D={}&id_playlist=",
        urlencoding::encode(template),
        urlencoding::encode(category)
    )
}
