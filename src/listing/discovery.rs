//! Ordered strategies for locating a post's embed URL.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::constants::{IFRAME_FETCH_TIMEOUT_MS, LOAD_VIDEO_IFRAME_ACTION};
use crate::embed::{extract_nonce, extract_post_id, find_in_iframes, find_in_script};

/// A fetched post page.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub url: String,
    pub html: String,
}

/// Request access to the protected origin, for strategies that need a follow-up call.
#[async_trait]
pub trait PageChannel: Send + Sync {
    /// Site AJAX endpoint.
    fn ajax_url(&self) -> String;

    /// POST a form-encoded body; `None` on any failure.
    async fn post_form(
        &self,
        url: &str,
        body: &str,
        max_timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Option<String>;
}

/// One way of finding an embed URL in a post page.
#[async_trait]
pub trait EmbedStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(
        &self,
        page: &PostPage,
        channel: &dyn PageChannel,
        cancel: &CancellationToken,
    ) -> Option<String>;
}

/// Player URL referenced in inline script or markup text.
pub struct InlineScriptScan;

#[async_trait]
impl EmbedStrategy for InlineScriptScan {
    fn name(&self) -> &'static str {
        "inline-script"
    }

    async fn attempt(
        &self,
        page: &PostPage,
        _channel: &dyn PageChannel,
        _cancel: &CancellationToken,
    ) -> Option<String> {
        find_in_script(&page.html)
    }
}

/// Iframe already present in the DOM.
pub struct IframeScan;

#[async_trait]
impl EmbedStrategy for IframeScan {
    fn name(&self) -> &'static str {
        "iframe"
    }

    async fn attempt(
        &self,
        page: &PostPage,
        _channel: &dyn PageChannel,
        _cancel: &CancellationToken,
    ) -> Option<String> {
        find_in_iframes(&page.html)
    }
}

/// Ask the site for the player iframe via the `load_video_iframe` AJAX action.
pub struct AjaxIframeRequest;

#[async_trait]
impl EmbedStrategy for AjaxIframeRequest {
    fn name(&self) -> &'static str {
        "ajax-iframe"
    }

    async fn attempt(
        &self,
        page: &PostPage,
        channel: &dyn PageChannel,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let Some(post_id) = extract_post_id(&page.html) else {
            debug!(url = %page.url, "No post id in page");
            return None;
        };
        let nonce = extract_nonce(&page.html).unwrap_or_default();
        debug!(url = %page.url, post_id = %post_id, "Requesting player iframe");

        let body = load_video_iframe_body(&post_id, &nonce);
        let html = channel
            .post_form(&channel.ajax_url(), &body, IFRAME_FETCH_TIMEOUT_MS, cancel)
            .await?;
        find_in_script(&html).or_else(|| find_in_iframes(&html))
    }
}

/// Strategies in priority order.
#[must_use]
pub fn default_strategies() -> Vec<Box<dyn EmbedStrategy>> {
    vec![
        Box::new(InlineScriptScan),
        Box::new(IframeScan),
        Box::new(AjaxIframeRequest),
    ]
}

/// First embed URL any strategy produces.
pub async fn discover_embed(
    strategies: &[Box<dyn EmbedStrategy>],
    page: &PostPage,
    channel: &dyn PageChannel,
    cancel: &CancellationToken,
) -> Option<String> {
    for strategy in strategies {
        if let Some(url) = strategy.attempt(page, channel, cancel).await {
            info!(strategy = strategy.name(), url = %url, "Found embed URL");
            return Some(url);
        }
        debug!(strategy = strategy.name(), page = %page.url, "Strategy found nothing");
    }
    info!(page = %page.url, "No embeddable player found");
    None
}

/// Form body for the `load_video_iframe` action.
#[must_use]
pub fn load_video_iframe_body(post_id: &str, nonce: &str) -> String {
    format!(
        "action={LOAD_VIDEO_IFRAME_ACTION}&post_id={}&_wpnonce={}",
        urlencoding::encode(post_id),
        urlencoding::encode(nonce)
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records form posts and answers with a canned body.
    struct CannedChannel {
        response: Option<String>,
        posted: Mutex<Vec<String>>,
    }

    impl CannedChannel {
        fn new(response: Option<&str>) -> Self {
            Self {
                response: response.map(str::to_string),
                posted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageChannel for CannedChannel {
        fn ajax_url(&self) -> String {
            "https://site.example/wp-admin/admin-ajax.php".to_string()
        }

        async fn post_form(
            &self,
            _url: &str,
            body: &str,
            _max_timeout_ms: u64,
            _cancel: &CancellationToken,
        ) -> Option<String> {
            self.posted.lock().unwrap().push(body.to_string());
            self.response.clone()
        }
    }

    fn page(html: &str) -> PostPage {
        PostPage {
            url: "https://site.example/douga/post/".to_string(),
            html: html.to_string(),
        }
    }

    #[tokio::test]
    async fn test_script_strategy_wins() {
        let channel = CannedChannel::new(None);
        let html = r#"<script>$('#player-embed').html('<iframe src="//ok.ru/videoembed/5">');</script>
                      <iframe src="https://vimeo.com/1"></iframe>"#;
        let url = discover_embed(
            &default_strategies(),
            &page(html),
            &channel,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(url.as_deref(), Some("https://ok.ru/videoembed/5"));
        assert!(channel.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ajax_strategy_posts_id_and_nonce() {
        let channel = CannedChannel::new(Some(
            r#"<iframe src="https://www.dailymotion.com/embed/video/x9"></iframe>"#,
        ));
        let html = r"<script>var postId = 321; var data = {_wpnonce: 'n0nce'};</script>";
        let url = discover_embed(
            &default_strategies(),
            &page(html),
            &channel,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(
            url.as_deref(),
            Some("https://www.dailymotion.com/embed/video/x9")
        );
        assert_eq!(
            channel.posted.lock().unwrap().as_slice(),
            ["action=load_video_iframe&post_id=321&_wpnonce=n0nce"]
        );
    }

    #[tokio::test]
    async fn test_no_post_id_no_request() {
        let channel = CannedChannel::new(Some("<iframe src=\"https://ok.ru/videoembed/1\">"));
        let url = discover_embed(
            &default_strategies(),
            &page("<p>text only</p>"),
            &channel,
            &CancellationToken::new(),
        )
        .await;
        assert!(url.is_none());
        assert!(channel.posted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_iframe_body_missing_nonce() {
        assert_eq!(
            load_video_iframe_body("7", ""),
            "action=load_video_iframe&post_id=7&_wpnonce="
        );
    }
}
