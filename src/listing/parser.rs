use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::PostSummary;

static ARTICLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article").unwrap());

static THUMBNAIL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.picture-content img").unwrap());

static TITLE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3.cactus-post-title a").unwrap());

static HEADING_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3 a").unwrap());

/// Parse every `article` block of a listing fragment.
///
/// Articles without a title or link are dropped; an article that fails to
/// parse is logged and skipped.
#[must_use]
pub fn parse_articles(html: &str, base: &Url) -> Vec<PostSummary> {
    let document = Html::parse_document(html);
    let mut posts = Vec::new();

    for (index, article) in document.select(&ARTICLE).enumerate() {
        match parse_article(article, index, base) {
            Ok(Some(post)) => posts.push(post),
            Ok(None) => debug!(index, "Dropped article without title or link"),
            Err(e) => warn!(index, error = %e, "Failed to parse article"),
        }
    }

    posts
}

fn parse_article(
    article: ElementRef<'_>,
    index: usize,
    base: &Url,
) -> Result<Option<PostSummary>, url::ParseError> {
    let thumbnail_url = article
        .select(&THUMBNAIL)
        .next()
        .and_then(|img| {
            let img = img.value();
            img.attr("data-src")
                .filter(|src| !src.trim().is_empty())
                .or_else(|| img.attr("src"))
        })
        .unwrap_or_default()
        .trim()
        .to_string();

    let Some(anchor) = article
        .select(&TITLE_LINK)
        .next()
        .or_else(|| article.select(&HEADING_LINK).next())
    else {
        return Ok(None);
    };

    let title = anchor.text().collect::<String>().trim().to_string();
    let href = anchor.value().attr("href").unwrap_or_default().trim();
    if title.is_empty() || href.is_empty() {
        return Ok(None);
    }

    let page_url = base.join(href)?;
    let id = id_from_url(&page_url).unwrap_or_else(|| format!("video_{index}"));

    Ok(Some(PostSummary {
        id,
        thumbnail_url,
        original_title: title,
        romanized_title: String::new(),
        localized_title: String::new(),
        page_url: page_url.to_string(),
    }))
}

/// Last non-empty path segment, e.g. `/douga/some-post/` gives `some-post`.
fn id_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}
