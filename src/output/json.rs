use serde::Serialize;

use super::anchor_title;
use crate::feed::{FeedItem, MergedFeed};

/// `version` of every document this renderer produces.
pub const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";

#[derive(Serialize)]
struct Document<'a> {
    version: &'static str,
    title: &'a str,
    description: &'a str,
    home_page_url: &'a str,
    feed_url: &'a str,
    items: Vec<Entry<'a>>,
}

#[derive(Serialize)]
struct Entry<'a> {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_html: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<Author<'a>>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tags: &'a [String],
    /// Provenance extension (JSON Feed reserves `_`-prefixed keys for these).
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    source: Option<Source<'a>>,
}

#[derive(Serialize)]
struct Author<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct Source<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

/// Renders a merged feed as a JSON Feed 1.1 document.
///
/// `date_published` prefers the parsed instant (RFC 3339, UTC) and falls
/// back to the source's own date string; the RSS renderer prefers them the
/// other way round.
pub fn render_json_feed(feed: &MergedFeed) -> Result<String, serde_json::Error> {
    let document = Document {
        version: JSON_FEED_VERSION,
        title: &feed.title,
        description: &feed.description,
        home_page_url: &feed.link,
        feed_url: &feed.link,
        items: feed.items.iter().map(entry).collect(),
    };
    serde_json::to_string_pretty(&document)
}

fn entry(item: &FeedItem) -> Entry<'_> {
    let id = item
        .id()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("urn:uuid:{}", uuid::Uuid::new_v4()));

    let date_published = item
        .published_at
        .map(|dt| dt.to_rfc3339())
        .or_else(|| item.date_string.clone());

    Entry {
        id,
        url: item.link.as_deref(),
        title: anchor_title(item),
        content_html: item.content.as_deref(),
        content_text: match item.content {
            Some(_) => None,
            None => item.plain_summary.as_deref(),
        },
        date_published,
        author: item.author.as_deref().map(|name| Author { name }),
        tags: &item.categories,
        source: item.source_feed_url.as_deref().map(|url| Source {
            url,
            title: item.source_feed_title.as_deref(),
        }),
    }
}
