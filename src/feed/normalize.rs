//! Conversion of provider-specific items into [`FeedItem`].
//!
//! Both parsers hand their raw items to [`normalize_source`], which converts
//! each through [`IntoFeedItem`] and stamps provenance from the owning feed.
//! HTML bodies go through [`extract_content`] inside the conversion, so they
//! are extracted exactly once. Converting a [`FeedItem`] is the identity.

use feed_rs::model::{Entry, Link};

use super::extract::extract_content;
use super::jsonfeed::JsonFeedItem;
use super::types::{parse_loose_date, FeedItem, SourceFeed};

/// A parsed item that can be mapped into the canonical model.
pub trait IntoFeedItem {
    fn into_feed_item(self) -> FeedItem;
}

impl IntoFeedItem for FeedItem {
    fn into_feed_item(self) -> FeedItem {
        self
    }
}

impl IntoFeedItem for Entry {
    fn into_feed_item(self) -> FeedItem {
        let link = pick_link(&self.links);
        let published_at = self.published.or(self.updated);

        // Full-content extension (content:encoded / atom:content) beats the
        // description. An HTML description still counts as content.
        let summary_is_html = self
            .summary
            .as_ref()
            .is_some_and(|s| s.content_type.essence().to_string() == "text/html");
        let full_body = self.content.and_then(|c| c.body).filter(|b| !b.is_empty());

        let (content, plain_summary) = match (full_body, self.summary) {
            (Some(body), summary) => (Some(body), summary.map(|s| s.content)),
            (None, Some(summary)) if summary_is_html => (Some(summary.content), None),
            (None, summary) => (None, summary.map(|s| s.content)),
        };

        let author = self
            .authors
            .into_iter()
            .map(|p| p.name)
            .find(|name| !name.trim().is_empty());

        let categories = self
            .categories
            .into_iter()
            .map(|c| c.label.unwrap_or(c.term))
            .filter(|c| !c.trim().is_empty())
            .collect();

        let guid = Some(self.id).filter(|id| !id.trim().is_empty());

        FeedItem {
            title: self.title.map(|t| t.content),
            link,
            published_at,
            date_string: None,
            content: content.map(|c| extract_content(&c).into_owned()),
            plain_summary: plain_summary.filter(|s| !s.trim().is_empty()),
            author,
            guid,
            categories,
            source_feed_title: None,
            source_feed_url: None,
        }
    }
}

impl IntoFeedItem for JsonFeedItem {
    fn into_feed_item(self) -> FeedItem {
        let published_at = self.date_published.as_deref().and_then(parse_loose_date);
        let author = self
            .author
            .and_then(|a| a.name)
            .or_else(|| {
                self.authors
                    .into_iter()
                    .flatten()
                    .find_map(|a| a.name)
            })
            .filter(|name| !name.trim().is_empty());

        let content = self
            .content_html
            .filter(|html| !html.is_empty())
            .map(|html| extract_content(&html).into_owned());

        FeedItem {
            title: self.title,
            link: self.url.or(self.external_url),
            published_at,
            date_string: self.date_published,
            plain_summary: if content.is_none() {
                self.content_text.or(self.summary)
            } else {
                None
            },
            content,
            author,
            guid: self.id.map(|id| id.into_string()),
            categories: self.tags,
            source_feed_title: None,
            source_feed_url: None,
        }
    }
}

/// Normalizes a source's raw items and attaches provenance.
///
/// `feed_url` is the URL that was requested, which is what readers need to
/// trace an item back to its subscription.
pub fn normalize_source<I, T>(
    title: Option<String>,
    description: Option<String>,
    home_link: Option<String>,
    feed_url: &str,
    items: I,
) -> SourceFeed
where
    I: IntoIterator<Item = T>,
    T: IntoFeedItem,
{
    let items = items
        .into_iter()
        .map(|raw| {
            let mut item = raw.into_feed_item();
            item.source_feed_title = title.clone();
            item.source_feed_url = Some(feed_url.to_owned());
            item
        })
        .collect();

    SourceFeed {
        title,
        description,
        home_link,
        items,
    }
}

/// Picks the article link: the first `alternate` (or untyped) link, else the
/// first link of any kind.
fn pick_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
        .filter(|href| !href.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::jsonfeed::{JsonFeedAuthor, JsonFeedId};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_feed_item_normalization_is_identity() {
        let item = FeedItem {
            title: Some("Hello".into()),
            content: Some(r#"<div class="md"><p>kept as-is"#.into()),
            ..Default::default()
        };
        assert_eq!(item.clone().into_feed_item(), item);
    }

    #[test]
    fn test_json_item_maps_fields() {
        let raw = JsonFeedItem {
            id: Some(JsonFeedId::String("abc".into())),
            url: None,
            external_url: Some("https://example.com/ext".into()),
            title: Some("Title".into()),
            content_html: Some(r#"<table></table><div class="md"><p>Body"#.into()),
            content_text: Some("ignored".into()),
            summary: None,
            date_published: Some("2024-01-02T03:04:05+01:00".into()),
            author: Some(JsonFeedAuthor {
                name: Some("Ann".into()),
            }),
            authors: None,
            tags: vec!["rust".into()],
        };

        let item = raw.into_feed_item();
        assert_eq!(item.guid.as_deref(), Some("abc"));
        assert_eq!(item.link.as_deref(), Some("https://example.com/ext"));
        assert_eq!(item.content.as_deref(), Some("Body"));
        assert_eq!(item.plain_summary, None);
        assert_eq!(item.author.as_deref(), Some("Ann"));
        assert_eq!(item.categories, vec!["rust".to_string()]);
        assert_eq!(
            item.published_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 2, 4, 5).unwrap())
        );
        assert_eq!(item.date_string.as_deref(), Some("2024-01-02T03:04:05+01:00"));
    }

    #[test]
    fn test_json_item_text_only_uses_plain_summary() {
        let raw = JsonFeedItem {
            id: Some(JsonFeedId::Number(serde_json::Number::from(7u64))),
            url: Some("https://example.com/7".into()),
            external_url: None,
            title: None,
            content_html: None,
            content_text: None,
            summary: Some("Just text".into()),
            date_published: None,
            author: None,
            authors: Some(vec![JsonFeedAuthor {
                name: Some("Multi".into()),
            }]),
            tags: Vec::new(),
        };

        let item = raw.into_feed_item();
        assert_eq!(item.guid.as_deref(), Some("7"));
        assert_eq!(item.content, None);
        assert_eq!(item.plain_summary.as_deref(), Some("Just text"));
        assert_eq!(item.author.as_deref(), Some("Multi"));
    }

    #[test]
    fn test_normalize_source_stamps_provenance() {
        let source = normalize_source(
            Some("Blog".into()),
            None,
            None,
            "https://blog.example.com/feed",
            vec![FeedItem::default(), FeedItem::default()],
        );
        assert_eq!(source.items.len(), 2);
        for item in &source.items {
            assert_eq!(item.source_feed_title.as_deref(), Some("Blog"));
            assert_eq!(
                item.source_feed_url.as_deref(),
                Some("https://blog.example.com/feed")
            );
        }
    }
}
