//! Rendering of a [`MergedFeed`] as RSS 2.0 or JSON Feed 1.1.
//!
//! Both renderers wrap linked titles in an anchor ([`anchor_title`]) and
//! carry HTML bodies verbatim. Everything else is escaped according to the
//! target format.

mod json;
mod rss;

pub use json::render_json_feed;
pub use rss::render_rss;

use chrono::{DateTime, Utc};
use quick_xml::escape::escape;

use crate::feed::{FeedItem, MergedFeed};

/// Value of the RSS `<generator>` element.
pub const GENERATOR: &str = concat!("feedmerge/", env!("CARGO_PKG_VERSION"));

/// Output document format, chosen by the `format` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Rss,
    JsonFeed,
}

impl OutputFormat {
    /// `json` and `jsonfeed` select JSON Feed; anything else, including no
    /// parameter at all, selects RSS.
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            Some(p) if p.eq_ignore_ascii_case("json") || p.eq_ignore_ascii_case("jsonfeed") => {
                OutputFormat::JsonFeed
            }
            _ => OutputFormat::Rss,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Rss => "application/rss+xml; charset=utf-8",
            OutputFormat::JsonFeed => "application/feed+json; charset=utf-8",
        }
    }

    /// Renders `feed`; `built_at` becomes the RSS build date.
    pub fn render(self, feed: &MergedFeed, built_at: DateTime<Utc>) -> anyhow::Result<String> {
        match self {
            OutputFormat::Rss => render_rss(feed, built_at),
            OutputFormat::JsonFeed => Ok(render_json_feed(feed)?),
        }
    }
}

/// Title as shown by both renderers.
///
/// With a link: `<a href="LINK">TITLE</a>`, the title text carried verbatim
/// (the link text falls back to the URL when there is no title). Without a
/// link: the bare title.
pub fn anchor_title(item: &FeedItem) -> Option<String> {
    match (item.link.as_deref(), item.title.as_deref()) {
        (Some(link), title) if !link.is_empty() => Some(format!(
            "<a href=\"{}\">{}</a>",
            escape(link),
            title.unwrap_or(link)
        )),
        (_, title) => title.map(str::to_owned),
    }
}
