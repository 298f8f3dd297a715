//! JSON Feed (https://jsonfeed.org) wire model.
//!
//! Only the fields the merger consumes are modeled; everything else in the
//! document is ignored by serde. Text fields and `tags` holding the wrong JSON
//! type read as absent instead of failing the whole document.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::normalize::normalize_source;
use super::types::SourceFeed;

/// Substring present in every JSON Feed `version` URI
/// (`https://jsonfeed.org/version/1`, `.../1.1`).
pub const JSON_FEED_VERSION_MARKER: &str = "jsonfeed.org/version/";

#[derive(Debug, Clone, Deserialize)]
pub struct JsonFeed {
    pub version: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub home_page_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<JsonFeedItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonFeedItem {
    pub id: Option<JsonFeedId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub external_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content_html: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_published: Option<String>,
    /// JSON Feed 1.0 single author.
    pub author: Option<JsonFeedAuthor>,
    /// JSON Feed 1.1 author list.
    pub authors: Option<Vec<JsonFeedAuthor>>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonFeedAuthor {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Keeps the string entries of a `tags` array; anything else is no tags.
fn lenient_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// JSON Feed ids are strings, but numeric ids are common in practice.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonFeedId {
    String(String),
    Number(serde_json::Number),
}

impl JsonFeedId {
    pub fn into_string(self) -> String {
        match self {
            JsonFeedId::String(s) => s,
            JsonFeedId::Number(n) => n.to_string(),
        }
    }
}

/// Just enough structure to read `version` without committing to the rest.
#[derive(Deserialize)]
struct VersionField {
    version: Option<String>,
}

/// Returns true if `bytes` is a JSON object whose `version` names JSON Feed.
///
/// Any parse failure is a plain `false`.
pub fn has_json_feed_version(bytes: &[u8]) -> bool {
    serde_json::from_slice::<VersionField>(bytes)
        .ok()
        .and_then(|doc| doc.version)
        .is_some_and(|v| v.contains(JSON_FEED_VERSION_MARKER))
}

/// Parses a JSON Feed document into a [`SourceFeed`].
pub fn parse_json_feed(bytes: &[u8], feed_url: &str) -> Result<SourceFeed, serde_json::Error> {
    let feed: JsonFeed = serde_json::from_slice(bytes)?;
    Ok(normalize_source(
        feed.title,
        feed.description,
        feed.home_page_url,
        feed_url,
        feed.items,
    ))
}
