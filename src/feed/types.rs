use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

// ============================================================================
// Canonical Item Model
// ============================================================================

/// A single entry in the merged output, independent of the source format.
///
/// Every field is optional: feeds in the wild omit almost anything. An item
/// with neither `content` nor `plain_summary` renders without a body; an
/// item with neither `title` nor `link` still renders (with an empty title).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Machine-parsed publication instant. Takes priority over `date_string`
    /// when ordering.
    pub published_at: Option<DateTime<Utc>>,
    /// Publication date exactly as the source wrote it.
    pub date_string: Option<String>,
    /// HTML body, already passed through the content extractor.
    pub content: Option<String>,
    /// Plain-text body, used only when `content` is absent.
    pub plain_summary: Option<String>,
    pub author: Option<String>,
    /// Stable identifier from the source. Falls back to `link` when rendering.
    pub guid: Option<String>,
    pub categories: Vec<String>,
    pub source_feed_title: Option<String>,
    pub source_feed_url: Option<String>,
}

impl FeedItem {
    /// Timestamp used for ordering.
    ///
    /// Prefers `published_at`, then a best-effort parse of `date_string`.
    /// Items with neither sort as the Unix epoch so they land after every
    /// dated item.
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.published_at
            .or_else(|| self.date_string.as_deref().and_then(parse_loose_date))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Identifier used by renderers: `guid`, falling back to `link`.
    pub fn id(&self) -> Option<&str> {
        self.guid
            .as_deref()
            .filter(|g| !g.is_empty())
            .or_else(|| self.link.as_deref().filter(|l| !l.is_empty()))
    }
}

/// Parses a date string in any of the formats commonly seen in feeds.
///
/// Accepts RFC 3339, RFC 2822, and bare `YYYY-MM-DD[ HH:MM[:SS]]` forms
/// (interpreted as UTC). Returns `None` for anything else.
pub fn parse_loose_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Per-Source Results
// ============================================================================

/// One successfully fetched and parsed source.
#[derive(Debug, Clone, Default)]
pub struct SourceFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub home_link: Option<String>,
    pub items: Vec<FeedItem>,
}

/// Result of fetching one requested URL. Exactly one per input URL.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(SourceFeed),
    Failure { url: String, message: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

// ============================================================================
// Aggregated Result
// ============================================================================

/// Title of every merged feed.
pub const MERGED_FEED_TITLE: &str = "Merged Feed";

/// The per-request aggregate handed to the output renderers.
#[derive(Debug, Clone)]
pub struct MergedFeed {
    pub title: String,
    pub description: String,
    /// Canonical URL of the request that produced this feed.
    pub link: String,
    /// Error items first, then successes newest-first, capped.
    pub items: Vec<FeedItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_effective_timestamp_prefers_instant() {
        let item = FeedItem {
            published_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            date_string: Some("Mon, 01 Jan 2001 00:00:00 GMT".into()),
            ..Default::default()
        };
        assert_eq!(
            item.effective_timestamp(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_effective_timestamp_falls_back_to_string() {
        let item = FeedItem {
            date_string: Some("Tue, 10 Jun 2003 04:00:00 GMT".into()),
            ..Default::default()
        };
        assert_eq!(
            item.effective_timestamp(),
            Utc.with_ymd_and_hms(2003, 6, 10, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_effective_timestamp_undated_is_epoch() {
        assert_eq!(
            FeedItem::default().effective_timestamp(),
            DateTime::<Utc>::UNIX_EPOCH
        );

        let garbage = FeedItem {
            date_string: Some("sometime last week".into()),
            ..Default::default()
        };
        assert_eq!(garbage.effective_timestamp(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_parse_loose_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        assert_eq!(parse_loose_date("2024-03-09T08:30:00Z"), Some(expected));
        assert_eq!(parse_loose_date("2024-03-09T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_loose_date("Sat, 09 Mar 2024 08:30:00 +0000"), Some(expected));
        assert_eq!(parse_loose_date("2024-03-09 08:30"), Some(expected));
        assert_eq!(
            parse_loose_date("2024-03-09"),
            Some(Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_loose_date("   "), None);
    }

    #[test]
    fn test_id_falls_back_to_link() {
        let item = FeedItem {
            guid: Some(String::new()),
            link: Some("https://example.com/a".into()),
            ..Default::default()
        };
        assert_eq!(item.id(), Some("https://example.com/a"));
        assert_eq!(FeedItem::default().id(), None);
    }
}
