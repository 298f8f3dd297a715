//! The aggregation engine.
//!
//! [`aggregate`] fans out one fetch per URL, waits for every fetch to settle,
//! and folds the outcomes into a [`MergedFeed`]:
//!
//! 1. failures become synthesized error items, in input order
//! 2. successful items are sorted newest-first by effective timestamp
//! 3. error items lead, then successes, truncated to the item cap
//!
//! Fetches never abort each other. A failed source costs only its own items.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use quick_xml::escape::escape;
use std::cmp::Reverse;

use crate::feed::{fetch_source, FeedItem, FetchOptions, FetchOutcome, MergedFeed, MERGED_FEED_TITLE};

/// Default cap on items in a merged feed.
pub const MAX_ITEMS: usize = 100;
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

/// Title prefix of synthesized error items.
pub const ERROR_TITLE_PREFIX: &str = "⚠️ Failed to load feed: ";
/// GUID scheme of synthesized error items; never produced by real feeds.
pub const ERROR_GUID_PREFIX: &str = "feedmerge-error:";

/// Knobs for one aggregation run.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub fetch: FetchOptions,
    /// Upper bound on in-flight fetches.
    pub max_concurrent_fetches: usize,
    pub max_items: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            max_items: MAX_ITEMS,
        }
    }
}

/// Fetches every URL and merges the results.
///
/// Always returns a feed: an empty or all-failing input yields a feed made
/// of error items (or no items at all). `self_url` becomes the feed's link.
pub async fn aggregate(
    client: &reqwest::Client,
    urls: &[String],
    self_url: &str,
    options: &AggregateOptions,
) -> MergedFeed {
    let outcomes = fetch_all(client, urls, options).await;
    let merged = merge_outcomes(outcomes, self_url, options.max_items, Utc::now());

    tracing::info!(
        sources = urls.len(),
        items = merged.items.len(),
        "Merged feed built"
    );
    merged
}

/// Fetches every URL concurrently and returns one outcome per URL, in input
/// order.
///
/// At most `max_concurrent_fetches` requests are in flight at once. The join
/// waits for all of them; no outcome short-circuits the others.
pub async fn fetch_all(
    client: &reqwest::Client,
    urls: &[String],
    options: &AggregateOptions,
) -> Vec<FetchOutcome> {
    if urls.is_empty() {
        return Vec::new();
    }

    let mut indexed: Vec<(usize, FetchOutcome)> = stream::iter(urls.iter().cloned().enumerate())
        .map(|(index, url)| async move {
            (index, fetch_source(client, &url, &options.fetch).await)
        })
        .buffer_unordered(options.max_concurrent_fetches.max(1))
        .collect()
        .await;

    // Completion order is arbitrary; restore input order.
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Folds settled outcomes into a [`MergedFeed`].
///
/// `now` stamps the synthesized error items.
pub fn merge_outcomes(
    outcomes: Vec<FetchOutcome>,
    self_url: &str,
    max_items: usize,
    now: DateTime<Utc>,
) -> MergedFeed {
    let mut acc = MergeAccumulator::default();
    for outcome in outcomes {
        acc.absorb(outcome, now);
    }
    acc.finish(self_url, max_items)
}

/// Builds the placeholder item shown for a source that could not be loaded.
pub fn error_item(url: &str, message: &str, now: DateTime<Utc>) -> FeedItem {
    let escaped_url = escape(url);
    let content = format!(
        "<p>Could not load <a href=\"{url}\">{url}</a>.</p><p>Error: {message}</p>",
        url = escaped_url,
        message = escape(message),
    );

    FeedItem {
        title: Some(format!("{ERROR_TITLE_PREFIX}{url}")),
        link: Some(url.to_owned()),
        published_at: Some(now),
        content: Some(content),
        plain_summary: Some(format!("Could not load {url}: {message}")),
        guid: Some(format!("{ERROR_GUID_PREFIX}{}", uuid::Uuid::new_v4())),
        source_feed_url: Some(url.to_owned()),
        ..FeedItem::default()
    }
}

/// Request-local collection of outcomes; combined only after every fetch
/// has settled.
#[derive(Default)]
struct MergeAccumulator {
    items: Vec<FeedItem>,
    errors: Vec<FeedItem>,
    source_titles: Vec<String>,
}

impl MergeAccumulator {
    fn absorb(&mut self, outcome: FetchOutcome, now: DateTime<Utc>) {
        match outcome {
            FetchOutcome::Success(feed) => {
                if let Some(title) = feed.title.filter(|t| !t.trim().is_empty()) {
                    self.source_titles.push(title);
                }
                self.items.extend(feed.items);
            }
            FetchOutcome::Failure { url, message } => {
                self.errors.push(error_item(&url, &message, now));
            }
        }
    }

    fn finish(self, self_url: &str, max_items: usize) -> MergedFeed {
        let description = describe(&self.source_titles, self.errors.len());

        let mut successes = self.items;
        // Stable: equal timestamps keep source order.
        successes.sort_by_cached_key(|item| Reverse(item.effective_timestamp()));

        let mut items = self.errors;
        items.extend(successes);
        items.truncate(max_items);

        MergedFeed {
            title: MERGED_FEED_TITLE.to_owned(),
            description,
            link: self_url.to_owned(),
            items,
        }
    }
}

fn describe(source_titles: &[String], failures: usize) -> String {
    let mut description = if source_titles.is_empty() {
        "Merged feed".to_owned()
    } else {
        format!("Merged from: {}", source_titles.join(", "))
    };
    if failures > 0 {
        description.push_str(&format!(" ({failures} failed)"));
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::SourceFeed;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const SELF_URL: &str = "https://merge.example.com/?url=a";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn item(title: &str, published: Option<i64>) -> FeedItem {
        FeedItem {
            title: Some(title.to_owned()),
            link: Some(format!("https://example.com/{title}")),
            published_at: published.map(at),
            ..FeedItem::default()
        }
    }

    fn success(title: &str, items: Vec<FeedItem>) -> FetchOutcome {
        FetchOutcome::Success(SourceFeed {
            title: Some(title.to_owned()),
            items,
            ..SourceFeed::default()
        })
    }

    fn failure(url: &str, message: &str) -> FetchOutcome {
        FetchOutcome::Failure {
            url: url.to_owned(),
            message: message.to_owned(),
        }
    }

    fn titles(feed: &MergedFeed) -> Vec<&str> {
        feed.items
            .iter()
            .map(|i| i.title.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn test_sorts_newest_first_across_sources() {
        let outcomes = vec![
            success("A", vec![item("a-old", Some(100)), item("a-new", Some(300))]),
            success("B", vec![item("b-mid", Some(200))]),
        ];
        let feed = merge_outcomes(outcomes, SELF_URL, MAX_ITEMS, at(1_000));

        assert_eq!(titles(&feed), vec!["a-new", "b-mid", "a-old"]);
        assert_eq!(feed.title, "Merged Feed");
        assert_eq!(feed.link, SELF_URL);
        assert_eq!(feed.description, "Merged from: A, B");
    }

    #[test]
    fn test_date_string_fallback_and_undated_last() {
        let mut stringly = item("stringly", None);
        stringly.date_string = Some("1970-01-01T00:03:20Z".into()); // 200s
        let outcomes = vec![success(
            "A",
            vec![item("undated", None), stringly, item("dated", Some(100))],
        )];

        let feed = merge_outcomes(outcomes, SELF_URL, MAX_ITEMS, at(1_000));
        assert_eq!(titles(&feed), vec!["stringly", "dated", "undated"]);
    }

    #[test]
    fn test_errors_lead_regardless_of_timestamp() {
        let outcomes = vec![
            success("A", vec![item("future", Some(9_999_999_999))]),
            failure("https://bad.example.com/one", "Status code 500"),
            failure("https://bad.example.com/two", "boom"),
        ];
        let feed = merge_outcomes(outcomes, SELF_URL, MAX_ITEMS, at(1_000));

        assert_eq!(
            titles(&feed),
            vec![
                "⚠️ Failed to load feed: https://bad.example.com/one",
                "⚠️ Failed to load feed: https://bad.example.com/two",
                "future",
            ]
        );
        assert_eq!(feed.description, "Merged from: A (2 failed)");
    }

    #[test]
    fn test_error_item_contents() {
        let error = error_item("https://x.example.com/?a=1&b=<2>", "Status code 403", at(42));

        assert_eq!(error.link.as_deref(), Some("https://x.example.com/?a=1&b=<2>"));
        assert_eq!(error.published_at, Some(at(42)));
        let content = error.content.unwrap();
        assert!(content.contains("https://x.example.com/?a=1&amp;b=&lt;2&gt;"));
        assert!(content.contains("Status code 403"));
        assert!(!content.contains("b=<2>"));
        assert!(error.guid.unwrap().starts_with(ERROR_GUID_PREFIX));
    }

    #[test]
    fn test_error_guids_unique_within_request() {
        let outcomes = vec![
            failure("https://same.example.com", "x"),
            failure("https://same.example.com", "x"),
            failure("https://same.example.com", "x"),
        ];
        let feed = merge_outcomes(outcomes, SELF_URL, MAX_ITEMS, at(0));

        let mut guids: Vec<_> = feed.items.iter().map(|i| i.guid.clone().unwrap()).collect();
        guids.sort();
        guids.dedup();
        assert_eq!(guids.len(), 3);
    }

    #[test]
    fn test_truncates_oldest_successes() {
        let items: Vec<_> = (0..150).map(|i| item(&format!("i{i}"), Some(i))).collect();
        let outcomes = vec![failure("https://bad.example.com", "nope"), success("A", items)];

        let feed = merge_outcomes(outcomes, SELF_URL, MAX_ITEMS, at(0));
        assert_eq!(feed.items.len(), MAX_ITEMS);
        assert!(feed.items[0].title.as_deref().unwrap().starts_with("⚠️"));
        assert_eq!(feed.items[1].title.as_deref(), Some("i149"));
        assert_eq!(feed.items[99].title.as_deref(), Some("i51"));
    }

    #[test]
    fn test_excess_failures_starve_successes() {
        let mut outcomes: Vec<_> = (0..120)
            .map(|i| failure(&format!("https://bad{i}.example.com"), "down"))
            .collect();
        outcomes.push(success("A", vec![item("never-shown", Some(1))]));

        let feed = merge_outcomes(outcomes, SELF_URL, MAX_ITEMS, at(0));
        assert_eq!(feed.items.len(), MAX_ITEMS);
        assert!(feed.items.iter().all(|i| i.guid.as_deref().unwrap().starts_with(ERROR_GUID_PREFIX)));
        assert_eq!(
            feed.items[0].link.as_deref(),
            Some("https://bad0.example.com")
        );
    }

    #[test]
    fn test_empty_and_untitled_description() {
        let feed = merge_outcomes(Vec::new(), SELF_URL, MAX_ITEMS, at(0));
        assert!(feed.items.is_empty());
        assert_eq!(feed.description, "Merged feed");

        let untitled = FetchOutcome::Success(SourceFeed::default());
        let feed = merge_outcomes(
            vec![untitled, failure("https://bad.example.com", "x")],
            SELF_URL,
            MAX_ITEMS,
            at(0),
        );
        assert_eq!(feed.description, "Merged feed (1 failed)");
    }

    #[tokio::test]
    async fn test_aggregate_runs_on_spawned_task() {
        let client = crate::feed::build_client("feedmerge-test/1.0", false).unwrap();
        let urls = vec![
            "http://127.0.0.1/feed".to_owned(),
            "ftp://example.com/feed".to_owned(),
        ];

        let feed = tokio::spawn(async move {
            aggregate(&client, &urls, SELF_URL, &AggregateOptions::default()).await
        })
        .await
        .unwrap();

        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].link.as_deref(), Some("http://127.0.0.1/feed"));
        assert_eq!(feed.items[1].link.as_deref(), Some("ftp://example.com/feed"));
        assert_eq!(feed.description, "Merged feed (2 failed)");
    }

    proptest! {
        #[test]
        fn prop_errors_lead_and_successes_non_increasing(
            stamps in proptest::collection::vec(proptest::option::of(0i64..4_000_000_000), 0..60),
            failures in 0usize..8,
        ) {
            let items: Vec<_> = stamps
                .iter()
                .enumerate()
                .map(|(i, s)| item(&format!("i{i}"), *s))
                .collect();
            let mut outcomes = vec![success("A", items)];
            for f in 0..failures {
                outcomes.push(failure(&format!("https://bad{f}.example.com"), "down"));
            }

            let feed = merge_outcomes(outcomes, SELF_URL, MAX_ITEMS, at(0));

            prop_assert!(feed.items.len() <= MAX_ITEMS);
            prop_assert_eq!(feed.items.len(), (stamps.len() + failures).min(MAX_ITEMS));

            let (errors, rest) = feed.items.split_at(failures.min(feed.items.len()));
            for e in errors {
                prop_assert!(e.guid.as_deref().unwrap().starts_with(ERROR_GUID_PREFIX));
            }
            for pair in rest.windows(2) {
                prop_assert!(pair[0].effective_timestamp() >= pair[1].effective_timestamp());
            }
        }
    }
}
