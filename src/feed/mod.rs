//! Feed retrieval and normalization.
//!
//! This module turns one feed URL into a [`SourceFeed`] of canonical
//! [`FeedItem`]s, whatever the source format:
//!
//! - **Fetching**: single-attempt HTTP retrieval with a deadline and size limit
//! - **Detection**: JSON Feed vs RSS/Atom from content type plus a version check
//! - **Parsing**: `feed-rs` for RSS/Atom, serde for JSON Feed
//! - **Normalization**: provider items to [`FeedItem`], provenance stamping,
//!   and boilerplate stripping via [`extract_content`]
//!
//! # Architecture
//!
//! - [`fetcher`] - HTTP retrieval and [`detect`]; never returns an error,
//!   only a [`FetchOutcome`]
//! - [`parser`] - RSS/Atom parsing
//! - [`jsonfeed`] - JSON Feed wire model and parsing
//! - [`normalize`] - the [`IntoFeedItem`] conversions
//! - [`extract`] - the content extractor
//!
//! # Example
//!
//! ```ignore
//! use feedmerge::feed::{fetch_source, FetchOptions, FetchOutcome};
//!
//! let client = reqwest::Client::new();
//! match fetch_source(&client, "https://example.com/feed.xml", &FetchOptions::default()).await {
//!     FetchOutcome::Success(feed) => println!("{} items", feed.items.len()),
//!     FetchOutcome::Failure { url, message } => eprintln!("{url}: {message}"),
//! }
//! ```

pub mod extract;
pub mod fetcher;
pub mod jsonfeed;
pub mod normalize;
pub mod parser;
pub mod types;

pub use extract::extract_content;
pub use fetcher::{build_client, detect, fetch_source, FeedKind, FetchError, FetchOptions};
pub use normalize::IntoFeedItem;
pub use types::{FeedItem, FetchOutcome, MergedFeed, SourceFeed, MERGED_FEED_TITLE};
