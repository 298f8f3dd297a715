//! Merge many RSS/Atom and JSON Feed sources into one feed.
//!
//! A request names a set of feed URLs. Every source is fetched concurrently,
//! normalized to [`feed::FeedItem`]s, and merged newest-first into a
//! [`feed::MergedFeed`], rendered as RSS 2.0 or JSON Feed 1.1. A source that
//! fails to load shows up as a synthesized error item instead of failing the
//! whole request.

pub mod codec;
pub mod config;
pub mod feed;
pub mod merge;
pub mod output;
pub mod server;
pub mod util;
