//! HTTP surface.
//!
//! `GET /` and `GET /feed` aggregate the feeds named in the query string:
//!
//! - `url` (repeatable): a feed URL
//! - `feeds`: a compact-encoded URL list (see [`crate::codec`])
//! - `format`: `json`/`jsonfeed` for JSON Feed, anything else for RSS
//!
//! `GET /health` answers `ok`. Request validation failures are `400` with a
//! `{"error": "..."}` body; fetch failures never are, they become error items
//! inside a `200` feed.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;

use crate::codec::{decode_feed_list, looks_lowercase_mangled, CodecError};
use crate::config::Config;
use crate::feed::build_client;
use crate::merge::aggregate;
use crate::output::OutputFormat;

/// Request-level validation failures, all answered with `400`.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("No feed URLs provided. Pass one or more `url` parameters or a `feeds` parameter.")]
    NoUrls,

    #[error("Too many feed URLs: {count} (max {max})")]
    TooManyUrls { count: usize, max: usize },

    #[error(
        "The `feeds` parameter looks like it was converted to lowercase, which corrupts the \
         encoded list. Copy the original link again, or pass the feeds as `url` parameters."
    )]
    LowercasedFeeds,

    #[error("Could not decode the `feeds` parameter: {0}")]
    InvalidFeeds(#[source] CodecError),
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Feed-related query parameters, in the order they appeared.
#[derive(Debug, Default, PartialEq)]
pub struct FeedQuery {
    pub urls: Vec<String>,
    pub feeds: Option<String>,
    pub format: OutputFormat,
}

impl FeedQuery {
    /// Parses a raw query string.
    ///
    /// Blank `url` values are dropped; duplicates are kept. A blank `feeds`
    /// value counts as absent. Repeated `feeds` or `format` keep the last one.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = FeedQuery::default();
        let Some(raw) = raw else {
            return query;
        };

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let value = value.trim();
            match key.as_ref() {
                "url" if !value.is_empty() => query.urls.push(value.to_owned()),
                "feeds" if !value.is_empty() => query.feeds = Some(value.to_owned()),
                "format" => query.format = OutputFormat::from_param(Some(value)),
                _ => {}
            }
        }
        query
    }

    /// The URLs to aggregate: `url` values first, then the decoded `feeds`
    /// list.
    pub fn resolve_urls(&self, max_urls: usize) -> Result<Vec<String>, RequestError> {
        let mut urls = self.urls.clone();

        if let Some(payload) = &self.feeds {
            match decode_feed_list(payload) {
                Ok(decoded) => urls.extend(
                    decoded
                        .into_iter()
                        .map(|u| u.trim().to_owned())
                        .filter(|u| !u.is_empty()),
                ),
                Err(_) if looks_lowercase_mangled(payload) => {
                    return Err(RequestError::LowercasedFeeds)
                }
                Err(e) => return Err(RequestError::InvalidFeeds(e)),
            }
        }

        if urls.is_empty() {
            return Err(RequestError::NoUrls);
        }
        if urls.len() > max_urls {
            return Err(RequestError::TooManyUrls {
                count: urls.len(),
                max: max_urls,
            });
        }
        Ok(urls)
    }
}

/// Shared state for every request.
#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let client = build_client(&config.user_agent, config.allow_private_hosts)
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(feed_handler))
        .route("/feed", get(feed_handler))
        .route("/health", get(health))
        .with_state(state)
}

/// Binds `config.bind` and serves until Ctrl+C.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.bind;
    let app = router(AppState::new(config)?);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .context("Server error")?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn feed_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    RawQuery(raw): RawQuery,
) -> Response {
    let query = FeedQuery::parse(raw.as_deref());
    let urls = match query.resolve_urls(state.config.max_urls) {
        Ok(urls) => urls,
        Err(e) => {
            tracing::info!(error = %e, "Rejected feed request");
            return e.into_response();
        }
    };

    let self_link = self_url(state.config.public_url.as_deref(), &headers, &uri);
    tracing::info!(urls = urls.len(), format = ?query.format, "Aggregating feeds");

    let merged = aggregate(
        &state.client,
        &urls,
        &self_link,
        &state.config.aggregate_options(),
    )
    .await;

    match query.format.render(&merged, Utc::now()) {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, query.format.content_type().to_owned()),
                (header::CACHE_CONTROL, state.config.cache_control()),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render merged feed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to render feed" })),
            )
                .into_response()
        }
    }
}

/// The feed's own URL: `public_url` when configured, else built from the
/// request's `Host` header.
pub fn self_url(public_url: Option<&str>, headers: &HeaderMap, uri: &Uri) -> String {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());

    match public_url {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), path_and_query),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("localhost");
            format!("http://{host}{path_and_query}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_feed_list;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_repeated_urls_and_format() {
        let query = FeedQuery::parse(Some(
            "url=https%3A%2F%2Fa.example.com%2Ffeed&url=&url=%20%20&format=JSON\
             &url=https://b.example.com/rss&url=https%3A%2F%2Fa.example.com%2Ffeed",
        ));
        assert_eq!(
            query.urls,
            vec![
                "https://a.example.com/feed",
                "https://b.example.com/rss",
                "https://a.example.com/feed",
            ]
        );
        assert_eq!(query.format, OutputFormat::JsonFeed);
        assert_eq!(query.feeds, None);
    }

    #[test]
    fn test_parse_empty_query() {
        assert_eq!(FeedQuery::parse(None), FeedQuery::default());
        assert_eq!(FeedQuery::parse(Some("")), FeedQuery::default());
        assert_eq!(FeedQuery::parse(Some("feeds=&format=xml")).feeds, None);
    }

    #[test]
    fn test_resolve_url_values_come_before_feeds() {
        let payload = encode_feed_list(&["https://c.example.com/feed"]).unwrap();
        let query = FeedQuery::parse(Some(&format!(
            "feeds={payload}&url=https://a.example.com/feed"
        )));
        assert_eq!(
            query.resolve_urls(50).unwrap(),
            vec!["https://a.example.com/feed", "https://c.example.com/feed"]
        );
    }

    #[test]
    fn test_resolve_no_urls() {
        let err = FeedQuery::parse(Some("format=json")).resolve_urls(50).unwrap_err();
        assert!(matches!(err, RequestError::NoUrls));

        let empty = encode_feed_list::<&str>(&[]).unwrap();
        let err = FeedQuery::parse(Some(&format!("feeds={empty}")))
            .resolve_urls(50)
            .unwrap_err();
        assert!(matches!(err, RequestError::NoUrls));
    }

    #[test]
    fn test_resolve_too_many_urls() {
        let query = FeedQuery::parse(Some("url=https://a.example.com&url=https://b.example.com"));
        let err = query.resolve_urls(1).unwrap_err();
        assert_eq!(err.to_string(), "Too many feed URLs: 2 (max 1)");
    }

    #[test]
    fn test_resolve_bad_feeds_messages() {
        let payload = encode_feed_list(&["https://a.example.com/feed"]).unwrap();

        let lowered = FeedQuery::parse(Some(&format!("feeds={}", payload.to_lowercase())));
        assert!(matches!(
            lowered.resolve_urls(50),
            Err(RequestError::LowercasedFeeds)
        ));

        let garbage = FeedQuery::parse(Some("feeds=NOT-valid-PAYLOAD"));
        let err = garbage.resolve_urls(50).unwrap_err();
        assert!(matches!(err, RequestError::InvalidFeeds(_)));
        assert!(err.to_string().starts_with("Could not decode the `feeds` parameter"));
    }

    #[test]
    fn test_self_url_from_host() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("merge.local:8080"));
        let uri: Uri = "/feed?url=a&format=rss".parse().unwrap();
        assert_eq!(
            self_url(None, &headers, &uri),
            "http://merge.local:8080/feed?url=a&format=rss"
        );
        assert_eq!(
            self_url(None, &HeaderMap::new(), &"/".parse().unwrap()),
            "http://localhost/"
        );
    }

    #[test]
    fn test_self_url_prefers_public_url() {
        let uri: Uri = "/?url=a".parse().unwrap();
        assert_eq!(
            self_url(Some("https://merge.example.com/"), &HeaderMap::new(), &uri),
            "https://merge.example.com/?url=a"
        );
    }
}
