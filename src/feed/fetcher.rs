use crate::feed::jsonfeed::{has_json_feed_version, parse_json_feed};
use crate::feed::parser::parse_feed;
use crate::feed::types::{FetchOutcome, SourceFeed};
use crate::util::{validate_url, UrlValidationError};
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

/// Accept header sent with every feed request: JSON Feed first, plain JSON
/// next, and anything else after that.
pub const ACCEPT_HEADER: &str = "application/feed+json, application/json;q=0.9, */*;q=0.8";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching one source.
///
/// `Display` is what ends up in the synthesized error item, so each variant
/// renders as a short human-readable cause.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL failed parsing or the private-address policy
    #[error("{0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("{0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("Status code {0}")]
    HttpStatus(u16),
    /// Source did not answer within the per-source deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Body was neither a JSON Feed nor parsable RSS/Atom
    #[error("{0}")]
    Parse(String),
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Knobs for a single source fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Deadline covering connect, headers and body.
    pub timeout: Duration,
    pub max_feed_size: usize,
    /// Permit loopback and private-network feed URLs.
    pub allow_private_hosts: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_feed_size: DEFAULT_MAX_FEED_SIZE,
            allow_private_hosts: false,
        }
    }
}

/// Syndication format of a fetched body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    JsonFeed,
    Rss,
}

/// Decides which parser a response goes to.
///
/// Only a JSON content type (`application/feed+json` or `application/json`)
/// whose body is a JSON object with a JSON Feed `version` URI is treated as
/// JSON Feed. Everything else, including malformed JSON, is [`FeedKind::Rss`].
pub fn detect(content_type: Option<&str>, body: &[u8]) -> FeedKind {
    let is_json_type = content_type
        .map(|ct| ct.to_ascii_lowercase())
        .is_some_and(|ct| ct.contains("application/feed+json") || ct.contains("application/json"));

    if is_json_type && has_json_feed_version(body) {
        FeedKind::JsonFeed
    } else {
        FeedKind::Rss
    }
}

const MAX_REDIRECTS: usize = 5;

/// Builds the shared HTTP client used for every source fetch.
///
/// Connections are pooled across requests. Redirects are capped, loops are
/// rejected, and every redirect target must pass the same URL policy as the
/// requested URL (`allow_private_hosts` included).
pub fn build_client(
    user_agent: &str,
    allow_private_hosts: bool,
) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(redirect_policy(allow_private_hosts))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

fn redirect_policy(allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("Too many redirects (max {MAX_REDIRECTS})"));
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        if let Err(e) = validate_url(url.as_str(), allow_private_hosts) {
            tracing::warn!(to = %url, error = %e, "Rejected redirect target");
            return attempt.error(e);
        }

        tracing::debug!(
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

/// Fetches and parses one source.
///
/// Never fails: every error is folded into [`FetchOutcome::Failure`] carrying
/// the requested URL and the error's display text.
pub async fn fetch_source(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> FetchOutcome {
    let deadline = options.timeout;
    let result = match tokio::time::timeout(deadline, fetch_and_parse(client, url, options)).await
    {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(deadline)),
    };

    match result {
        Ok(feed) => {
            tracing::debug!(url = %url, items = feed.items.len(), "Fetched feed");
            FetchOutcome::Success(feed)
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Feed fetch failed");
            FetchOutcome::Failure {
                url: url.to_owned(),
                message: e.to_string(),
            }
        }
    }
}

async fn fetch_and_parse(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<SourceFeed, FetchError> {
    let validated = validate_url(url, options.allow_private_hosts)?;

    let response = client
        .get(validated.as_str())
        .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let bytes = read_limited_bytes(response, options.max_feed_size).await?;

    let kind = detect(content_type.as_deref(), &bytes);
    tracing::debug!(url = %url, content_type = ?content_type, kind = ?kind, "Detected feed format");

    if kind == FeedKind::JsonFeed {
        match parse_json_feed(&bytes, url) {
            Ok(feed) => return Ok(feed),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "JSON Feed parse failed, trying RSS/Atom");
            }
        }
    }

    parse_feed(&bytes, url).map_err(|e| FetchError::Parse(e.to_string()))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
