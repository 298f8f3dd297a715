//! Configuration file parser for `feedmerge.toml`.
//!
//! The config file is optional: a missing or empty file yields
//! `Config::default()`. Unknown keys are accepted by serde and logged as
//! likely typos.
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchOptions;
use crate::merge::{AggregateOptions, MAX_ITEMS};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Service configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address for `feedmerge serve`.
    pub bind: SocketAddr,

    /// Canonical base URL (e.g. `https://merge.example.com`) used for the
    /// merged feed's self link. Without it the request's `Host` is used.
    pub public_url: Option<String>,

    pub user_agent: String,

    /// Per-source deadline in seconds.
    pub fetch_timeout_secs: u64,

    pub max_concurrent_fetches: usize,

    /// Cap on items in a merged feed.
    pub max_items: usize,

    /// Response body limit per source, in bytes.
    pub max_feed_bytes: usize,

    /// Cap on URLs per request; more is a 400.
    pub max_urls: usize,

    /// Permit loopback and private-network feed URLs.
    pub allow_private_hosts: bool,

    /// Shared-cache lifetime advertised in `Cache-Control`.
    pub cache_max_age_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            public_url: None,
            user_agent: concat!("feedmerge/", env!("CARGO_PKG_VERSION")).to_string(),
            fetch_timeout_secs: 30,
            max_concurrent_fetches: 16,
            max_items: MAX_ITEMS,
            max_feed_bytes: 10 * 1024 * 1024,
            max_urls: 50,
            allow_private_hosts: false,
            cache_max_age_secs: 600,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MiB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "bind",
        "public_url",
        "user_agent",
        "fetch_timeout_secs",
        "max_concurrent_fetches",
        "max_items",
        "max_feed_bytes",
        "max_urls",
        "allow_private_hosts",
        "cache_max_age_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            // Deleted between metadata and read
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(path = %path.display(), bind = %config.bind, "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_feed_size: self.max_feed_bytes,
            allow_private_hosts: self.allow_private_hosts,
        }
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            fetch: self.fetch_options(),
            max_concurrent_fetches: self.max_concurrent_fetches,
            max_items: self.max_items,
        }
    }

    /// `Cache-Control` value for successful feed responses.
    pub fn cache_control(&self) -> String {
        format!(
            "public, max-age={0}, s-maxage={0}",
            self.cache_max_age_secs
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
