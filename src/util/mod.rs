//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: Security-focused validation to prevent SSRF attacks
//! - **Text processing**: Plain-text normalization for feed descriptions
//!
//! # Examples
//!
//! ```
//! use feedmerge::util::{sanitize_text, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml", false).unwrap();
//! assert_eq!(sanitize_text("tidy   this "), "tidy this");
//! ```

mod text;
mod url_validator;

pub use text::{sanitize_text, strip_control_chars};
pub use url_validator::{validate_url, UrlValidationError};
