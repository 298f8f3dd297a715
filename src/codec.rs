//! Compact encoding of a feed URL list for the `feeds` query parameter.
//!
//! A list is serialized as a JSON array, deflated, then written as unpadded
//! URL-safe base64, so it survives a query string without further escaping.

use std::io::{Read, Write};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use thiserror::Error;

/// Decoded payloads are capped to keep a tiny parameter from inflating into
/// an arbitrarily large allocation.
const MAX_DECODED_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid compressed data: {0}")]
    Inflate(#[from] std::io::Error),

    #[error("Decoded feed list exceeds 1 MiB")]
    TooLarge,

    #[error("Invalid feed list: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes `urls` into the compact form accepted by [`decode_feed_list`].
pub fn encode_feed_list<S: AsRef<str>>(urls: &[S]) -> Result<String, CodecError> {
    let list: Vec<&str> = urls.iter().map(AsRef::as_ref).collect();
    let json = serde_json::to_vec(&list)?;

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Decodes a payload produced by [`encode_feed_list`].
pub fn decode_feed_list(payload: &str) -> Result<Vec<String>, CodecError> {
    let compressed = URL_SAFE_NO_PAD.decode(payload.trim().trim_end_matches('='))?;

    let mut json = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(MAX_DECODED_BYTES + 1)
        .read_to_end(&mut json)?;
    if json.len() as u64 > MAX_DECODED_BYTES {
        return Err(CodecError::TooLarge);
    }

    Ok(serde_json::from_slice(&json)?)
}

/// Whether a payload that failed to decode looks like it was lowercased in
/// transit (some clipboards and mobile browsers do this to URLs).
///
/// True when the payload has at least one ASCII letter and none of them is
/// uppercase. Encoded payloads of any length almost always contain both.
pub fn looks_lowercase_mangled(payload: &str) -> bool {
    let mut has_letter = false;
    for c in payload.chars() {
        if c.is_ascii_uppercase() {
            return false;
        }
        has_letter |= c.is_ascii_lowercase();
    }
    has_letter
}
