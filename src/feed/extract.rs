use std::borrow::Cow;

/// Opening markup that wraps the article body in link-aggregator feeds
/// (a `<table>` of thumbnails and vote links precedes it).
pub const BODY_MARKER: &str = r#"<div class="md"><p>"#;

/// Strips wrapper boilerplate that precedes the real article body.
///
/// If `html` contains [`BODY_MARKER`], returns everything after its first
/// occurrence. Otherwise returns the input untouched as `Cow::Borrowed`,
/// which is the common case.
///
/// # Examples
///
/// ```
/// use feedmerge::feed::extract_content;
///
/// let html = r#"<table><tr><td>thumb</td></tr></table><div class="md"><p>BODY"#;
/// assert_eq!(extract_content(html), "BODY");
/// assert_eq!(extract_content("<p>plain</p>"), "<p>plain</p>");
/// ```
pub fn extract_content(html: &str) -> Cow<'_, str> {
    match html.find(BODY_MARKER) {
        Some(idx) => Cow::Owned(html[idx + BODY_MARKER.len()..].to_owned()),
        None => Cow::Borrowed(html),
    }
}
