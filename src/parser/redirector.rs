//! Search-engine redirector detection and unwrapping
//!
//! Handles links like `https://www.google.com/url?q=<destination>` that wrap
//! the real target in a query parameter. Only one level is unwrapped.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Redirect/tracking endpoints on the known search domain
static REDIRECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://(?:www|news|maps|encrypted|duck)\.google\.[^/]+/(?:url|imgres)")
        .unwrap()
});

/// Query parameters that may carry the destination, in priority order
pub const DESTINATION_PARAMS: &[&str] = &["q", "url", "imgurl"];

/// Check whether a URL points at a redirector endpoint
pub fn is_redirector(url: &str) -> bool {
    REDIRECTOR.is_match(url)
}

/// Extract the wrapped destination from a redirector URL
///
/// Returns the first non-empty value among [`DESTINATION_PARAMS`]. Unparseable
/// URLs and URLs without any of those parameters yield `None`.
pub fn extract_destination(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;

    for param in DESTINATION_PARAMS {
        // Only the first occurrence of each key counts
        let value = parsed
            .query_pairs()
            .find(|(key, _)| key == *param)
            .map(|(_, value)| value.into_owned());

        if let Some(value) = value.filter(|v| !v.is_empty()) {
            return Some(value);
        }
    }

    None
}

/// Unwrap a redirector URL
///
/// `None` if the URL is not a redirector; `Some(None)` if it is one but no
/// destination could be extracted.
pub fn unwrap_redirect(url: &str) -> Option<Option<String>> {
    if !is_redirector(url) {
        return None;
    }
    Some(extract_destination(url))
}

/// Check whether a string parses as an absolute URL
pub fn is_well_formed(url: &str) -> bool {
    Url::parse(url).is_ok()
}
