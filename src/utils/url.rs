//! URL utilities for consistent URL handling
//!
//! Endpoint paths are written relative to the configured service root, so
//! every join goes through here to avoid doubled or missing slashes.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use chatdesk::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8082/ai"), "http://localhost:8082/ai");
/// assert_eq!(normalize_base_url("http://localhost:8082/ai/"), "http://localhost:8082/ai");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path
///
/// An empty endpoint addresses the base URL itself.
///
/// # Examples
///
/// ```
/// use chatdesk::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8082/ai/", "/chat/sessions"),
///     "http://localhost:8082/ai/chat/sessions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    if endpoint.is_empty() {
        return normalized_base;
    }
    format!("{normalized_base}/{endpoint}")
}

/// Reduce an endpoint path to the form used for allow-list matching:
/// a single leading slash, no query string, no trailing slash.
pub fn normalize_endpoint_path(path: &str) -> String {
    let without_query = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = without_query.trim_matches('/');
    format!("/{trimmed}")
}

/// Percent-encode a value for use as a single path segment.
pub fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}
