//! URL canonicalization and page URL construction.

use klazz_core::PageId;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string so equal requests share one bucket key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a site-relative path (`/language/rust/intro/`) against the origin.
pub fn site_url(base: &url::Url, path: &str) -> Result<url::Url, UrlError> {
    base.join(path).map_err(|e| UrlError::InvalidUrl(e.to_string()))
}

/// The live route for a page: `{base}{route_prefix}/{language}/{slug}`.
pub fn page_url(base: &url::Url, route_prefix: &str, id: &PageId) -> Result<url::Url, UrlError> {
    let path = format!("{}/{}", route_prefix.trim_end_matches('/'), id.as_str());
    site_url(base, &path)
}
