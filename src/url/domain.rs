use crate::{UrlError, UrlResult};
use url::Url;

/// Extracts the domain from a parsed URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(String)` - The lowercase domain/host
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use driftwatch::url::extract_domain;
///
/// let url = Url::parse("https://example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Parses a URL string and extracts its domain in one step
///
/// This is the form most callers want: the rate limiter and prioritizer
/// receive URLs as strings and only need the owning domain.
///
/// # Arguments
///
/// * `url` - The URL string to resolve
///
/// # Returns
///
/// * `Ok(String)` - The lowercase domain/host
/// * `Err(UrlError)` - If the URL cannot be parsed or has no host
pub fn domain_of(url: &str) -> UrlResult<String> {
    let parsed = Url::parse(url).map_err(|e| UrlError::Parse(e.to_string()))?;
    extract_domain(&parsed).ok_or(UrlError::MissingDomain)
}

/// Counts the path segments of a URL for depth scoring
///
/// Only non-empty segments count, and the root path counts as a single
/// segment, so `/` and `/about` are both depth 1 while `/a/b` is depth 2.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use driftwatch::url::path_segment_count;
///
/// let url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(path_segment_count(&url), 1);
///
/// let url = Url::parse("https://example.com/a/b/c").unwrap();
/// assert_eq!(path_segment_count(&url), 3);
/// ```
pub fn path_segment_count(url: &Url) -> usize {
    let count = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0);
    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_uppercase_converted_to_lowercase() {
        let url = Url::parse("https://EXAMPLE.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_domain_of_valid_url() {
        assert_eq!(
            domain_of("https://Example.COM/path?q=1").unwrap(),
            "example.com"
        );
    }

    #[test]
    fn test_domain_of_rejects_garbage() {
        assert!(domain_of("not a url").is_err());
    }

    #[test]
    fn test_domain_of_rejects_hostless() {
        assert!(matches!(
            domain_of("data:text/plain,hello"),
            Err(UrlError::MissingDomain)
        ));
    }

    #[test]
    fn test_segment_count_root_is_one() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(path_segment_count(&url), 1);
    }

    #[test]
    fn test_segment_count_single() {
        let url = Url::parse("https://example.com/about").unwrap();
        assert_eq!(path_segment_count(&url), 1);
    }

    #[test]
    fn test_segment_count_nested() {
        let url = Url::parse("https://example.com/docs/api/v2").unwrap();
        assert_eq!(path_segment_count(&url), 3);
    }

    #[test]
    fn test_segment_count_ignores_trailing_slash() {
        let url = Url::parse("https://example.com/docs/").unwrap();
        assert_eq!(path_segment_count(&url), 1);
    }

    #[test]
    fn test_segment_count_ignores_query() {
        let url = Url::parse("https://example.com/a/b?page=2#top").unwrap();
        assert_eq!(path_segment_count(&url), 2);
    }
}
