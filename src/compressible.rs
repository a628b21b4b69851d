use std::collections::HashSet;
use std::sync::LazyLock;

/// Base MIME types worth compressing.
static COMPRESSIBLE_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "text/html",
        "application/x-javascript",
        "text/css",
        "application/javascript",
        "text/javascript",
        "text/plain",
        "text/xml",
        "application/json",
        "application/vnd.ms-fontobject",
        "application/x-font-opentype",
        "application/x-font-truetype",
        "application/x-font-ttf",
        "application/xml",
        "font/eot",
        "font/opentype",
        "font/otf",
        "image/svg+xml",
        "image/vnd.microsoft.icon",
        "application/vnd.geo+json",
        "application/cap+xml",
        "text/csv",
    ])
});

/// Strips parameters from a content type, e.g. `text/html; charset=utf-8` becomes `text/html`.
pub(crate) fn base_content_type(content_type: &str) -> &str {
    content_type
        .split_once(';')
        .map_or(content_type, |(base, _)| base)
        .trim()
}

/// Returns true if the base of `content_type` is on the allow-list.
pub fn is_compressible(content_type: &str) -> bool {
    COMPRESSIBLE_TYPES.contains(base_content_type(content_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_content_type() {
        assert_eq!(base_content_type("text/html"), "text/html");
        assert_eq!(base_content_type("text/html; charset=utf-8"), "text/html");
        assert_eq!(base_content_type("  text/css ;a=b;c=d"), "text/css");
        assert_eq!(base_content_type(""), "");
    }

    #[test]
    fn test_compressible_types() {
        assert!(is_compressible("text/html"));
        assert!(is_compressible("application/json"));
        assert!(is_compressible("image/svg+xml"));
        assert!(is_compressible("text/csv"));
        assert!(is_compressible("application/vnd.geo+json"));
    }

    #[test]
    fn test_parameters_ignored() {
        assert!(is_compressible("text/plain; charset=utf-8"));
        assert!(is_compressible("application/json;version=2;charset=utf-8"));
    }

    #[test]
    fn test_not_compressible() {
        assert!(!is_compressible("image/png"));
        assert!(!is_compressible("application/octet-stream"));
        assert!(!is_compressible("video/mp4"));
        assert!(!is_compressible("text/event-stream"));
        assert!(!is_compressible(""));
    }

    #[test]
    fn test_exact_match() {
        assert!(!is_compressible("text/htmlx"));
        assert!(!is_compressible("text"));
    }
}
