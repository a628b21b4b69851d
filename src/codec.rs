use compression_codecs::gzip::GzipEncoder;
use compression_core::Level;
use http::HeaderMap;
use http::header::ACCEPT_ENCODING;

/// The `Content-Encoding` token this middleware produces.
pub const GZIP: &str = "gzip";

/// Creates a fresh gzip encoder for one response body.
pub(crate) fn encoder(level: Level) -> GzipEncoder {
    GzipEncoder::new(level.into())
}

/// Returns true if any `Accept-Encoding` header line accepts gzip.
pub(crate) fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(accepts_gzip_value)
}

/// Checks a single header value like "br, gzip;q=0.8".
///
/// Matching is case-insensitive on the coding token. A coding refused with
/// `q=0` does not count.
fn accepts_gzip_value(header: &str) -> bool {
    header.split(',').any(|part| {
        let (encoding, quality) = parse_encoding_with_quality(part.trim());
        quality > 0.0
            && (encoding.eq_ignore_ascii_case(GZIP) || encoding.eq_ignore_ascii_case("x-gzip"))
    })
}

/// Parses an encoding entry like "gzip" or "br;q=0.8" into (encoding, quality).
fn parse_encoding_with_quality(s: &str) -> (&str, f32) {
    let mut parts = s.splitn(2, ';');
    let encoding = parts.next().unwrap_or("").trim();

    let quality = parts
        .next()
        .and_then(|q| {
            let q = q.trim();
            if q.starts_with("q=") || q.starts_with("Q=") {
                q[2..].trim().parse::<f32>().ok()
            } else {
                None
            }
        })
        .unwrap_or(1.0);

    (encoding, quality)
}
