//! Content-type detection from the leading bytes of a body.
//!
//! Implements the signature table of the WHATWG MIME sniffing algorithm.
//! Only the first [`SNIFF_LEN`] bytes are ever considered.

/// Maximum number of bytes inspected.
pub const SNIFF_LEN: usize = 512;

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

enum Signature {
    /// HTML tag prefix, matched case-insensitively after leading whitespace
    /// and followed by a space or `>`.
    Html(&'static [u8]),
    Masked {
        mask: &'static [u8],
        pattern: &'static [u8],
        skip_ws: bool,
        content_type: &'static str,
    },
    Exact(&'static [u8], &'static str),
    Mp4,
    Text,
}

const fn masked(
    mask: &'static [u8],
    pattern: &'static [u8],
    content_type: &'static str,
) -> Signature {
    Signature::Masked {
        mask,
        pattern,
        skip_ws: false,
        content_type,
    }
}

const SIGNATURES: &[Signature] = &[
    Signature::Html(b"<!DOCTYPE HTML"),
    Signature::Html(b"<HTML"),
    Signature::Html(b"<HEAD"),
    Signature::Html(b"<SCRIPT"),
    Signature::Html(b"<IFRAME"),
    Signature::Html(b"<H1"),
    Signature::Html(b"<DIV"),
    Signature::Html(b"<FONT"),
    Signature::Html(b"<TABLE"),
    Signature::Html(b"<A"),
    Signature::Html(b"<STYLE"),
    Signature::Html(b"<TITLE"),
    Signature::Html(b"<B"),
    Signature::Html(b"<BODY"),
    Signature::Html(b"<BR"),
    Signature::Html(b"<P"),
    Signature::Html(b"<!--"),
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\xFF",
        pattern: b"<?xml",
        skip_ws: true,
        content_type: "text/xml; charset=utf-8",
    },
    Signature::Exact(b"%PDF-", "application/pdf"),
    Signature::Exact(b"%!PS-Adobe-", "application/postscript"),
    // byte order marks
    masked(b"\xFF\xFF\x00\x00", b"\xFE\xFF\x00\x00", "text/plain; charset=utf-16be"),
    masked(b"\xFF\xFF\x00\x00", b"\xFF\xFE\x00\x00", "text/plain; charset=utf-16le"),
    masked(b"\xFF\xFF\xFF\x00", b"\xEF\xBB\xBF\x00", TEXT_PLAIN_UTF8),
    // images
    Signature::Exact(b"\x00\x00\x01\x00", "image/x-icon"),
    Signature::Exact(b"\x00\x00\x02\x00", "image/x-icon"),
    Signature::Exact(b"BM", "image/bmp"),
    Signature::Exact(b"GIF87a", "image/gif"),
    Signature::Exact(b"GIF89a", "image/gif"),
    masked(
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        b"RIFF\x00\x00\x00\x00WEBPVP",
        "image/webp",
    ),
    Signature::Exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    Signature::Exact(b"\xFF\xD8\xFF", "image/jpeg"),
    // audio and video
    masked(
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        b"FORM\x00\x00\x00\x00AIFF",
        "audio/aiff",
    ),
    masked(b"\xFF\xFF\xFF", b"ID3", "audio/mpeg"),
    masked(b"\xFF\xFF\xFF\xFF\xFF", b"OggS\x00", "application/ogg"),
    masked(
        b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF",
        b"MThd\x00\x00\x00\x06",
        "audio/midi",
    ),
    masked(
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        b"RIFF\x00\x00\x00\x00AVI ",
        "video/avi",
    ),
    masked(
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        b"RIFF\x00\x00\x00\x00WAVE",
        "audio/wave",
    ),
    Signature::Mp4,
    Signature::Exact(b"\x1A\x45\xDF\xA3", "video/webm"),
    // fonts
    masked(
        b"\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\xFF\xFF",
        b"\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00LP",
        "application/vnd.ms-fontobject",
    ),
    Signature::Exact(b"\x00\x01\x00\x00", "font/ttf"),
    Signature::Exact(b"OTTO", "font/otf"),
    Signature::Exact(b"ttcf", "font/collection"),
    Signature::Exact(b"wOFF", "font/woff"),
    Signature::Exact(b"wOF2", "font/woff2"),
    // archives
    Signature::Exact(b"\x1F\x8B\x08", "application/x-gzip"),
    Signature::Exact(b"PK\x03\x04", "application/zip"),
    Signature::Exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    Signature::Exact(b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    Signature::Exact(b"\x00\x61\x73\x6D", "application/wasm"),
    Signature::Text,
];

/// Guesses the content type of `data`.
///
/// Always returns a valid MIME type, falling back to
/// `application/octet-stream` when nothing more specific matches.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let first_non_ws = data
        .iter()
        .position(|&b| !is_ws(b))
        .unwrap_or(data.len());

    SIGNATURES
        .iter()
        .find_map(|sig| sig.matches(data, first_non_ws))
        .unwrap_or(OCTET_STREAM)
}

impl Signature {
    fn matches(&self, data: &[u8], first_non_ws: usize) -> Option<&'static str> {
        match self {
            Signature::Html(tag) => {
                let data = &data[first_non_ws..];
                if data.len() < tag.len() + 1 {
                    return None;
                }
                let matched = tag.iter().zip(data).all(|(&t, &d)| {
                    if t.is_ascii_uppercase() {
                        d & 0xDF == t
                    } else {
                        d == t
                    }
                });
                // the tag must be terminated
                if matched && is_tt(data[tag.len()]) {
                    Some("text/html; charset=utf-8")
                } else {
                    None
                }
            }
            Signature::Masked {
                mask,
                pattern,
                skip_ws,
                content_type,
            } => {
                let data = if *skip_ws { &data[first_non_ws..] } else { data };
                if data.len() < pattern.len() {
                    return None;
                }
                pattern
                    .iter()
                    .zip(mask.iter())
                    .zip(data)
                    .all(|((&p, &m), &d)| d & m == p)
                    .then_some(*content_type)
            }
            Signature::Exact(signature, content_type) => {
                data.starts_with(signature).then_some(*content_type)
            }
            Signature::Mp4 => is_mp4(data).then_some("video/mp4"),
            Signature::Text => (!data[first_non_ws..].iter().any(|&b| is_binary(b)))
                .then_some(TEXT_PLAIN_UTF8),
        }
    }
}

/// Checks for an ISO base media `ftyp` box naming an mp4 brand.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 {
        return false;
    }
    if &data[4..8] != b"ftyp" {
        return false;
    }
    // offset 12 holds the minor version, not a brand
    (8..box_size)
        .step_by(4)
        .filter(|&start| start != 12)
        .any(|start| &data[start..start + 3] == b"mp4")
}

fn is_ws(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

/// Tag-terminating byte.
fn is_tt(b: u8) -> bool {
    b == b' ' || b == b'>'
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html() {
        assert_eq!(
            detect_content_type(b"<html><body></body></html>"),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            detect_content_type(b"\n\t  <!DOCTYPE html>\n<html>"),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            detect_content_type(b"<p>hello</p>"),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            detect_content_type(b"<!-- comment -->"),
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn test_html_needs_terminated_tag() {
        // "<HTMLX" is not a tag we know, falls through to plain text
        assert_eq!(detect_content_type(b"<htmlx>"), TEXT_PLAIN_UTF8);
        // no room for the terminating byte
        assert_eq!(detect_content_type(b"<html"), TEXT_PLAIN_UTF8);
    }

    #[test]
    fn test_xml() {
        assert_eq!(
            detect_content_type(b"  <?xml version=\"1.0\"?><a/>"),
            "text/xml; charset=utf-8"
        );
    }

    #[test]
    fn test_images() {
        assert_eq!(
            detect_content_type(b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00\x00\x0DIHDR"),
            "image/png"
        );
        assert_eq!(detect_content_type(b"\xFF\xD8\xFF\xE0"), "image/jpeg");
        assert_eq!(detect_content_type(b"GIF89a\x01\x00"), "image/gif");
        assert_eq!(
            detect_content_type(b"RIFF\x10\x20\x30\x40WEBPVP8 "),
            "image/webp"
        );
    }

    #[test]
    fn test_documents_and_archives() {
        assert_eq!(detect_content_type(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(
            detect_content_type(b"\x1F\x8B\x08\x00\x00"),
            "application/x-gzip"
        );
        assert_eq!(detect_content_type(b"PK\x03\x04rest"), "application/zip");
        assert_eq!(
            detect_content_type(b"\x00asm\x01\x00\x00\x00"),
            "application/wasm"
        );
    }

    #[test]
    fn test_byte_order_marks() {
        assert_eq!(
            detect_content_type(b"\xEF\xBB\xBFhello"),
            TEXT_PLAIN_UTF8
        );
        assert_eq!(
            detect_content_type(b"\xFE\xFF\x00h"),
            "text/plain; charset=utf-16be"
        );
        assert_eq!(
            detect_content_type(b"\xFF\xFEh\x00"),
            "text/plain; charset=utf-16le"
        );
    }

    #[test]
    fn test_mp4() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 0, 24]);
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(&[0, 0, 2, 0]);
        data.extend_from_slice(b"isommp41");
        assert_eq!(detect_content_type(&data), "video/mp4");
    }

    #[test]
    fn test_text_and_binary() {
        assert_eq!(detect_content_type(b"hello world"), TEXT_PLAIN_UTF8);
        assert_eq!(detect_content_type(b"{\"a\": 1}"), TEXT_PLAIN_UTF8);
        assert_eq!(detect_content_type(b""), TEXT_PLAIN_UTF8);
        assert_eq!(detect_content_type(b"\x01\x02\x03binary"), OCTET_STREAM);
    }

    #[test]
    fn test_only_prefix_inspected() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0x00);
        assert_eq!(detect_content_type(&data), TEXT_PLAIN_UTF8);
    }
}
