use crate::body::{CompressionBody, Head, into_bytes};
use crate::codec::GZIP;
use crate::compressible::{base_content_type, is_compressible};
use crate::sniff::detect_content_type;
use bytes::Buf;
use compression_core::Level;
use http::response::Parts;
use http::{Response, header};
use http_body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

pin_project! {
    /// Future for compression service responses.
    ///
    /// When gzip is accepted and the declared `Content-Type` is missing or
    /// compressible, the response head is held back until the first chunk of
    /// body data is available, since that chunk decides both the sniffed
    /// `Content-Type` and whether `Content-Encoding` is set.
    pub struct ResponseFuture<F, B> {
        #[pin]
        inner: F,
        gzip_accepted: bool,
        level: Level,
        // Response head and body while waiting for the first chunk
        waiting: Option<(Parts, B)>,
    }
}

impl<F, B> ResponseFuture<F, B> {
    pub(crate) fn new(inner: F, gzip_accepted: bool, level: Level) -> Self {
        Self {
            inner,
            gzip_accepted,
            level,
            waiting: None,
        }
    }
}

impl<F, B, E> Future for ResponseFuture<F, B>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: Body + Unpin,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Output = Result<Response<CompressionBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        loop {
            if let Some((parts, mut body)) = this.waiting.take() {
                return match poll_first_chunk(&mut body, cx) {
                    Poll::Ready(head) => Poll::Ready(Ok(decide(parts, body, head, *this.level))),
                    Poll::Pending => {
                        *this.waiting = Some((parts, body));
                        Poll::Pending
                    }
                };
            }

            let response = ready!(this.inner.as_mut().poll(cx))?;
            let (mut parts, body) = response.into_parts();

            if !*this.gzip_accepted {
                return Poll::Ready(Ok(Response::from_parts(
                    parts,
                    CompressionBody::passthrough(body),
                )));
            }

            // The response may vary on Accept-Encoding whatever we decide below
            add_vary_accept_encoding(&mut parts.headers);

            if let Some(reason) = skip_reason(&parts.headers) {
                tracing::debug!(reason, "response passed through uncompressed");
                return Poll::Ready(Ok(Response::from_parts(
                    parts,
                    CompressionBody::passthrough(body),
                )));
            }

            // A declared type off the list is settled without waiting for data
            if !needs_first_chunk(&parts.headers) {
                tracing::debug!(
                    content_type = content_type_field(&parts.headers),
                    "content type not compressible"
                );
                return Poll::Ready(Ok(Response::from_parts(
                    parts,
                    CompressionBody::passthrough(body),
                )));
            }

            *this.waiting = Some((parts, body));
        }
    }
}

/// Polls `body` until it yields a non-empty data chunk or anything else.
///
/// Empty data frames carry nothing to sniff and are dropped.
fn poll_first_chunk<B>(body: &mut B, cx: &mut Context<'_>) -> Poll<Head>
where
    B: Body + Unpin,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    loop {
        let head = match ready!(Pin::new(&mut *body).poll_frame(cx)) {
            None => Head::End,
            Some(Err(e)) => Head::Error(io::Error::other(e.into())),
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) if !data.has_remaining() => continue,
                Ok(data) => Head::Data(into_bytes(data)),
                Err(frame) => match frame.into_trailers() {
                    Ok(trailers) => Head::Trailers(trailers),
                    Err(_) => continue,
                },
            },
        };
        return Poll::Ready(head);
    }
}

/// Commits the response to the compressed or passthrough path.
fn decide<B>(
    mut parts: Parts,
    body: B,
    head: Head,
    level: Level,
) -> Response<CompressionBody<B>> {
    let first = match head {
        Head::Data(first) => first,
        // No body bytes were written, so nothing is sniffed or encoded
        head => {
            tracing::trace!("response has no body data, passed through");
            return Response::from_parts(parts, CompressionBody::replay(body, head));
        }
    };

    if !parts.headers.contains_key(header::CONTENT_TYPE) {
        let sniffed = detect_content_type(&first);
        tracing::trace!(content_type = sniffed, "sniffed response content type");
        parts.headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static(sniffed),
        );
    }

    let compressible = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_compressible);

    if !compressible {
        tracing::debug!(
            content_type = content_type_field(&parts.headers),
            "content type not compressible"
        );
        return Response::from_parts(parts, CompressionBody::replay(body, Head::Data(first)));
    }

    tracing::debug!(
        content_type = content_type_field(&parts.headers),
        "compressing response body"
    );

    parts.headers.insert(
        header::CONTENT_ENCODING,
        header::HeaderValue::from_static(GZIP),
    );

    // Remove Content-Length since compressed size is unknown
    parts.headers.remove(header::CONTENT_LENGTH);

    // Remove Accept-Ranges since we can't support ranges on compressed content
    parts.headers.remove(header::ACCEPT_RANGES);

    Response::from_parts(parts, CompressionBody::compressed(body, first, level))
}

/// Reasons to leave a response alone without looking at its body.
fn skip_reason(headers: &header::HeaderMap) -> Option<&'static str> {
    if headers.contains_key(header::CONTENT_ENCODING) {
        Some("already encoded")
    } else if headers.contains_key(header::CONTENT_RANGE) {
        Some("range response")
    } else {
        None
    }
}

/// Returns false when the declared `Content-Type` already rules out compression.
fn needs_first_chunk(headers: &header::HeaderMap) -> bool {
    match headers.get(header::CONTENT_TYPE) {
        None => true,
        Some(value) => value.to_str().is_ok_and(is_compressible),
    }
}

fn content_type_field(headers: &header::HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or("", base_content_type)
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut header::HeaderMap) {
    // Check all Vary headers to see if Accept-Encoding is already present
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let covered = vary_str.split(',').any(|v| {
                let v = v.trim();
                v == "*" || v.eq_ignore_ascii_case("accept-encoding")
            });
            if covered {
                return;
            }
        }
    }

    headers.append(
        header::VARY,
        header::HeaderValue::from_static("accept-encoding"),
    );
}
