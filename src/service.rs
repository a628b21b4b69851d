use crate::codec;
use crate::future::ResponseFuture;
use compression_core::Level;
use http::Request;
use std::task::{Context, Poll};
use tower::Service;

/// A Tower service that gzips HTTP response bodies whose content type is compressible.
#[derive(Debug, Clone)]
pub struct CompressionService<S> {
    inner: S,
    level: Level,
}

impl<S> CompressionService<S> {
    /// Creates a new compression service wrapping the given inner service.
    pub fn new(inner: S, level: Level) -> Self {
        Self { inner, level }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CompressionService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>>,
    ResBody: http_body::Body + Unpin,
    ResBody::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = http::Response<crate::body::CompressionBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future, ResBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let gzip_accepted = codec::accepts_gzip(req.headers());
        tracing::trace!(gzip_accepted, "negotiated response encoding");

        let inner = self.inner.call(req);

        ResponseFuture::new(inner, gzip_accepted, self.level)
    }
}
