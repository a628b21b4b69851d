use crate::service::CompressionService;
use compression_core::Level;
use tower::Layer;

/// A Tower layer that gzips HTTP response bodies.
///
/// This layer wraps services and compresses response bodies when the
/// client's Accept-Encoding header allows gzip and the response content
/// type, declared or sniffed, is on the compressible list.
#[derive(Debug, Clone)]
pub struct CompressionLayer {
    level: Level,
}

impl CompressionLayer {
    /// Creates a new compression layer with the default compression level.
    pub fn new() -> Self {
        Self {
            level: Level::Default,
        }
    }

    /// Sets the gzip compression level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Default for CompressionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CompressionLayer {
    type Service = CompressionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CompressionService::new(inner, self.level)
    }
}
