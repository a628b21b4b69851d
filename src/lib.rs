//! Gzip response compression middleware for Tower.
//!
//! This crate provides a Tower layer that gzips HTTP response bodies when the
//! client's `Accept-Encoding` header allows it and the response's content
//! type is known to compress well. Responses without a `Content-Type` get one
//! sniffed from their first chunk of body data.
//!
//! # Example
//!
//! ```ignore
//! use http_gzip_sniff::CompressionLayer;
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(CompressionLayer::new())
//!     .service(my_service);
//! ```
//!
//! # Compression Rules
//!
//! The decision is made once per response, when the first non-empty chunk of
//! body data arrives; the response head is released only after that, unless
//! the declared `Content-Type` already rules compression out. The
//! middleware will **not** compress responses when:
//! - `Accept-Encoding` does not accept `gzip`
//! - `Content-Encoding` header is already set
//! - `Content-Range` header is present (range responses)
//! - The base `Content-Type` (parameters after `;` stripped) is not on the
//!   compressible list, see [`is_compressible`]
//! - The body ends before yielding any data
//!
//! # Response Modifications
//!
//! Whenever gzip is accepted:
//! - `Vary` header includes `Accept-Encoding`, even if the body is left alone
//! - `Content-Type` is set from [`detect_content_type`] if it was missing and
//!   the body has data
//!
//! When compression is applied:
//! - `Content-Encoding` header is set to `gzip`
//! - `Content-Length` header is removed (compressed size is unknown)
//! - `Accept-Ranges` header is removed

#![deny(missing_docs)]

mod body;
mod codec;
mod compressible;
mod future;
mod layer;
mod service;
mod sniff;

pub use body::CompressionBody;
pub use codec::GZIP;
pub use compressible::is_compressible;
pub use compression_core::Level;
pub use future::ResponseFuture;
pub use layer::CompressionLayer;
pub use service::CompressionService;
pub use sniff::{SNIFF_LEN, detect_content_type};
