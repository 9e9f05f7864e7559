//! Request spans.
//!
//! Every resolution runs inside one span so that events emitted by the
//! matcher, resolver, compiler and activator share the host/path fields.

use tracing::Span;

/// Span wrapping a single host/path resolution.
pub fn request_span(host: &str, path: &str) -> Span {
    ::tracing::info_span!("farm_request", host = %host, path = %path)
}
