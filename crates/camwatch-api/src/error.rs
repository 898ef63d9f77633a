use thiserror::Error;

/// Top-level error type for the `camwatch-api` crate.
///
/// Only construction-time failures live here. Anything that goes wrong
/// once a stream is running is reported through
/// [`RenderCallbacks`](crate::render::RenderCallbacks) instead.
#[derive(Debug, Error)]
pub enum Error {
    // ── Endpoint ────────────────────────────────────────────────────
    /// Base URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Base URL uses a scheme that cannot carry a stream.
    #[error("Unsupported scheme '{scheme}' (expected http, https, ws or wss)")]
    UnsupportedScheme { scheme: String },

    /// Base URL parsed but is unusable as a stream endpoint.
    #[error("Invalid stream endpoint: {message}")]
    InvalidEndpoint { message: String },

    // ── Renderer ────────────────────────────────────────────────────
    /// The renderer refused to create a handle.
    #[error("Renderer unavailable: {message}")]
    RendererUnavailable { message: String },
}
