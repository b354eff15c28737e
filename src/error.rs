//! Error types for the `themalinks_viewer` crate.

/// All errors the viewer pipeline can report.
///
/// Errors never cross a component boundary as panics: each component converts
/// its failures into one of these variants and hands it back as a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    /// The target URL is not an absolute http(s) URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The direct-embed probe did not answer in time.
    #[error("Embed probe timed out after {0} ms")]
    EmbedProbeTimeout(u64),

    /// The page loaded but refuses to be embedded (or could not be loaded).
    #[error("Embedding blocked: {0}")]
    EmbedProbeBlocked(String),

    /// A raw HTTP failure reported by a [`PageFetcher`](crate::PageFetcher).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A single proxy endpoint attempt failed.
    #[error("Proxy {endpoint} failed: {reason}")]
    ProxyNetwork { endpoint: String, reason: String },

    /// Every configured proxy endpoint failed for one request.
    #[error("All {attempts} proxy endpoints failed, last error: {last}")]
    AllEndpointsExhausted { attempts: usize, last: String },

    /// Fetched HTML could not be turned into a document tree.
    #[error("Could not parse HTML: {0}")]
    SanitizeParse(String),

    /// A direct embed failed at runtime and no fallback is left.
    #[error("Embedded page failed to load: {0}")]
    EmbedFailed(String),

    /// The builder configuration is invalid.
    #[error("Config error: {0}")]
    Config(String),
}

/// A type alias for `Result<T, ViewerError>`.
pub type Result<T> = std::result::Result<T, ViewerError>;
