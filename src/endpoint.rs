//! Public CORS-proxy endpoints and the rotation cursor shared between loads.

use std::sync::atomic::{AtomicUsize, Ordering};

use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::error::{Result, ViewerError};

/// How an endpoint embeds the target URL into its own request URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrlFormat {
    /// The raw target URL is appended to a fixed prefix.
    Append { prefix: String },
    /// The target URL is percent-encoded into a query-string parameter.
    QueryParam { base: String, param: String },
}

/// A single public proxy service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyEndpoint {
    name: String,
    format: UrlFormat,
}

impl ProxyEndpoint {
    /// Endpoint that expects `<prefix><target>`.
    pub fn append(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: UrlFormat::Append {
                prefix: prefix.into(),
            },
        }
    }

    /// Endpoint that expects `<base>?<param>=<percent-encoded target>`.
    pub fn query_param(
        name: impl Into<String>,
        base: impl Into<String>,
        param: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            format: UrlFormat::QueryParam {
                base: base.into(),
                param: param.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url_format(&self) -> &UrlFormat {
        &self.format
    }

    /// Compose the proxied request URL for an already validated target.
    pub fn format_url(&self, target: &Url) -> String {
        match &self.format {
            UrlFormat::Append { prefix } => format!("{prefix}{target}"),
            UrlFormat::QueryParam { base, param } => {
                let encoded: String = byte_serialize(target.as_str().as_bytes()).collect();
                format!("{base}?{param}={encoded}")
            }
        }
    }
}

/// Parse `raw` as an absolute http or https URL.
pub fn parse_target(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| ViewerError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(ViewerError::InvalidUrl(format!(
            "{raw}: unsupported scheme {scheme}"
        ))),
    }
}

/// Ordered, immutable list of proxy endpoints.
#[derive(Clone, Debug)]
pub struct EndpointRegistry {
    endpoints: Vec<ProxyEndpoint>,
}

impl EndpointRegistry {
    /// Build a registry from an ordered list. An empty list is rejected.
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(ViewerError::Config(
                "at least one proxy endpoint is required".into(),
            ));
        }
        Ok(Self { endpoints })
    }

    pub fn list(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ProxyEndpoint> {
        self.endpoints.get(index)
    }

    /// Format `target` for the endpoint at `index`.
    ///
    /// Returns `None` when the target is not an absolute http(s) URL or the
    /// index is out of range. Never touches the network.
    pub fn format(&self, index: usize, target: &str) -> Option<String> {
        let endpoint = self.endpoints.get(index)?;
        let url = parse_target(target).ok()?;
        Some(endpoint.format_url(&url))
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self {
            endpoints: vec![
                ProxyEndpoint::query_param("AllOrigins", "https://api.allorigins.win/get", "url"),
                ProxyEndpoint::append(
                    "CORS Anywhere (Public)",
                    "https://cors-anywhere.herokuapp.com/",
                ),
                ProxyEndpoint::append("ThingProxy", "https://thingproxy.freeboard.io/fetch/"),
            ],
        }
    }
}

/// Index of the endpoint the next proxied attempt should use.
///
/// The value is always in `[0, len)`. Share one cursor (behind an `Arc`)
/// between orchestrators for process-wide rotation, or give each its own for
/// per-request isolation. Concurrent advances may skip an endpoint; that only
/// costs an extra retry.
#[derive(Debug)]
pub struct EndpointCursor {
    index: AtomicUsize,
    len: usize,
}

impl EndpointCursor {
    /// Create a cursor over `len` endpoints, starting at the first one.
    ///
    /// `len` is clamped to at least 1.
    pub fn new(len: usize) -> Self {
        Self {
            index: AtomicUsize::new(0),
            len: len.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.index.load(Ordering::Relaxed) % self.len
    }

    /// Move to the next endpoint, wrapping around, and return the new index.
    pub fn advance(&self) -> usize {
        let len = self.len;
        let previous = self
            .index
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);
        (previous + 1) % len
    }

    /// Point the cursor at `index` (reduced modulo the endpoint count).
    pub fn set(&self, index: usize) {
        self.index.store(index % self.len, Ordering::Relaxed);
    }

    pub fn endpoint_count(&self) -> usize {
        self.len
    }
}
