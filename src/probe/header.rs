//! Embed probe that reads a page's frame policy from its response headers.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{CONTENT_SECURITY_POLICY, HeaderMap};
use url::Url;

use super::EmbedProbe;
use crate::error::{Result, ViewerError};

static FRAME_ANCESTORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|;)\s*frame-ancestors\s+([^;]*)").expect("frame-ancestors pattern")
});

/// Probe that issues a GET for the page and treats it as embeddable unless
/// the response forbids framing by a third-party origin.
///
/// The response body is never read; dropping the response on any exit path
/// releases the connection.
///
/// # Example
///
/// ```rust,no_run
/// use themalinks_viewer::{HeaderProbe, HttpConfig};
///
/// let client = HttpConfig::default().build_client().unwrap();
/// let probe = HeaderProbe::new(client);
/// ```
#[derive(Clone, Debug)]
pub struct HeaderProbe {
    client: reqwest::Client,
}

impl HeaderProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl EmbedProbe for HeaderProbe {
    async fn load(&self, url: &Url) -> Result<bool> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ViewerError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ViewerError::Http(format!("HTTP {status}")));
        }

        match frame_policy_violation(response.headers()) {
            Some(reason) => {
                tracing::debug!("{url} refuses framing: {reason}");
                Ok(false)
            }
            None => Ok(true),
        }
    }
}

/// Describe why `headers` forbid embedding in a foreign page, if they do.
pub fn frame_policy_violation(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get("x-frame-options")
        .and_then(|v| v.to_str().ok())
    {
        let value = value.trim().to_ascii_uppercase();
        if value == "DENY" || value == "SAMEORIGIN" || value.starts_with("ALLOW-FROM") {
            return Some(format!("X-Frame-Options: {value}"));
        }
    }

    for csp in headers
        .get_all(CONTENT_SECURITY_POLICY)
        .iter()
        .filter_map(|v| v.to_str().ok())
    {
        if let Some(sources) = FRAME_ANCESTORS.captures(csp).and_then(|c| c.get(1)) {
            let allows_any = sources.as_str().split_whitespace().any(|s| s == "*");
            if !allows_any {
                return Some(format!("frame-ancestors {}", sources.as_str().trim()));
            }
        }
    }

    None
}
