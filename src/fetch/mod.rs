//! Outbound HTTP used for proxied page loads.
//!
//! The crate ships one backend, [`ReqwestFetcher`]. Implement [`PageFetcher`]
//! to plug in another client (or a scripted one in tests).

mod http;
mod payload;

pub use http::ReqwestFetcher;
pub use payload::extract_html;

use std::future::Future;

use crate::error::Result;

/// Raw response of one GET, before any interpretation of the status code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    /// A 200 response with the given content type and body.
    pub fn ok(content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.into()),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The page HTML, unwrapped from a JSON envelope when the proxy used one.
    pub fn into_html(self) -> String {
        extract_html(self.content_type.as_deref(), self.body)
    }
}

/// Trait for HTTP clients that can GET a proxied URL.
///
/// Transport failures are returned as [`ViewerError::Http`](crate::ViewerError::Http);
/// non-2xx responses are returned as `Ok` so the caller decides what counts
/// as failure.
///
/// # Implementing a custom fetcher
///
/// ```rust,no_run
/// use themalinks_viewer::{FetchedPage, PageFetcher, Result};
///
/// struct Offline;
///
/// impl PageFetcher for Offline {
///     async fn get(&self, _url: &str) -> Result<FetchedPage> {
///         Ok(FetchedPage::ok("text/html", "<p>cached copy</p>"))
///     }
/// }
/// ```
pub trait PageFetcher: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<FetchedPage>> + Send;
}
