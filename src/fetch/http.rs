//! `reqwest`-backed page fetcher.

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};

use super::{FetchedPage, PageFetcher};
use crate::config::HttpConfig;
use crate::error::{Result, ViewerError};

/// [`PageFetcher`] that sends browser-like GET requests with `reqwest`.
///
/// The `User-Agent` and overall timeout live on the client (see
/// [`HttpConfig::build_client`]); `Accept` and `Accept-Language` are set per
/// request.
///
/// # Example
///
/// ```rust,no_run
/// use themalinks_viewer::{HttpConfig, ReqwestFetcher};
///
/// let fetcher = ReqwestFetcher::from_config(&HttpConfig::default()).unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    accept: String,
    accept_language: String,
}

impl ReqwestFetcher {
    /// Wrap an existing client, taking request headers from `config`.
    pub fn new(client: reqwest::Client, config: &HttpConfig) -> Self {
        Self {
            client,
            accept: config.accept.clone(),
            accept_language: config.accept_language.clone(),
        }
    }

    /// Build a dedicated client from `config`.
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(config.build_client()?, config))
    }
}

impl PageFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, self.accept.as_str())
            .header(ACCEPT_LANGUAGE, self.accept_language.as_str())
            .send()
            .await
            .map_err(|e| ViewerError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .map_err(|e| ViewerError::Http(e.to_string()))?;

        tracing::debug!("GET {url} -> {status} ({} bytes)", body.len());
        Ok(FetchedPage {
            status,
            content_type,
            body,
        })
    }
}
