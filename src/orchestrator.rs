//! Resolves a [`LoadRequest`] to a [`LoadResult`]: direct embed when the
//! probe allows it, otherwise a proxied fetch that rotates through the
//! endpoint registry.

use std::sync::Arc;

use futures::future::join_all;
use tokio::time;
use url::Url;

use crate::config::ViewerConfig;
use crate::endpoint::{EndpointCursor, EndpointRegistry, ProxyEndpoint, parse_target};
use crate::error::{Result, ViewerError};
use crate::fetch::PageFetcher;
use crate::probe::{Denylist, EmbedProbe, test_direct_embed};
use crate::request::{LoadMode, LoadOutcome, LoadRequest, LoadResult};

/// Drives the embed probe and the proxied fetch loop.
///
/// Built by [`ViewerBuilder::build_orchestrator`](crate::ViewerBuilder::build_orchestrator).
/// Every failure is reported through [`LoadOutcome::Failed`], never as a
/// panic or an `Err`.
pub struct FetchOrchestrator<F, P> {
    fetcher: F,
    probe: P,
    registry: EndpointRegistry,
    denylist: Denylist,
    cursor: Arc<EndpointCursor>,
    config: ViewerConfig,
}

impl<F: PageFetcher, P: EmbedProbe> FetchOrchestrator<F, P> {
    pub(crate) fn new(
        fetcher: F,
        probe: P,
        registry: EndpointRegistry,
        denylist: Denylist,
        cursor: Arc<EndpointCursor>,
        config: ViewerConfig,
    ) -> Self {
        Self {
            fetcher,
            probe,
            registry,
            denylist,
            cursor,
            config,
        }
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn denylist(&self) -> &Denylist {
        &self.denylist
    }

    /// The rotation cursor; clone the `Arc` to share it with another
    /// orchestrator.
    pub fn cursor(&self) -> &Arc<EndpointCursor> {
        &self.cursor
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Decide between direct embedding and the proxy.
    ///
    /// Denylisted hosts go straight to [`LoadMode::Proxied`] without probing.
    pub async fn decide_mode(&self, request: &LoadRequest) -> LoadMode {
        let url = request.target_url();
        if self.denylist.needs_proxy(url.as_str()) {
            tracing::debug!("{url} is on the denylist, skipping the embed probe");
            return LoadMode::Proxied;
        }
        if test_direct_embed(&self.probe, url, self.config.probe_timeout).await {
            LoadMode::Direct
        } else {
            LoadMode::Proxied
        }
    }

    /// Resolve `request`, fixing its mode on the way.
    ///
    /// A request whose mode is already [`LoadMode::Proxied`] skips the probe.
    pub async fn resolve(&self, request: &mut LoadRequest) -> LoadResult {
        let mode = match request.mode() {
            LoadMode::Unknown => self.decide_mode(request).await,
            mode => mode,
        };
        request.resolve_mode(mode);

        match mode {
            LoadMode::Direct => {
                tracing::info!("Embedding {} directly", request.target_url());
                LoadResult::direct(request.id())
            }
            LoadMode::Proxied | LoadMode::Unknown => self.fetch_proxied(request).await,
        }
    }

    /// Fetch the target through the proxies, one endpoint at a time.
    ///
    /// Each attempt uses the cursor's current endpoint. On failure the cursor
    /// advances and the loop sleeps for the retry backoff, except after the
    /// last attempt. At most one attempt per registered endpoint is made.
    pub async fn fetch_proxied(&self, request: &LoadRequest) -> LoadResult {
        let id = request.id();
        let target = request.target_url();
        let total = self.registry.len();
        let mut last_error: Option<ViewerError> = None;

        for attempt in 1..=total {
            let index = self.cursor.current();
            let Some(endpoint) = self.registry.get(index) else {
                last_error = Some(ViewerError::Config(format!(
                    "cursor index {index} is outside the endpoint registry"
                )));
                break;
            };

            tracing::debug!(
                "Proxy attempt {attempt}/{total} for {target} via {}",
                endpoint.name()
            );
            match self.fetch_once(endpoint, target).await {
                Ok(content) => {
                    tracing::info!(
                        "Loaded {target} via {} ({} bytes)",
                        endpoint.name(),
                        content.len()
                    );
                    return LoadResult {
                        request_id: id,
                        outcome: LoadOutcome::Proxied { content },
                        used_endpoint: Some(endpoint.name().to_string()),
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    tracing::warn!("Proxy attempt {attempt}/{total} failed: {e}");
                    last_error = Some(e);
                    if attempt < total {
                        self.cursor.advance();
                        time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        let last = last_error.map_or_else(|| "no attempt was made".to_string(), |e| e.to_string());
        tracing::warn!("Every proxy endpoint failed for {target}");
        LoadResult::failed(
            id,
            ViewerError::AllEndpointsExhausted {
                attempts: total,
                last,
            },
            total,
        )
    }

    async fn fetch_once(&self, endpoint: &ProxyEndpoint, target: &Url) -> Result<String> {
        let proxy_url = endpoint.format_url(target);
        let network = |reason: String| ViewerError::ProxyNetwork {
            endpoint: endpoint.name().to_string(),
            reason,
        };

        let page = match time::timeout(self.config.fetch_timeout, self.fetcher.get(&proxy_url)).await
        {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return Err(network(e.to_string())),
            Err(_) => {
                return Err(network(format!(
                    "timed out after {} ms",
                    self.config.fetch_timeout.as_millis()
                )));
            }
        };

        if !page.is_success() {
            return Err(network(format!("HTTP status {}", page.status)));
        }
        Ok(page.into_html())
    }

    /// Check one endpoint against the configured health-check URL.
    pub async fn test_endpoint(&self, endpoint: &ProxyEndpoint) -> bool {
        let test_url = match parse_target(&self.config.health_check_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Health-check URL is unusable: {e}");
                return false;
            }
        };
        let proxy_url = endpoint.format_url(&test_url);
        let outcome = time::timeout(
            self.config.health_check_timeout,
            self.fetcher.get(&proxy_url),
        )
        .await;
        match outcome {
            Ok(Ok(page)) if page.is_success() => true,
            Ok(Ok(page)) => {
                tracing::debug!("{} answered HTTP {}", endpoint.name(), page.status);
                false
            }
            Ok(Err(e)) => {
                tracing::debug!("{} is unreachable: {e}", endpoint.name());
                false
            }
            Err(_) => {
                tracing::debug!("{} did not answer in time", endpoint.name());
                false
            }
        }
    }

    /// Test every endpoint concurrently and point the cursor at the first
    /// healthy one in registry order.
    ///
    /// Returns `None` (and leaves the cursor alone) when none is healthy.
    pub async fn find_best_endpoint(&self) -> Option<&ProxyEndpoint> {
        let checks = self
            .registry
            .list()
            .iter()
            .map(|endpoint| self.test_endpoint(endpoint));
        let healthy = join_all(checks).await;

        match healthy.iter().position(|ok| *ok) {
            Some(index) => {
                self.cursor.set(index);
                let endpoint = self.registry.get(index)?;
                tracing::info!("Selected proxy endpoint {}", endpoint.name());
                Some(endpoint)
            }
            None => {
                tracing::warn!("No healthy proxy endpoint found");
                None
            }
        }
    }
}
