//! Configuration and the builder that assembles a [`Viewer`].

use std::sync::Arc;
use std::time::Duration;

use crate::endpoint::{EndpointCursor, EndpointRegistry};
use crate::error::{Result, ViewerError};
use crate::fetch::{PageFetcher, ReqwestFetcher};
use crate::orchestrator::FetchOrchestrator;
use crate::probe::{Denylist, EmbedProbe, HeaderProbe};
use crate::sanitizer::{DocumentPass, HtmlSanitizer};
use crate::viewer::Viewer;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(15_000);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(1000);
pub const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_HEALTH_CHECK_URL: &str = "https://httpbin.org/get";
/// Loads allowed before a failing direct embed stops falling back to the proxy.
pub const DEFAULT_MAX_DIRECT_ATTEMPTS: u32 = 2;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; ThemaLinks/1.0)";
pub const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "fr-FR,fr;q=0.9,en;q=0.8";

/// Timing and retry policy of the viewer pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewerConfig {
    /// Upper bound of one direct-embed probe.
    pub probe_timeout: Duration,
    /// Upper bound of one proxied GET.
    pub fetch_timeout: Duration,
    /// Pause between two proxy endpoint attempts.
    pub retry_backoff: Duration,
    pub max_direct_attempts: u32,
    pub health_check_timeout: Duration,
    pub health_check_url: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_direct_attempts: DEFAULT_MAX_DIRECT_ATTEMPTS,
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT,
            health_check_url: DEFAULT_HEALTH_CHECK_URL.to_string(),
        }
    }
}

/// Settings for the `reqwest` client behind [`ReqwestFetcher`] and
/// [`HeaderProbe`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Client-level timeout; the orchestrator applies its own on top.
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl HttpConfig {
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ViewerError::Config(format!("cannot build HTTP client: {e}")))
    }
}

/// Builder for configuring a [`Viewer`] (or a bare [`FetchOrchestrator`]).
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use themalinks_viewer::{HttpConfig, ViewerBuilder};
///
/// # fn example() -> themalinks_viewer::Result<()> {
/// let viewer = ViewerBuilder::from_http(&HttpConfig::default())?
///     .probe_timeout(Duration::from_secs(2))
///     .fetch_timeout(Duration::from_secs(10))
///     .deny_domain("tv.garden")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ViewerBuilder<F: PageFetcher, P: EmbedProbe> {
    fetcher: F,
    probe: P,
    config: ViewerConfig,
    registry: EndpointRegistry,
    denylist: Denylist,
    cursor: Option<Arc<EndpointCursor>>,
    sanitizer: HtmlSanitizer,
}

impl ViewerBuilder<ReqwestFetcher, HeaderProbe> {
    /// Builder backed by one shared `reqwest` client for fetching and probing.
    pub fn from_http(http: &HttpConfig) -> Result<Self> {
        let client = http.build_client()?;
        Ok(Self::new(
            ReqwestFetcher::new(client.clone(), http),
            HeaderProbe::new(client),
        ))
    }
}

impl<F: PageFetcher, P: EmbedProbe> ViewerBuilder<F, P> {
    /// Create a builder with the default endpoints, denylist, timings and
    /// sanitizer pipeline.
    pub fn new(fetcher: F, probe: P) -> Self {
        Self {
            fetcher,
            probe,
            config: ViewerConfig::default(),
            registry: EndpointRegistry::default(),
            denylist: Denylist::default(),
            cursor: None,
            sanitizer: HtmlSanitizer::new(),
        }
    }

    pub fn config(mut self, config: ViewerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    pub fn max_direct_attempts(mut self, attempts: u32) -> Self {
        self.config.max_direct_attempts = attempts;
        self
    }

    /// URL and timeout used by [`FetchOrchestrator::find_best_endpoint`].
    pub fn health_check(mut self, url: impl Into<String>, timeout: Duration) -> Self {
        self.config.health_check_url = url.into();
        self.config.health_check_timeout = timeout;
        self
    }

    pub fn endpoints(mut self, registry: EndpointRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn denylist(mut self, denylist: Denylist) -> Self {
        self.denylist = denylist;
        self
    }

    pub fn deny_domain(mut self, domain: impl AsRef<str>) -> Self {
        self.denylist = self.denylist.with_domain(domain);
        self
    }

    /// Share an existing rotation cursor. Without one, the built orchestrator
    /// gets a private cursor.
    pub fn cursor(mut self, cursor: Arc<EndpointCursor>) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Replace the sanitizer pipeline.
    pub fn sanitizer(mut self, sanitizer: HtmlSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Append a pass to the sanitizer pipeline.
    pub fn add_pass(mut self, pass: impl DocumentPass + 'static) -> Self {
        self.sanitizer.add(pass);
        self
    }

    fn split(self) -> Result<(FetchOrchestrator<F, P>, HtmlSanitizer)> {
        let cursor = match self.cursor {
            Some(cursor) if cursor.endpoint_count() != self.registry.len() => {
                return Err(ViewerError::Config(format!(
                    "cursor covers {} endpoints but the registry has {}",
                    cursor.endpoint_count(),
                    self.registry.len()
                )));
            }
            Some(cursor) => cursor,
            None => Arc::new(EndpointCursor::new(self.registry.len())),
        };

        let orchestrator = FetchOrchestrator::new(
            self.fetcher,
            self.probe,
            self.registry,
            self.denylist,
            cursor,
            self.config,
        );
        Ok((orchestrator, self.sanitizer))
    }

    /// Build only the fetch orchestrator.
    pub fn build_orchestrator(self) -> Result<FetchOrchestrator<F, P>> {
        Ok(self.split()?.0)
    }

    /// Build the viewer controller.
    pub fn build(self) -> Result<Viewer<F, P>> {
        let (orchestrator, sanitizer) = self.split()?;
        Ok(Viewer::new(orchestrator, sanitizer))
    }
}
