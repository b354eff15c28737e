//! Decides whether a page can be embedded directly or must go through a proxy.
//!
//! Two checks run in order of cost:
//!
//! - [`Denylist::needs_proxy`] -- synchronous hostname match against domains
//!   known to refuse embedding.
//! - [`test_direct_embed`] -- a timed live test through an [`EmbedProbe`].
//!
//! Built-in probe:
//!
//! - [`HeaderProbe`] -- loads the page over HTTP and reads its frame policy
//!   (`X-Frame-Options`, CSP `frame-ancestors`).

mod header;

pub use header::{HeaderProbe, frame_policy_violation};

use std::future::Future;
use std::time::Duration;

use url::Url;

use crate::error::{Result, ViewerError};

/// Domains known to block embedding in third-party pages.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "youtube.com",
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "linkedin.com",
    "github.com",
    "stackoverflow.com",
    "reddit.com",
    "medium.com",
    "wikipedia.org",
    "google.com",
    "amazon.com",
    "netflix.com",
    "discord.com",
    "slack.com",
];

/// Closed list of domains that always go through the proxy path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Denylist {
    domains: Vec<String>,
}

impl Denylist {
    /// Build a denylist from domain names. Entries are lowercased and any
    /// leading `.` is dropped.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Add a single domain to the list.
    pub fn with_domain(mut self, domain: impl AsRef<str>) -> Self {
        self.domains.extend(Self::new([domain]).domains);
        self
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// `true` when the URL's host equals a listed domain or is a subdomain
    /// of one. Unparseable URLs return `false`.
    pub fn needs_proxy(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => parsed.host_str().is_some_and(|host| self.matches_host(host)),
            Err(_) => false,
        }
    }

    /// Hostname variant of [`needs_proxy`](Self::needs_proxy).
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }
}

impl Default for Denylist {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST)
    }
}

/// An embedding context that can try to load a page.
///
/// `load` resolves to `Ok(true)` only when the page loaded and its content is
/// readable from the embedding side, `Ok(false)` when it loaded but is
/// opaque, and `Err` on a load error. [`test_direct_embed`] calls
/// [`release`](Self::release) exactly once per `load`, on every exit path
/// including timeout.
///
/// # Implementing a custom probe
///
/// ```rust,no_run
/// use themalinks_viewer::{EmbedProbe, Result};
/// use url::Url;
///
/// struct AlwaysOpaque;
///
/// impl EmbedProbe for AlwaysOpaque {
///     async fn load(&self, _url: &Url) -> Result<bool> {
///         Ok(false)
///     }
/// }
/// ```
pub trait EmbedProbe: Send + Sync + 'static {
    /// Load `url` in a fresh embedding context.
    fn load(&self, url: &Url) -> impl Future<Output = Result<bool>> + Send;

    /// Tear down whatever [`load`](Self::load) set up for `url`.
    fn release(&self, _url: &Url) {}
}

/// Scope of one probe: releases the context when dropped.
struct ProbeSession<'a, P: EmbedProbe> {
    probe: &'a P,
    url: &'a Url,
}

impl<'a, P: EmbedProbe> ProbeSession<'a, P> {
    fn acquire(probe: &'a P, url: &'a Url) -> Self {
        Self { probe, url }
    }
}

impl<P: EmbedProbe> Drop for ProbeSession<'_, P> {
    fn drop(&mut self) {
        self.probe.release(self.url);
    }
}

/// Run one timed embedding test, reporting why it failed.
pub async fn probe_direct_embed<P: EmbedProbe>(
    probe: &P,
    url: &Url,
    timeout: Duration,
) -> Result<()> {
    let session = ProbeSession::acquire(probe, url);
    let outcome = tokio::time::timeout(timeout, session.probe.load(session.url)).await;
    drop(session);

    match outcome {
        Ok(Ok(true)) => Ok(()),
        Ok(Ok(false)) => Err(ViewerError::EmbedProbeBlocked(
            "content is not readable from the embedding page".into(),
        )),
        Ok(Err(e)) => Err(ViewerError::EmbedProbeBlocked(e.to_string())),
        Err(_) => Err(ViewerError::EmbedProbeTimeout(millis(timeout))),
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// `true` only when direct embedding of `url` was confirmed within `timeout`.
pub async fn test_direct_embed<P: EmbedProbe>(probe: &P, url: &Url, timeout: Duration) -> bool {
    match probe_direct_embed(probe, url, timeout).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Direct embed unavailable for {url}: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn timeout_millis_saturate() {
        assert_eq!(millis(Duration::from_millis(3000)), 3000);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn denylisted_host_needs_proxy() {
        let list = Denylist::default();
        assert!(list.needs_proxy("https://www.youtube.com/watch?v=abc"));
        assert!(list.needs_proxy("https://youtube.com/"));
        assert!(list.needs_proxy("https://fr.m.wikipedia.org/wiki/Rust"));
        assert!(list.needs_proxy("https://GITHUB.com/rust-lang"));
    }

    #[test]
    fn unrelated_host_does_not_need_proxy() {
        let list = Denylist::default();
        assert!(!list.needs_proxy("https://example.org/page"));
        assert!(!list.needs_proxy("https://notyoutube.com/"));
        assert!(!list.needs_proxy("https://youtube.com.evil.example/"));
    }

    #[test]
    fn unparseable_url_does_not_need_proxy() {
        let list = Denylist::default();
        assert!(!list.needs_proxy("not a url"));
        assert!(!list.needs_proxy(""));
    }

    #[test]
    fn custom_domains_are_normalized() {
        let list = Denylist::new([".Example.ORG "]).with_domain("tv.garden");
        assert_eq!(list.domains(), &["example.org", "tv.garden"]);
        assert!(list.needs_proxy("https://sub.example.org/"));
        assert!(list.needs_proxy("https://tv.garden"));
    }

    struct ScriptedProbe {
        verdict: Option<bool>,
        delay: Duration,
        loads: AtomicUsize,
        releases: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(verdict: Option<bool>, delay: Duration) -> Self {
            Self {
                verdict,
                delay,
                loads: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            }
        }
    }

    impl EmbedProbe for ScriptedProbe {
        async fn load(&self, _url: &Url) -> Result<bool> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.verdict
                .ok_or_else(|| ViewerError::Http("connection refused".into()))
        }

        fn release(&self, _url: &Url) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn target() -> Url {
        Url::parse("https://example.org/").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn readable_content_confirms_embed() {
        let probe = ScriptedProbe::new(Some(true), Duration::from_millis(10));
        assert!(test_direct_embed(&probe, &target(), Duration::from_secs(3)).await);
        assert_eq!(probe.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn opaque_content_is_blocked_and_released() {
        let probe = ScriptedProbe::new(Some(false), Duration::from_millis(10));
        let err = probe_direct_embed(&probe, &target(), Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, ViewerError::EmbedProbeBlocked(_)));
        assert_eq!(probe.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn load_error_is_blocked_and_released() {
        let probe = ScriptedProbe::new(None, Duration::from_millis(10));
        assert!(!test_direct_embed(&probe, &target(), Duration::from_secs(3)).await);
        assert_eq!(probe.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_releases_context() {
        let probe = ScriptedProbe::new(Some(true), Duration::from_secs(60));
        let err = probe_direct_embed(&probe, &target(), Duration::from_millis(3000))
            .await
            .unwrap_err();
        assert_eq!(err, ViewerError::EmbedProbeTimeout(3000));
        assert_eq!(probe.loads.load(Ordering::SeqCst), 1);
        assert_eq!(probe.releases.load(Ordering::SeqCst), 1);
    }
}
