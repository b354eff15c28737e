//! The viewer controller: a state machine that drives one link at a time
//! through the probe, the proxy and the sanitizer.
//!
//! The UI observes a [`ViewerSnapshot`], either by polling
//! [`Viewer::snapshot`] or through the `watch` channel returned by
//! [`Viewer::subscribe`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{AbortHandle, AbortRegistration, Abortable};
use serde::{Serialize, Serializer};
use tokio::sync::watch;

use crate::error::ViewerError;
use crate::fetch::PageFetcher;
use crate::orchestrator::FetchOrchestrator;
use crate::probe::EmbedProbe;
use crate::request::{LoadMode, LoadOutcome, LoadRequest, LoadResult, Link, RequestId};
use crate::sanitizer::HtmlSanitizer;

/// States of the viewer.
///
/// ```text
/// idle -> detecting -> direct_ready  -> failed
///                   -> proxy_loading -> content_ready | failed
/// ```
///
/// Any state may go back to `detecting` (open, retry) or to `idle` (close).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerState {
    #[default]
    Idle,
    Detecting,
    DirectReady,
    ProxyLoading,
    ContentReady,
    Failed,
}

impl ViewerState {
    pub fn can_transition_to(self, next: ViewerState) -> bool {
        use ViewerState::*;

        match (self, next) {
            (_, Idle | Detecting) => true,
            (Detecting, DirectReady | ProxyLoading | Failed) => true,
            (ProxyLoading, ContentReady | Failed) => true,
            (DirectReady, Failed) => true,
            _ => false,
        }
    }

    /// `true` while a load is in flight.
    pub fn is_loading(self) -> bool {
        matches!(self, ViewerState::Detecting | ViewerState::ProxyLoading)
    }
}

/// What the UI renders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ViewerSnapshot {
    pub state: ViewerState,
    /// Original URL of the current link.
    pub url: Option<String>,
    /// Sanitized HTML, set in [`ViewerState::ContentReady`].
    pub content: Option<String>,
    #[serde(serialize_with = "error_message")]
    pub error: Option<ViewerError>,
    pub used_endpoint: Option<String>,
    /// Proxy endpoint attempts made by the last load.
    pub attempts: usize,
}

fn error_message<S: Serializer>(
    error: &Option<ViewerError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Where the application should send a link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// The viewer took the link.
    Viewer,
    /// Open this URL with plain external navigation.
    External(String),
}

struct Session {
    snapshot: ViewerSnapshot,
    link: Option<Link>,
    request: Option<LoadRequest>,
    in_flight: Option<AbortHandle>,
    next_id: u64,
}

impl Session {
    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }

    fn transition(&mut self, next: ViewerState) -> bool {
        let current = self.snapshot.state;
        if !current.can_transition_to(next) {
            tracing::warn!("Rejected viewer transition {current:?} -> {next:?}");
            return false;
        }
        tracing::debug!("Viewer {current:?} -> {next:?}");
        self.snapshot.state = next;
        true
    }

    fn is_current(&self, id: RequestId) -> bool {
        self.request.as_ref().is_some_and(|r| r.id() == id)
    }

    fn fail(&mut self, error: ViewerError) {
        if self.transition(ViewerState::Failed) {
            tracing::info!("Viewer failed: {error}");
            self.snapshot.content = None;
            self.snapshot.error = Some(error);
        }
    }
}

struct Shared<F, P> {
    orchestrator: FetchOrchestrator<F, P>,
    sanitizer: HtmlSanitizer,
    session: Mutex<Session>,
    updates: watch::Sender<ViewerSnapshot>,
}

/// Viewer controller for a single display surface.
///
/// Cheap to clone; clones drive the same session. Opening a new link or
/// closing the viewer aborts the load in flight, so it stops issuing requests
/// and moving the endpoint cursor. A result that still slips through is
/// discarded by request id.
pub struct Viewer<F, P> {
    shared: Arc<Shared<F, P>>,
}

impl<F, P> Clone for Viewer<F, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: PageFetcher, P: EmbedProbe> Viewer<F, P> {
    pub(crate) fn new(orchestrator: FetchOrchestrator<F, P>, sanitizer: HtmlSanitizer) -> Self {
        let (updates, _) = watch::channel(ViewerSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                orchestrator,
                sanitizer,
                session: Mutex::new(Session {
                    snapshot: ViewerSnapshot::default(),
                    link: None,
                    request: None,
                    in_flight: None,
                    next_id: 0,
                }),
                updates,
            }),
        }
    }

    pub fn orchestrator(&self) -> &FetchOrchestrator<F, P> {
        &self.shared.orchestrator
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn state(&self) -> ViewerState {
        self.lock().snapshot.state
    }

    /// Receive every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<ViewerSnapshot> {
        self.shared.updates.subscribe()
    }

    /// The original, unproxied URL of the current link, for "open externally".
    pub fn external_url(&self) -> Option<String> {
        self.lock().link.as_ref().map(|link| link.url.clone())
    }

    /// Open `link`, running the whole pipeline from the probe stage.
    ///
    /// Links that are not in webview mode are handed back as
    /// [`Route::External`] and leave the viewer untouched.
    pub async fn open(&self, link: &Link) -> Route {
        if !link.opens_in_viewer() {
            tracing::debug!("{} opens externally", link.url);
            return Route::External(link.url.clone());
        }
        self.load(link.clone(), 0, false).await;
        Route::Viewer
    }

    /// Reload the current link with a fresh attempt counter.
    pub async fn refresh(&self) {
        let link = self.lock().link.clone();
        match link {
            Some(link) => self.load(link, 0, false).await,
            None => tracing::debug!("Nothing to refresh"),
        }
    }

    /// Return to idle, dropping the current request and content.
    ///
    /// A load still in flight is aborted at its next suspension point.
    pub fn close(&self) {
        let mut session = self.lock();
        session.abort_in_flight();
        session.transition(ViewerState::Idle);
        session.link = None;
        session.request = None;
        session.snapshot = ViewerSnapshot::default();
        self.publish(&session);
    }

    /// Report that the direct embed failed after the probe accepted it.
    ///
    /// While attempts remain the link is reloaded through the proxy without
    /// probing again; otherwise the viewer fails with
    /// [`ViewerError::EmbedFailed`].
    pub async fn embed_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let max_attempts = self.shared.orchestrator.config().max_direct_attempts;

        let retry = {
            let mut session = self.lock();
            if session.snapshot.state != ViewerState::DirectReady {
                tracing::debug!("Ignoring embed failure outside direct mode: {reason}");
                return;
            }
            let attempts = session.request.as_ref().map_or(0, |r| r.attempt_count());
            match session.link.clone() {
                Some(link) if attempts < max_attempts => Some((link, attempts)),
                _ => {
                    session.fail(ViewerError::EmbedFailed(reason.clone()));
                    self.publish(&session);
                    None
                }
            }
        };

        if let Some((link, attempts)) = retry {
            tracing::warn!("Direct embed of {} failed ({reason}), retrying through the proxy", link.url);
            self.load(link, attempts, true).await;
        }
    }

    /// Start a new load, aborting the one in flight.
    async fn load(&self, link: Link, attempts: u32, force_proxy: bool) {
        let (request, registration) = {
            let mut session = self.lock();
            session.abort_in_flight();
            session.next_id += 1;
            let id = RequestId(session.next_id);

            session.transition(ViewerState::Detecting);
            session.snapshot = ViewerSnapshot {
                state: ViewerState::Detecting,
                url: Some(link.url.clone()),
                ..ViewerSnapshot::default()
            };
            session.link = Some(link.clone());
            session.request = None;

            match LoadRequest::new(id, &link.url) {
                Ok(request) => {
                    let mut request = request.with_attempts(attempts);
                    request.begin_attempt();
                    if force_proxy {
                        request.resolve_mode(LoadMode::Proxied);
                    }
                    let (handle, registration) = AbortHandle::new_pair();
                    session.in_flight = Some(handle);
                    session.request = Some(request.clone());
                    self.publish(&session);
                    (request, registration)
                }
                Err(e) => {
                    session.fail(e);
                    self.publish(&session);
                    return;
                }
            }
        };

        self.run(request, link, registration).await;
    }

    async fn run(&self, request: LoadRequest, link: Link, registration: AbortRegistration) {
        let id = request.id();
        if Abortable::new(self.drive(request, link), registration)
            .await
            .is_err()
        {
            tracing::debug!("Load {id:?} aborted");
        }
    }

    async fn drive(&self, request: LoadRequest, link: Link) {
        let mode = match request.mode() {
            LoadMode::Unknown => self.shared.orchestrator.decide_mode(&request).await,
            mode => mode,
        };

        {
            let mut session = self.lock();
            if !session.is_current(request.id()) {
                tracing::debug!("Discarding probe result of superseded request {:?}", request.id());
                return;
            }
            if let Some(current) = session.request.as_mut() {
                current.resolve_mode(mode);
            }
            let next = match mode {
                LoadMode::Direct => ViewerState::DirectReady,
                LoadMode::Proxied | LoadMode::Unknown => ViewerState::ProxyLoading,
            };
            session.transition(next);
            self.publish(&session);
            if next == ViewerState::DirectReady {
                tracing::info!("Embedding {} directly", link.url);
                return;
            }
        }

        let result = self.shared.orchestrator.fetch_proxied(&request).await;
        self.finish(&request, result);
    }

    fn finish(&self, request: &LoadRequest, result: LoadResult) {
        if !self.lock().is_current(result.request_id) {
            tracing::debug!("Discarding result of superseded request {:?}", result.request_id);
            return;
        }

        let sanitized = match &result.outcome {
            LoadOutcome::Proxied { content } => Some(
                self.shared
                    .sanitizer
                    .sanitize(content, request.target_url()),
            ),
            _ => None,
        };

        let mut session = self.lock();
        if !session.is_current(result.request_id) {
            return;
        }
        session.snapshot.attempts = result.attempts;
        match result.outcome {
            LoadOutcome::Failed(e) => session.fail(e),
            _ => {
                if let Some(content) = sanitized {
                    if session.transition(ViewerState::ContentReady) {
                        session.snapshot.content = Some(content);
                        session.snapshot.used_endpoint = result.used_endpoint;
                    }
                }
            }
        }
        self.publish(&session);
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.shared
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: &Session) {
        self.shared.updates.send_replace(session.snapshot.clone());
    }
}
