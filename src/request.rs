//! Load requests, their results, and the catalog link they originate from.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::endpoint::parse_target;
use crate::error::{Result, ViewerError};

/// How the catalog wants a link to be opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMode {
    /// Open inside the in-app viewer.
    Webview,
    /// Any other value: plain external navigation.
    #[default]
    #[serde(other)]
    External,
}

/// A catalog entry, as supplied by the surrounding application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub integration_mode: IntegrationMode,
}

impl Link {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            integration_mode: IntegrationMode::Webview,
        }
    }

    pub fn opens_in_viewer(&self) -> bool {
        self.integration_mode == IntegrationMode::Webview
    }
}

/// Identity of one load request within a viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(pub u64);

/// Result of the embeddability decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    #[default]
    Unknown,
    Direct,
    Proxied,
}

/// One attempt at showing a URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    id: RequestId,
    target: Url,
    attempt_count: u32,
    mode: LoadMode,
}

impl LoadRequest {
    /// Create a request for `target`, failing with
    /// [`ViewerError::InvalidUrl`] unless it is an absolute http(s) URL.
    pub fn new(id: RequestId, target: &str) -> Result<Self> {
        Ok(Self {
            id,
            target: parse_target(target)?,
            attempt_count: 0,
            mode: LoadMode::Unknown,
        })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn target_url(&self) -> &Url {
        &self.target
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Carry the attempt count of a previous request for the same link.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempt_count = attempts;
        self
    }

    /// Record the start of a load attempt.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt_count += 1;
        self.attempt_count
    }

    /// Fix the mode once. Returns `false` (and keeps the current mode) if it
    /// was already resolved or `mode` is [`LoadMode::Unknown`].
    pub fn resolve_mode(&mut self, mode: LoadMode) -> bool {
        if self.mode != LoadMode::Unknown || mode == LoadMode::Unknown {
            return false;
        }
        self.mode = mode;
        true
    }
}

/// What a load produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page can be embedded natively; nothing was fetched.
    Direct,
    /// Raw HTML fetched through a proxy.
    Proxied { content: String },
    Failed(ViewerError),
}

/// Outcome of resolving one [`LoadRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadResult {
    pub request_id: RequestId,
    pub outcome: LoadOutcome,
    /// Name of the endpoint that produced proxied content.
    pub used_endpoint: Option<String>,
    /// Number of proxy endpoint attempts made.
    pub attempts: usize,
}

impl LoadResult {
    pub(crate) fn direct(request_id: RequestId) -> Self {
        Self {
            request_id,
            outcome: LoadOutcome::Direct,
            used_endpoint: None,
            attempts: 0,
        }
    }

    pub(crate) fn failed(request_id: RequestId, error: ViewerError, attempts: usize) -> Self {
        Self {
            request_id,
            outcome: LoadOutcome::Failed(error),
            used_endpoint: None,
            attempts,
        }
    }

    pub fn success(&self) -> bool {
        !matches!(self.outcome, LoadOutcome::Failed(_))
    }

    pub fn mode(&self) -> LoadMode {
        match self.outcome {
            LoadOutcome::Direct => LoadMode::Direct,
            LoadOutcome::Proxied { .. } => LoadMode::Proxied,
            LoadOutcome::Failed(_) => LoadMode::Unknown,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match &self.outcome {
            LoadOutcome::Proxied { content } => Some(content),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ViewerError> {
        match &self.outcome {
            LoadOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}
