//! # themalinks_viewer
//!
//! Client-side web content viewer for the ThemaLinks catalog: decides whether
//! an external page can be embedded directly, otherwise fetches it through a
//! rotation of public CORS proxies and sanitizes the HTML for inline display.
//!
//! ## Overview
//!
//! A [`Viewer`] drives one link at a time through a small state machine
//! ([`ViewerState`]). For each load it asks the [`FetchOrchestrator`] to:
//!
//! 1. skip probing for hosts on the [`Denylist`], or run the [`EmbedProbe`]
//!    under a timeout;
//! 2. if direct embedding is unavailable, GET the page through the
//!    [`EndpointRegistry`], advancing a shared [`EndpointCursor`] after each
//!    failed endpoint;
//! 3. hand proxied HTML to the [`HtmlSanitizer`].
//!
//! Network access goes through two traits, [`PageFetcher`] and
//! [`EmbedProbe`], with `reqwest`-backed implementations
//! ([`ReqwestFetcher`], [`HeaderProbe`]).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use themalinks_viewer::{HttpConfig, Link, ViewerBuilder, ViewerState};
//!
//! # async fn example() -> themalinks_viewer::Result<()> {
//! let viewer = ViewerBuilder::from_http(&HttpConfig::default())?.build()?;
//!
//! viewer.open(&Link::new("Example", "https://example.org")).await;
//!
//! let snapshot = viewer.snapshot();
//! match snapshot.state {
//!     ViewerState::DirectReady => println!("embed {}", snapshot.url.unwrap_or_default()),
//!     ViewerState::ContentReady => println!("{}", snapshot.content.unwrap_or_default()),
//!     _ => println!("failed: {:?}", snapshot.error),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | **yes** | Builds the `themalinks-viewer` binary. |
//! | `rustls-tls` | no | Use `rustls` instead of the platform TLS for `reqwest`. |

pub mod config;
pub mod endpoint;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod probe;
pub mod request;
pub mod sanitizer;
pub mod viewer;

pub use config::{HttpConfig, ViewerBuilder, ViewerConfig};
pub use endpoint::{EndpointCursor, EndpointRegistry, ProxyEndpoint, UrlFormat, parse_target};
pub use error::{Result, ViewerError};
pub use fetch::{FetchedPage, PageFetcher, ReqwestFetcher};
pub use orchestrator::FetchOrchestrator;
pub use probe::{Denylist, EmbedProbe, HeaderProbe, probe_direct_embed, test_direct_embed};
pub use request::{IntegrationMode, LoadMode, LoadOutcome, LoadRequest, LoadResult, Link, RequestId};
pub use sanitizer::{
    DocumentPass, HtmlSanitizer, InjectBaseStyle, InsertBanner, RewriteUrls, StripElements,
    StripEventHandlers,
};
pub use viewer::{Route, Viewer, ViewerSnapshot, ViewerState};
