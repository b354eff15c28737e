//! HTML sanitizer for proxied pages.
//!
//! Raw HTML is parsed into a [`Document`] and run through an ordered chain of
//! [`DocumentPass`]es held by an [`HtmlSanitizer`], then serialized again.
//!
//! Built-in passes, in the order [`HtmlSanitizer::new`] runs them:
//!
//! - [`StripElements`] -- removes scripts, nested frames, plugins and forms.
//! - [`StripEventHandlers`] -- drops inline `on*` attributes.
//! - [`RewriteUrls`] -- absolutizes links, images and stylesheets.
//! - [`InjectBaseStyle`] -- adds the readable base stylesheet.
//! - [`InsertBanner`] -- adds the provenance banner.

mod banner;
mod document;
mod links;
mod strip;

pub use banner::{BANNER_CLASS, InjectBaseStyle, InsertBanner};
pub use document::{Document, DomNode, ElementData};
pub use links::RewriteUrls;
pub use strip::{DANGEROUS_ELEMENTS, StripElements, StripEventHandlers};

use url::Url;

use crate::error::Result;

/// A single in-place transformation of a parsed document.
///
/// Passes must be deterministic and free of I/O. Implementations must be
/// `Send + Sync` so one sanitizer can be shared between viewers.
pub trait DocumentPass: Send + Sync {
    /// Transform `document`, resolving relative references against `base`.
    fn apply(&self, document: &mut Document, base: &Url);
}

/// An ordered chain of [`DocumentPass`]es applied to one parsed document.
pub struct HtmlSanitizer {
    passes: Vec<Box<dyn DocumentPass>>,
}

impl HtmlSanitizer {
    /// The standard pipeline for proxied content.
    pub fn new() -> Self {
        let mut sanitizer = Self::empty();
        sanitizer.add(StripElements::default());
        sanitizer.add(StripEventHandlers);
        sanitizer.add(RewriteUrls);
        sanitizer.add(InjectBaseStyle);
        sanitizer.add(InsertBanner);
        sanitizer
    }

    /// A pipeline with no passes; it only normalizes the markup.
    pub fn empty() -> Self {
        Self { passes: Vec::new() }
    }

    /// Append a pass to the end of the pipeline.
    pub fn add(&mut self, pass: impl DocumentPass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Returns `true` if no passes have been added.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run every pass over `html`, surfacing parse failures.
    pub fn try_sanitize(&self, html: &str, base: &Url) -> Result<String> {
        let mut document = Document::parse(html)?;
        for pass in &self.passes {
            pass.apply(&mut document, base);
        }
        Ok(document.serialize())
    }

    /// Run every pass over `html`.
    ///
    /// Never fails: if the HTML cannot be parsed, a minimal error page linking
    /// to `base` is returned instead.
    pub fn sanitize(&self, html: &str, base: &Url) -> String {
        self.try_sanitize(html, base).unwrap_or_else(|e| {
            tracing::warn!("Sanitizing content from {base} failed, serving fallback page: {e}");
            fallback_document(base)
        })
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal page shown when fetched content cannot be processed.
pub fn fallback_document(base: &Url) -> String {
    let mut href = String::new();
    document::escape_into(base.as_str(), true, &mut href);
    format!(
        concat!(
            "<html><head><title>Processing error</title>",
            "<style>body {{ font-family: Arial, sans-serif; padding: 20px; }}",
            " .error {{ background: #fee; border: 1px solid #fcc; padding: 15px; border-radius: 5px; }}</style>",
            "</head><body><div class=\"error\">",
            "<h3>The content could not be processed</h3>",
            "<p>The page was fetched but could not be displayed safely.</p>",
            "<p><a href=\"{href}\" target=\"_blank\" rel=\"noopener noreferrer\">Open the original source</a></p>",
            "</div></body></html>"
        ),
        href = href
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://site.example").unwrap()
    }

    #[test]
    fn pipeline_default_is_standard() {
        assert!(!HtmlSanitizer::default().is_empty());
        assert!(HtmlSanitizer::empty().is_empty());
    }

    #[test]
    fn empty_pipeline_only_normalizes() {
        let out = HtmlSanitizer::empty().sanitize("<p>x</p>", &base());
        assert_eq!(out, "<html><head></head><body><p>x</p></body></html>");
    }

    #[test]
    fn script_removed_anchor_resolved_banner_first() {
        let out = HtmlSanitizer::new().sanitize(
            r#"<html><body><script>alert(1)</script><a href="/p">x</a></body></html>"#,
            &base(),
        );
        assert!(!out.contains("<script"));
        assert!(!out.contains("alert(1)"));
        assert!(out.contains(
            r#"<a href="https://site.example/p" target="_blank" rel="noopener noreferrer">x</a>"#
        ));
        let banner_at = out.find(r#"<div class="themalinks-proxy-notice">"#).unwrap();
        let anchor_at = out.find(r#"href="https://site.example/p""#).unwrap();
        assert!(banner_at < anchor_at);
        assert!(out.contains(r#"<body><div class="themalinks-proxy-notice">"#));
    }

    #[test]
    fn script_and_iframe_removed_relative_anchor_resolved() {
        let out = HtmlSanitizer::new().sanitize(
            concat!(
                r#"<p>intro</p><script src="/track.js"></script>"#,
                r#"<iframe src="https://embed.example/"></iframe><a href="/x">x</a>"#,
            ),
            &Url::parse("https://news.example/articles/1").unwrap(),
        );
        assert!(!out.contains("<script"));
        assert!(!out.contains("<iframe"));
        assert!(out.contains(r#"href="https://news.example/x""#));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let sanitizer = HtmlSanitizer::new();
        let once = sanitizer.sanitize(
            concat!(
                r#"<!DOCTYPE html><html><head><title>T &amp; U</title>"#,
                r#"<link rel="stylesheet" href="s.css"></head>"#,
                r#"<body><h1>Hello</h1><a href="/p">p</a> <img src="i.png">"#,
                r#"<p>a&nbsp;b &lt;c&gt;</p></body></html>"#,
            ),
            &base(),
        );
        let twice = sanitizer.sanitize(&once, &base());
        assert_eq!(once, twice);
        assert_eq!(twice.matches(r#"class="themalinks-proxy-notice""#).count(), 1);
        assert_eq!(twice.matches("<style").count(), 1);
    }

    #[test]
    fn unparseable_document_gets_fallback_page() {
        let out = HtmlSanitizer::new().sanitize(
            r#"<html><head></head><frameset><frame src="a.html"></frameset></html>"#,
            &base(),
        );
        assert_eq!(out, fallback_document(&base()));
        assert!(out.contains(r#"<a href="https://site.example/""#));
    }

    #[test]
    fn try_sanitize_reports_parse_error() {
        let err = HtmlSanitizer::new()
            .try_sanitize(r#"<frameset><frame src="a.html"></frameset>"#, &base())
            .unwrap_err();
        assert!(matches!(err, crate::ViewerError::SanitizeParse(_)));
    }

    #[test]
    fn custom_pass_runs_after_standard_ones() {
        struct DropImages;
        impl DocumentPass for DropImages {
            fn apply(&self, document: &mut Document, _base: &Url) {
                for id in document.elements_named("img") {
                    document.remove(id);
                }
            }
        }

        let mut sanitizer = HtmlSanitizer::new();
        sanitizer.add(DropImages);
        let out = sanitizer.sanitize(r#"<img src="a.png"><p>text</p>"#, &base());
        assert!(!out.contains("<img"));
        assert!(out.contains("<p>text</p>"));
    }
}
