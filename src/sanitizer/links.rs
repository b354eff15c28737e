//! Pass that rewrites link, image and stylesheet URLs against the page URL.

use url::Url;

use super::DocumentPass;
use super::document::{Document, ElementData};

pub const NEW_TAB_TARGET: &str = "_blank";
pub const NO_REFERRER_REL: &str = "noopener noreferrer";

/// Schemes that execute code when followed.
const SCRIPT_SCHEMES: &[&str] = &["javascript", "vbscript"];

/// Pass that makes every `href`/`src` it handles absolute.
///
/// - `<a href>`: resolved against the base and marked to open in a new,
///   unlinked browsing context. Unresolvable or script URLs lose the `href`.
/// - `<img src>`: resolved unless it is a `data:` URI. Unresolvable URLs
///   lose the `src`.
/// - `<link rel="stylesheet" href>`: resolved. Unresolvable stylesheets are
///   removed entirely.
/// - any other `href`/`src` (`<area>`, `<source>`, icons, ...): resolved,
///   or dropped when unresolvable.
#[derive(Clone, Copy, Debug, Default)]
pub struct RewriteUrls;

impl DocumentPass for RewriteUrls {
    fn apply(&self, document: &mut Document, base: &Url) {
        let mut dropped_stylesheets = Vec::new();

        for id in document.elements() {
            document.with_element_mut(id, |el| {
                if el.is("a") {
                    rewrite_anchor(el, base);
                } else if el.is("img") {
                    rewrite_image(el, base);
                } else if el.is("link") && is_stylesheet(el) {
                    if !rewrite_stylesheet(el, base) {
                        dropped_stylesheets.push(id);
                    }
                } else {
                    rewrite_other(el, base);
                }
            });
        }

        for id in dropped_stylesheets {
            document.remove(id);
        }
    }
}

fn resolve(base: &Url, value: &str) -> Option<Url> {
    base.join(value.trim()).ok()
}

fn rewrite_anchor(el: &mut ElementData, base: &Url) {
    let Some(href) = el.attr("href").map(str::to_owned) else {
        return;
    };

    match resolve(base, &href) {
        Some(url) if !SCRIPT_SCHEMES.contains(&url.scheme()) => {
            el.set_attr("href", url.as_str());
            el.set_attr("target", NEW_TAB_TARGET);
            el.set_attr("rel", NO_REFERRER_REL);
        }
        _ => {
            tracing::debug!("Dropping unusable anchor href {href:?}");
            el.remove_attr("href");
        }
    }
}

fn rewrite_image(el: &mut ElementData, base: &Url) {
    let Some(src) = el.attr("src").map(str::to_owned) else {
        return;
    };
    if src.trim_start().to_ascii_lowercase().starts_with("data:") {
        return;
    }

    match resolve(base, &src) {
        Some(url) => el.set_attr("src", url.as_str()),
        None => {
            el.remove_attr("src");
        }
    }
}

fn rewrite_other(el: &mut ElementData, base: &Url) {
    for attr in ["href", "src"] {
        let Some(value) = el.attr(attr).map(str::to_owned) else {
            continue;
        };
        if value.trim_start().to_ascii_lowercase().starts_with("data:") {
            continue;
        }
        match resolve(base, &value) {
            Some(url) if !SCRIPT_SCHEMES.contains(&url.scheme()) => el.set_attr(attr, url.as_str()),
            _ => {
                el.remove_attr(attr);
            }
        }
    }
}

fn is_stylesheet(el: &ElementData) -> bool {
    el.attr("rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}

/// Returns `false` when the stylesheet should be dropped.
fn rewrite_stylesheet(el: &mut ElementData, base: &Url) -> bool {
    let Some(href) = el.attr("href").map(str::to_owned) else {
        return true;
    };
    match resolve(base, &href) {
        Some(url) => {
            el.set_attr("href", url.as_str());
            true
        }
        None => false,
    }
}
