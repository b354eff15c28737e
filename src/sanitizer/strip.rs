//! Passes that remove executable or re-embedding content.

use url::Url;

use super::DocumentPass;
use super::document::Document;

/// Elements removed by [`StripElements::default`].
pub const DANGEROUS_ELEMENTS: &[&str] = &["script", "iframe", "object", "embed", "applet", "form"];

/// Pass that removes every element with one of the given tag names,
/// together with its content.
///
/// # Example
///
/// ```
/// use themalinks_viewer::{HtmlSanitizer, StripElements};
/// use url::Url;
///
/// let mut sanitizer = HtmlSanitizer::empty();
/// sanitizer.add(StripElements::new(vec!["script", "noscript"]));
/// let base = Url::parse("https://example.org/").unwrap();
/// let out = sanitizer.sanitize("<script>alert(1)</script><p>ok</p>", &base);
/// assert!(!out.contains("alert"));
/// ```
#[derive(Clone, Debug)]
pub struct StripElements {
    names: Vec<String>,
}

impl StripElements {
    pub fn new(names: Vec<&str>) -> Self {
        Self {
            names: names.into_iter().map(str::to_ascii_lowercase).collect(),
        }
    }
}

impl Default for StripElements {
    fn default() -> Self {
        Self::new(DANGEROUS_ELEMENTS.to_vec())
    }
}

impl DocumentPass for StripElements {
    fn apply(&self, document: &mut Document, _base: &Url) {
        let doomed: Vec<_> = document
            .elements()
            .into_iter()
            .filter(|id| {
                document
                    .element(*id)
                    .is_some_and(|el| self.names.iter().any(|n| el.is(n)))
            })
            .collect();

        for id in &doomed {
            document.remove(*id);
        }
        if !doomed.is_empty() {
            tracing::debug!("Removed {} unsafe elements", doomed.len());
        }
    }
}

/// Pass that drops inline event-handler attributes (`onclick`, `onload`, ...).
#[derive(Clone, Copy, Debug, Default)]
pub struct StripEventHandlers;

impl DocumentPass for StripEventHandlers {
    fn apply(&self, document: &mut Document, _base: &Url) {
        for id in document.elements() {
            document.with_element_mut(id, |el| {
                el.retain_attrs(|name, _| !name.to_ascii_lowercase().starts_with("on"));
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(pass: &impl DocumentPass, html: &str) -> String {
        let mut doc = Document::parse(html).unwrap();
        pass.apply(&mut doc, &Url::parse("https://example.org/").unwrap());
        doc.serialize()
    }

    #[test]
    fn removes_all_dangerous_elements() {
        let out = run(
            &StripElements::default(),
            concat!(
                r#"<head><script src="a.js"></script></head><body>"#,
                r#"<iframe src="https://ads.example"></iframe>"#,
                r#"<object data="x.swf"></object><embed src="y.swf">"#,
                r#"<applet code="Z.class"></applet>"#,
                r#"<form action="/login"><input name="pw"></form>"#,
                r#"<p>kept</p></body>"#,
            ),
        );
        for tag in DANGEROUS_ELEMENTS {
            assert!(!out.contains(&format!("<{tag}")), "{tag} survived: {out}");
        }
        assert!(!out.contains("<input"));
        assert!(out.contains("<p>kept</p>"));
    }

    #[test]
    fn removes_nested_scripts() {
        let out = run(
            &StripElements::default(),
            "<div><section><script>steal()</script><b>bold</b></section></div>",
        );
        assert!(!out.contains("steal"));
        assert!(out.contains("<b>bold</b>"));
    }

    #[test]
    fn custom_names_only() {
        let out = run(
            &StripElements::new(vec!["NAV"]),
            "<nav>menu</nav><script>x()</script>",
        );
        assert!(!out.contains("menu"));
        assert!(out.contains("<script>x()</script>"));
    }

    #[test]
    fn event_handlers_are_dropped() {
        let out = run(
            &StripEventHandlers,
            r#"<body onload="boot()"><img src="a.png" onerror="pwn()" alt="a"><p onClick="x()">t</p></body>"#,
        );
        assert!(!out.contains("boot"));
        assert!(!out.contains("pwn"));
        assert!(!out.to_ascii_lowercase().contains("onclick"));
        assert!(out.contains(r#"<img src="a.png" alt="a">"#));
    }
}
