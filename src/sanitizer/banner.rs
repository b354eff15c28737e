//! Passes that brand proxied content: base stylesheet and provenance banner.

use url::Url;

use super::DocumentPass;
use super::document::{Document, DomNode, ElementData};
use super::links::{NEW_TAB_TARGET, NO_REFERRER_REL};

/// Class of the injected provenance banner.
pub const BANNER_CLASS: &str = "themalinks-proxy-notice";

/// Marker attribute identifying the injected stylesheet.
const STYLE_MARKER: (&str, &str) = ("data-themalinks", "base-style");

const BANNER_TITLE: &str = "Content loaded through the ThemaLinks proxy";

const BASE_CSS: &str = r#"
body {
  margin: 0;
  padding: 20px;
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
  line-height: 1.6;
  color: #333;
  background: #fff;
  overflow-x: hidden;
}
* { max-width: 100%; }
a { color: #007bff; text-decoration: none; }
a:hover { text-decoration: underline; }
img { max-width: 100%; height: auto; display: block; }
.themalinks-proxy-notice {
  background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
  color: white;
  border-radius: 8px;
  padding: 15px;
  margin-bottom: 20px;
  font-size: 14px;
  box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1);
}
.themalinks-proxy-notice a { color: #fff; text-decoration: underline; }
.themalinks-proxy-notice strong { display: block; margin-bottom: 5px; }
"#;

/// Pass that appends the base `<style>` block to `<head>` once.
///
/// A marked `<style>` only counts as ours when it sits in `<head>` and holds
/// exactly the base stylesheet.
#[derive(Clone, Copy, Debug, Default)]
pub struct InjectBaseStyle;

impl DocumentPass for InjectBaseStyle {
    fn apply(&self, document: &mut Document, _base: &Url) {
        let Some(head) = document.head() else {
            tracing::warn!("Document has no <head>, skipping base style");
            return;
        };

        let already_styled = document.elements_named("style").into_iter().any(|id| {
            document.parent(id) == Some(head)
                && document
                    .element(id)
                    .is_some_and(|el| el.attr(STYLE_MARKER.0) == Some(STYLE_MARKER.1))
                && document.text_content(id) == BASE_CSS
        });
        if already_styled {
            return;
        }
        let style = ElementData::new("style").with_attr(STYLE_MARKER.0, STYLE_MARKER.1);
        if let Some(style_id) = document.append_child(head, DomNode::Element(style)) {
            document.append_child(style_id, DomNode::Text(BASE_CSS.to_string()));
        }
    }
}

/// Pass that inserts the provenance banner as the first child of `<body>`.
///
/// A body whose first element already is a banner linking to `base` is left
/// alone; a look-alike pointing anywhere else does not count.
#[derive(Clone, Copy, Debug, Default)]
pub struct InsertBanner;

impl DocumentPass for InsertBanner {
    fn apply(&self, document: &mut Document, base: &Url) {
        let Some(body) = document.body() else {
            return;
        };
        let source = base.as_str();
        let has_banner = document.first_element_child(body).is_some_and(|first| {
            document
                .element(first)
                .is_some_and(|el| el.is("div") && el.has_class(BANNER_CLASS))
                && document
                    .elements_named_within(first, "a")
                    .into_iter()
                    .any(|a| document.element(a).and_then(|el| el.attr("href")) == Some(source))
        });
        if has_banner {
            return;
        }

        let Some(banner) = document.prepend_child(
            body,
            DomNode::Element(ElementData::new("div").with_attr("class", BANNER_CLASS)),
        ) else {
            return;
        };
        if let Some(title) = document.append_child(banner, DomNode::Element(ElementData::new("strong"))) {
            document.append_child(title, DomNode::Text(BANNER_TITLE.to_string()));
        }
        document.append_child(banner, DomNode::Text("Source: ".to_string()));
        let link = ElementData::new("a")
            .with_attr("href", source)
            .with_attr("target", NEW_TAB_TARGET)
            .with_attr("rel", NO_REFERRER_REL);
        if let Some(link_id) = document.append_child(banner, DomNode::Element(link)) {
            document.append_child(link_id, DomNode::Text(source.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://site.example/a?b=1&c=<2>").unwrap()
    }

    #[test]
    fn style_injected_once() {
        let mut doc = Document::parse("<p>x</p>").unwrap();
        InjectBaseStyle.apply(&mut doc, &base());
        InjectBaseStyle.apply(&mut doc, &base());
        let out = doc.serialize();
        assert_eq!(out.matches("<style").count(), 1);
        assert!(out.contains("* { max-width: 100%; }"));
        assert!(out.contains(r#"<head><style data-themalinks="base-style">"#));
    }

    #[test]
    fn banner_is_first_body_child() {
        let mut doc = Document::parse("<body>\n<h1>Title</h1></body>").unwrap();
        InsertBanner.apply(&mut doc, &base());
        let out = doc.serialize();
        let banner_at = out.find(BANNER_CLASS).unwrap();
        let title_at = out.find("<h1>").unwrap();
        assert!(banner_at < title_at);
        assert!(out.contains(r#"<body><div class="themalinks-proxy-notice">"#));
    }

    #[test]
    fn banner_link_escapes_source() {
        let mut doc = Document::parse("<p>x</p>").unwrap();
        InsertBanner.apply(&mut doc, &base());
        let out = doc.serialize();
        let source = base().to_string();
        assert!(out.contains(&format!(
            r#"<a href="{}" target="_blank" rel="noopener noreferrer">"#,
            source.replace('&', "&amp;")
        )));
        assert!(!out.contains("&c=<2>"));
    }

    #[test]
    fn banner_not_duplicated() {
        let mut doc = Document::parse("<p>x</p>").unwrap();
        InsertBanner.apply(&mut doc, &base());
        InsertBanner.apply(&mut doc, &base());
        assert_eq!(doc.serialize().matches(BANNER_CLASS).count(), 1);
    }

    #[test]
    fn look_alike_banner_does_not_replace_ours() {
        let mut doc = Document::parse(concat!(
            r#"<body><div class="themalinks-proxy-notice"><strong>Verified</strong>"#,
            r#"<a href="https://trusted-bank.example/">trusted-bank</a></div><p>x</p></body>"#,
        ))
        .unwrap();
        let base = Url::parse("https://real.example/").unwrap();
        InsertBanner.apply(&mut doc, &base);

        let out = doc.serialize();
        assert!(out.contains(r#"href="https://real.example/""#));
        assert_eq!(out.matches(r#"class="themalinks-proxy-notice""#).count(), 2);
        let ours = out.find("https://real.example/").unwrap();
        let fake = out.find("trusted-bank.example").unwrap();
        assert!(ours < fake);
    }

    #[test]
    fn look_alike_style_does_not_suppress_base_style() {
        let mut doc = Document::parse(concat!(
            r#"<head><style data-themalinks="base-style">body { display: none }</style></head>"#,
            r#"<body><style data-themalinks="base-style"></style><p>x</p></body>"#,
        ))
        .unwrap();
        InjectBaseStyle.apply(&mut doc, &base());

        let out = doc.serialize();
        assert_eq!(out.matches("<style").count(), 3);
        assert!(out.contains("* { max-width: 100%; }"));
    }

    #[test]
    fn banner_inserted_into_empty_body() {
        let mut doc = Document::parse("").unwrap();
        InsertBanner.apply(&mut doc, &base());
        assert!(doc.serialize().contains(r#"<body><div class="themalinks-proxy-notice"><strong>"#));
    }
}
