//! Unwrapping of JSON-enveloped proxy responses.

use serde_json::Value;

/// Return the page HTML carried by a proxy response body.
///
/// JSON responses (by declared content type) are unwrapped to their
/// `contents` field, or `data` when `contents` is absent. Anything else,
/// including JSON without either string field or a body that does not parse,
/// is returned unchanged.
pub fn extract_html(content_type: Option<&str>, body: String) -> String {
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return body;
    }

    let Ok(value) = serde_json::from_str::<Value>(&body) else {
        tracing::debug!("Proxy declared JSON but body did not parse, using it as text");
        return body;
    };

    ["contents", "data"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_owned)
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_html_passes_through() {
        let html = "<html><body>x</body></html>".to_string();
        assert_eq!(extract_html(Some("text/html"), html.clone()), html);
        assert_eq!(extract_html(None, html.clone()), html);
    }

    #[test]
    fn contents_field_wins_over_data() {
        let body = r#"{"data":"<p>data</p>","contents":"<p>contents</p>"}"#.to_string();
        assert_eq!(
            extract_html(Some("application/json"), body),
            "<p>contents</p>"
        );
    }

    #[test]
    fn data_field_used_when_contents_missing() {
        let body = r#"{"data":"<p>data</p>"}"#.to_string();
        assert_eq!(extract_html(Some("Application/JSON"), body), "<p>data</p>");
    }

    #[test]
    fn null_contents_falls_back_to_data() {
        let body = r#"{"contents":null,"data":"<p>d</p>"}"#.to_string();
        assert_eq!(extract_html(Some("application/json"), body), "<p>d</p>");
    }

    #[test]
    fn json_without_known_fields_is_returned_as_is() {
        let body = r#"{"status":"ok"}"#.to_string();
        assert_eq!(
            extract_html(Some("application/json"), body.clone()),
            body
        );
    }

    #[test]
    fn malformed_json_is_returned_as_is() {
        let body = "<html>not json</html>".to_string();
        assert_eq!(
            extract_html(Some("application/json"), body.clone()),
            body
        );
    }
}
