//! Tests for the `reqwest`-backed collaborators against a local mock server.

use themalinks_viewer::config::{DEFAULT_ACCEPT, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_USER_AGENT};
use themalinks_viewer::{
    Denylist, EmbedProbe, EndpointRegistry, HeaderProbe, HttpConfig, Link, PageFetcher,
    ProxyEndpoint, ReqwestFetcher, ViewerBuilder, ViewerError, ViewerState,
};
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> ReqwestFetcher {
    ReqwestFetcher::from_config(&HttpConfig::default()).unwrap()
}

fn probe() -> HeaderProbe {
    HeaderProbe::new(HttpConfig::default().build_client().unwrap())
}

fn page_url(server: &MockServer, p: &str) -> Url {
    Url::parse(&format!("{}{p}", server.uri())).unwrap()
}

// ---------------------------------------------------------------------------
// ReqwestFetcher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetcher_sends_browser_like_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>hi</p>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let page = fetcher()
        .get(&format!("{}/page", server.uri()))
        .await
        .unwrap();
    assert_eq!(page.status, 200);
    assert_eq!(page.into_html(), "<p>hi</p>");

    let requests = server.received_requests().await.unwrap();
    let headers = &requests[0].headers;
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert_eq!(header("user-agent"), DEFAULT_USER_AGENT);
    assert_eq!(header("accept"), DEFAULT_ACCEPT);
    assert_eq!(header("accept-language"), DEFAULT_ACCEPT_LANGUAGE);
}

#[tokio::test]
async fn fetcher_unwraps_json_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"contents":"<h1>Wrapped</h1>","status":{"http_code":200}}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let page = fetcher()
        .get(&format!("{}/get?url=https%3A%2F%2Fexample.org", server.uri()))
        .await
        .unwrap();
    assert_eq!(page.into_html(), "<h1>Wrapped</h1>");
}

#[tokio::test]
async fn fetcher_returns_error_status_as_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let page = fetcher().get(&server.uri()).await.unwrap();
    assert_eq!(page.status, 503);
    assert!(!page.is_success());
}

#[tokio::test]
async fn fetcher_reports_transport_failure() {
    let err = fetcher().get("not a url").await.unwrap_err();
    assert!(matches!(err, ViewerError::Http(_)));
}

// ---------------------------------------------------------------------------
// HeaderProbe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn probe_accepts_page_without_frame_policy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>open</p>", "text/html"))
        .mount(&server)
        .await;

    assert!(probe().load(&page_url(&server, "/")).await.unwrap());
}

#[tokio::test]
async fn probe_rejects_frame_options_and_frame_ancestors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/deny"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Frame-Options", "DENY"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/csp"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Security-Policy", "default-src 'self'; frame-ancestors 'self'"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/any"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Content-Security-Policy", "frame-ancestors *"),
        )
        .mount(&server)
        .await;

    let probe = probe();
    assert!(!probe.load(&page_url(&server, "/deny")).await.unwrap());
    assert!(!probe.load(&page_url(&server, "/csp")).await.unwrap());
    assert!(probe.load(&page_url(&server, "/any")).await.unwrap());
}

#[tokio::test]
async fn probe_treats_error_status_as_load_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = probe().load(&page_url(&server, "/missing")).await.unwrap_err();
    assert!(matches!(err, ViewerError::Http(_)));
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn viewer_loads_through_local_proxy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/fetch/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><link rel="stylesheet" href="/s.css"></head><body><p onclick="x()">News</p><img src="img/a.png"></body></html>"#,
            "text/html; charset=utf-8",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let registry =
        EndpointRegistry::new(vec![ProxyEndpoint::append("Local", format!("{}/fetch/", server.uri()))])
            .unwrap();
    let viewer = ViewerBuilder::new(fetcher(), probe())
        .endpoints(registry)
        .denylist(Denylist::new(["news.example"]))
        .build()
        .unwrap();

    viewer
        .open(&Link::new("News", "https://news.example/articles/1"))
        .await;

    let snapshot = viewer.snapshot();
    assert_eq!(snapshot.state, ViewerState::ContentReady);
    assert_eq!(snapshot.used_endpoint.as_deref(), Some("Local"));

    let content = snapshot.content.unwrap();
    assert!(content.contains(r#"href="https://news.example/s.css""#));
    assert!(content.contains(r#"src="https://news.example/articles/img/a.png""#));
    assert!(!content.contains("onclick"));
    assert!(content.contains("themalinks-proxy-notice"));
}
