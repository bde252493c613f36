// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use mockall::mock;
use tempfile::TempDir;

use routekit::{
    apply_middleware, Application, ChainBuilder, CompressionMiddleware, DiskStore, Exception,
    FnMiddleware, Handler, HttpRequestMethod, RedirectionMiddleware, Request, Response,
    ResponseCacheMiddleware, Service, StaticFileMiddleware,
};

mock! {
    pub Upstream {}
    impl Service for Upstream {
        fn call(&self, request: &Request) -> Response;
    }
}

/// 把序列化后的响应拆为状态码、标头与响应体
fn parse_response(raw: &[u8]) -> (u16, Vec<(String, String)>, String) {
    let text = String::from_utf8_lossy(raw).into_owned();
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((text.as_str(), ""));
    let mut lines = head.split("\r\n");

    let status_code = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    (status_code, headers, body.to_string())
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn fixed(text: &'static str) -> Handler {
    Handler::new().get(move |_| text)
}

/// 与旧版中间件测试相同的装配：重定向在外、静态文件在内
fn prepare_application() -> Box<dyn Service> {
    let mut app = Application::new();
    app.route("/", fixed("main"))
        .unwrap()
        .route("/redir_test", fixed("redirect failed"))
        .unwrap();

    let redirects = RedirectionMiddleware::new()
        .rule("^/redir_test", "http://x.com/search?q=y", false)
        .unwrap();
    let statics = StaticFileMiddleware::new("tests/static", "/static");

    ChainBuilder::new(app).with(redirects).with(statics).build()
}

#[test]
fn test_redirect_merges_query() {
    let service = prepare_application();
    let response = service.call(&Request::get("/redir_test?foo=1"));

    let (status_code, headers, _) = parse_response(&response.as_bytes());
    assert_eq!(status_code, 302);
    assert_eq!(
        header(&headers, "Location"),
        Some("http://x.com/search?q=y&foo=1")
    );
}

#[test]
fn test_static_request() {
    let service = prepare_application();
    let response = service.call(&Request::get("/static/test.txt"));

    let (status_code, headers, body) = parse_response(&response.as_bytes());
    assert_eq!(status_code, 200);
    assert!(body.contains("This is a test."));
    assert_eq!(header(&headers, "Content-Type"), Some("text/plain"));
    assert_eq!(header(&headers, "Cache-Control"), Some("max-age=600"));
    assert_eq!(header(&headers, "Content-Length"), Some("15"));
}

#[test]
fn test_remaining_route() {
    let service = prepare_application();
    let (status_code, _, body) = parse_response(&service.call(&Request::get("/")).as_bytes());
    assert_eq!(status_code, 200);
    assert_eq!(body, "main");
}

#[test]
fn test_unknown_path_is_404_page() {
    let service = prepare_application();
    let (status_code, headers, body) =
        parse_response(&service.call(&Request::get("/nowhere")).as_bytes());
    assert_eq!(status_code, 404);
    assert!(header(&headers, "Content-Type").unwrap().starts_with("text/html"));
    assert!(body.contains("404"));
}

#[test]
fn test_parsed_request_flows_through_chain() {
    let service = prepare_application();
    let raw = b"GET /redir_test?foo=1 HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
    let request = Request::try_from(raw, 3).unwrap();

    let response = service.call(&request);
    assert_eq!(response.status_code(), 302);
}

#[test]
fn test_cache_calls_upstream_once() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(DiskStore::new(dir.path()).unwrap());

    let mut cached = Response::html("expensive");
    cached.set_header("Cache-Control", "max-age=60");
    let mut upstream = MockUpstream::new();
    upstream
        .expect_call()
        .times(1)
        .returning(move |_| cached.clone());

    let service = apply_middleware(upstream, ResponseCacheMiddleware::new(store));
    let request = Request::get("/report?page=2");
    let first = service.call(&request);
    let second = service.call(&request);

    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(second.text(), "expensive");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_cache_does_not_store_uncacheable() {
    let store = Arc::new(routekit::MemoryStore::from_capacity(4));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let upstream = move |_: &Request| {
        counter.fetch_add(1, Ordering::SeqCst);
        Response::html("fresh every time")
    };

    let service = apply_middleware(upstream, ResponseCacheMiddleware::new(store.clone()));
    service.call(&Request::get("/live"));
    service.call(&Request::get("/live"));

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(store.is_empty());
}

#[test]
fn test_middleware_order() {
    let mut app = Application::new();
    app.route("/", fixed("core")).unwrap();

    let tag = |name: &'static str| {
        FnMiddleware::new(name).after(move |_, mut response: Response| {
            let seen = response.header("X-Trace").unwrap_or_default().to_string();
            response.set_header("X-Trace", &format!("{}{}", seen, name));
            response
        })
    };
    let service = ChainBuilder::new(app).with(tag("a")).with(tag("b")).build();

    // b 是内层，先执行响应阶段
    assert_eq!(service.call(&Request::get("/")).header("X-Trace"), Some("ba"));
}

#[test]
fn test_compression_over_application() {
    let mut app = Application::new();
    app.route("/big", Handler::new().get(|_| "compress me ".repeat(200)))
        .unwrap();
    let service = apply_middleware(app, CompressionMiddleware::new());

    let request = Request::get("/big").with_header("Accept-Encoding", "gzip, deflate");
    let response = service.call(&request);
    assert_eq!(response.header("Content-Encoding"), Some("gzip"));
    assert!(response.content_length() < 2400);
}

#[test]
fn test_method_not_allowed_lists_verbs() {
    let mut app = Application::new();
    app.route(
        "/item",
        Handler::new().get(|_| "read").delete(|_| "deleted"),
    )
    .unwrap();

    let response = app.dispatch(&Request::new(HttpRequestMethod::Post, "/item"));
    assert_eq!(response.status_code(), 405);
    assert_eq!(response.header("Allow"), Some("GET, DELETE"));
}

#[test]
fn test_registration_errors() {
    let mut app = Application::new();
    app.named_route("home", "/", fixed("a")).unwrap();
    assert!(matches!(
        app.named_route("home", "/index", fixed("b")),
        Err(Exception::DuplicateName(_))
    ));
    assert!(matches!(
        app.url_for("missing", &[]),
        Err(Exception::UnknownRouteName(_))
    ));
    assert!(matches!(
        app.route("/broken/<name", fixed("c")),
        Err(Exception::Pattern(_))
    ));
}
