use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use swcache_client::{FetchClient, FetchConfig, Registration, WorkerState};
use swcache_core::{AppConfig, CacheDb, CachePolicy, CacheStorage, Destination, Request};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANIFEST: [&str; 3] = ["./", "./index.html", "./assets/js/main.js"];

async fn site() -> MockServer {
    let server = MockServer::start().await;
    for (route, body) in [("/", "home"), ("/index.html", "index"), ("/assets/js/main.js", "main")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/assets/js/i18n.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("strings"))
        .mount(&server)
        .await;
    server
}

/// Every request hangs past the client timeout from now on.
async fn go_offline(server: &MockServer) {
    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(server)
        .await;
}

fn policy(origin: &str, version: &str) -> CachePolicy {
    let config = AppConfig {
        origin: origin.into(),
        version: version.into(),
        manifest: MANIFEST.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    CachePolicy::from_config(&config).unwrap()
}

async fn registration() -> (Arc<CacheDb>, Registration) {
    let cache = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let fetcher = FetchClient::new(FetchConfig { timeout: Duration::from_millis(500), ..Default::default() }).unwrap();
    let registration = Registration::new(cache.clone(), Arc::new(fetcher));
    (cache, registration)
}

#[tokio::test]
async fn test_site_keeps_working_offline() {
    let server = site().await;
    let origin = format!("{}/", server.uri());
    let base = Url::parse(&origin).unwrap();
    let (cache, registration) = registration().await;

    let worker = registration.register(policy(&origin, "1.0.0")).await.unwrap().worker;
    assert_eq!(worker.state().await, WorkerState::Activated);
    assert_eq!(cache.entry_count("fitlog-static-v1.0.0").await.unwrap(), 3);

    let strings = Request::get(base.join("assets/js/i18n.js").unwrap());
    assert_eq!(registration.handle_fetch(&strings).await.text(), Some("strings"));
    assert_eq!(cache.entry_count("fitlog-dynamic-v1.0.0").await.unwrap(), 1);

    go_offline(&server).await;

    let index = Request::get(base.join("index.html").unwrap());
    assert_eq!(registration.handle_fetch(&index).await.text(), Some("index"));

    let page = Request::navigate(base.join("planos").unwrap());
    assert_eq!(registration.handle_fetch(&page).await.text(), Some("home"));

    assert_eq!(registration.handle_fetch(&strings).await.text(), Some("strings"));
    registration.settle().await;

    let photo = Request::get(base.join("assets/images/hero.jpg").unwrap()).with_destination(Destination::Image);
    let placeholder = registration.handle_fetch(&photo).await;
    assert_eq!(placeholder.status, 200);
    assert_eq!(placeholder.content_type(), Some("image/svg+xml"));

    let script = Request::get(base.join("assets/js/unknown.js").unwrap());
    assert_eq!(registration.handle_fetch(&script).await.status, 503);
}

#[tokio::test]
async fn test_deploy_replaces_old_generations() {
    let server = site().await;
    let origin = format!("{}/", server.uri());
    let (cache, registration) = registration().await;

    registration.register(policy(&origin, "1.0.0")).await.unwrap();
    let strings = Request::get(Url::parse(&origin).unwrap().join("assets/js/i18n.js").unwrap());
    registration.handle_fetch(&strings).await;

    registration.register(policy(&origin, "1.1.0")).await.unwrap();

    assert_eq!(cache.keys().await.unwrap(), vec!["fitlog-static-v1.1.0"]);
    let reply = registration.post_message(&json!({"type": "GET_VERSION"})).await.unwrap();
    assert_eq!(reply.version, "fitlog-v1.1.0");
    assert_eq!(reply.static_cache, "fitlog-static-v1.1.0");
}
