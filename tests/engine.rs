//! End-to-end scenarios driven against an in-process HTTP server, covering
//! the literal cases a crawl must get right: duplicate links, cross-domain
//! rejection, robots disallow/5xx, a 404 leaf, and a page cycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{http::StatusCode, response::IntoResponse, Router};
use reqwest::Url;

use crawlkit::agent::{AgentPool, UserAgent};
use crawlkit::engine::CrawlEngine;
use crawlkit::filter::{Filter, FilterSet};
use crawlkit::robots::RobotsConfig;

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn pool() -> Arc<AgentPool> {
    Arc::new(AgentPool::new(
        reqwest::Client::new(),
        UserAgent { host_agent: "crawlkit-test".into(), robot_agent: "crawlkit-test".into() },
    ))
}

async fn run_to_completion(engine: &CrawlEngine, seed: Url) {
    tokio::time::timeout(Duration::from_secs(5), engine.run(seed))
        .await
        .expect("crawl should terminate")
        .unwrap();
}

#[tokio::test]
async fn duplicate_links_are_deduped_and_counted_as_filtered() {
    let router = Router::new()
        .route("/", get(|| async { axum::response::Html(r#"<a href="/a"><a href="/a"><a href="/b">"#) }))
        .route("/a", get(|| async { "leaf" }))
        .route("/b", get(|| async { "leaf" }));
    let addr = spawn(router).await;
    let seed = Url::parse(&format!("http://{addr}/")).unwrap();

    let mut filters = FilterSet::new();
    filters.push(Filter::same_host_as(&seed));
    let engine = CrawlEngine::new(pool(), filters, None, false);
    run_to_completion(&engine, seed.clone()).await;

    let snapshot = engine.cache().snapshot().await;
    let keys: Vec<_> = snapshot.iter().map(|(k, _)| k.clone()).collect();
    assert!(keys.iter().any(|k| k.ends_with("/a")));
    assert!(keys.iter().any(|k| k.ends_with("/b")));
    assert_eq!(snapshot.len(), 3, "seed + /a + /b, deduped");

    let (_, root_metric) = snapshot.iter().find(|(k, _)| k == &seed.to_string()).unwrap();
    assert_eq!(root_metric.ref_links().len(), 3);

    let (_, a_metric) = snapshot.iter().find(|(k, _)| k.ends_with("/a")).unwrap();
    assert!(a_metric.filtered() >= 1, "duplicate discovery of /a must be recorded");
}

#[tokio::test]
async fn cross_domain_links_are_rejected_by_the_same_host_filter() {
    let router = Router::new().route(
        "/",
        get(|| async { axum::response::Html(r#"<a href="http://other.example/x">"#) }),
    );
    let addr = spawn(router).await;
    let seed = Url::parse(&format!("http://{addr}/")).unwrap();

    let mut filters = FilterSet::new();
    filters.push(Filter::same_host_as(&seed));
    let engine = CrawlEngine::new(pool(), filters, None, false);
    run_to_completion(&engine, seed.clone()).await;

    let snapshot = engine.cache().snapshot().await;
    assert_eq!(snapshot.len(), 1, "cross-domain link must never enter the cache");
}

#[tokio::test]
async fn robots_disallow_prevents_the_fetch() {
    let router = Router::new()
        .route("/", get(|| async { axum::response::Html(r#"<a href="/private">"#) }))
        .route(
            "/robots.txt",
            get(|| async { "User-agent: *\nDisallow: /private\n" }),
        )
        .route("/private", get(|| async { "secret" }));
    let addr = spawn(router).await;
    let seed = Url::parse(&format!("http://{addr}/")).unwrap();

    let mut filters = FilterSet::new();
    filters.push(Filter::same_host_as(&seed));
    let robots = RobotsConfig { robot_agent: "*".into(), use_crawl_delay: false };
    let engine = CrawlEngine::new(pool(), filters, Some(robots), false);
    run_to_completion(&engine, seed.clone()).await;

    let snapshot = engine.cache().snapshot().await;
    let (_, private) = snapshot.iter().find(|(k, _)| k.ends_with("/private")).unwrap();
    assert_eq!(private.requested(), 0);
    assert_eq!(private.received(), 0);
    assert!(private.filtered() >= 1);
}

#[tokio::test]
async fn robots_5xx_is_treated_as_permissive() {
    let router = Router::new()
        .route("/", get(|| async { axum::response::Html(r#"<a href="/a">"#) }))
        .route("/a", get(|| async { "leaf" }))
        .route(
            "/robots.txt",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "").into_response() }),
        );
    let addr = spawn(router).await;
    let seed = Url::parse(&format!("http://{addr}/")).unwrap();

    let mut filters = FilterSet::new();
    filters.push(Filter::same_host_as(&seed));
    let robots = RobotsConfig { robot_agent: "*".into(), use_crawl_delay: false };
    let engine = CrawlEngine::new(pool(), filters, Some(robots), false);
    run_to_completion(&engine, seed.clone()).await;

    let snapshot = engine.cache().snapshot().await;
    let (_, a) = snapshot.iter().find(|(k, _)| k.ends_with("/a")).unwrap();
    assert_eq!(a.received(), 1, "a 5xx robots response must not block the crawl");
}

#[tokio::test]
async fn a_404_leaf_is_recorded_as_errored_with_no_children_explored() {
    let router = Router::new()
        .route("/", get(|| async { axum::response::Html(r#"<a href="/missing">"#) }))
        .route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, r#"<a href="/unreachable">"#).into_response() }),
        );
    let addr = spawn(router).await;
    let seed = Url::parse(&format!("http://{addr}/")).unwrap();

    let mut filters = FilterSet::new();
    filters.push(Filter::same_host_as(&seed));
    let engine = CrawlEngine::new(pool(), filters, None, false);
    run_to_completion(&engine, seed.clone()).await;

    let snapshot = engine.cache().snapshot().await;
    let (_, missing) = snapshot.iter().find(|(k, _)| k.ends_with("/missing")).unwrap();
    assert_eq!(missing.requested(), 1);
    assert_eq!(missing.errored(), 1);
    assert_eq!(missing.received(), 0);
    assert!(
        !snapshot.iter().any(|(k, _)| k.ends_with("/unreachable")),
        "a 404 body must never be walked for links"
    );
}

#[tokio::test]
async fn a_ten_page_cycle_resolves_to_exactly_ten_fetches() {
    async fn page(n: usize) -> impl IntoResponse {
        axum::response::Html(format!(r#"<a href="/page/{}">"#, (n + 1) % 10))
    }

    let mut router = Router::new();
    for i in 0..10 {
        router = router.route(&format!("/page/{i}"), get(move || page(i)));
    }
    let addr = spawn(router).await;
    let seed = Url::parse(&format!("http://{addr}/page/0")).unwrap();

    let mut filters = FilterSet::new();
    filters.push(Filter::same_host_as(&seed));
    let engine = CrawlEngine::new(pool(), filters, None, false);
    run_to_completion(&engine, seed.clone()).await;

    let snapshot = engine.cache().snapshot().await;
    assert_eq!(snapshot.len(), 10);
    let total_received: u64 = snapshot.iter().map(|(_, m)| m.received()).sum();
    assert_eq!(total_received, 10);
}
