//! Integration tests for collecting articles from real HTTP servers.
//!
//! Each test starts its own `wiremock` server, so feeds, failures and
//! request counts are isolated per test.

use std::time::{Duration, Instant};

use feedfan::config::Config;
use feedfan::feed::{ArticleFetcher, CollectError, FeedUrl, TransportConfig};
use feedfan::filter::{FilterChain, RequireLink};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss(prefix: &str, count: usize) -> String {
    let items: String = (0..count)
        .map(|i| {
            format!(
                "<item><title>{prefix} {i}</title><link>https://example.com/{prefix}/{i}</link>\
                 <guid>{prefix}-{i}</guid><pubDate>Tue, 10 Jun 2025 04:00:00 GMT</pubDate></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>{prefix} feed</title>{items}</channel></rss>"#
    )
}

fn fetcher_with_timeout(timeout: Duration) -> ArticleFetcher {
    let config = TransportConfig {
        timeout,
        ..TransportConfig::default()
    };
    ArticleFetcher::http(config, 16).unwrap()
}

fn url(server: &MockServer, route: &str) -> FeedUrl {
    FeedUrl::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

async fn mount_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_bad_feeds_do_not_affect_good_ones() {
    let server = MockServer::start().await;
    mount_feed(&server, "/good", rss("good", 3)).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_feed(&server, "/garbage", "<html><body>nope".to_string()).await;

    let fetcher = fetcher_with_timeout(Duration::from_secs(5));
    let urls = [
        url(&server, "/good"),
        url(&server, "/broken"),
        url(&server, "/garbage"),
    ];

    let report = fetcher
        .collect_report(&urls, &FilterChain::new(), std::future::pending())
        .await
        .unwrap();

    assert_eq!(report.articles.len(), 3);
    assert!(report.articles.iter().all(|a| a.title.starts_with("good")));
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures.len(), 2);

    let broken = report
        .failures
        .iter()
        .find(|(u, _)| u.as_str().ends_with("/broken"))
        .unwrap();
    assert!(broken.1.contains("500"));
}

#[tokio::test]
async fn test_every_feed_failing_is_still_ok() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = fetcher_with_timeout(Duration::from_secs(5));
    let urls = [url(&server, "/a"), url(&server, "/b")];

    let articles = fetcher.collect(&urls, &FilterChain::new()).await.unwrap();
    assert!(articles.is_empty());
}

#[tokio::test]
async fn test_slow_feed_times_out_without_holding_batch() {
    let server = MockServer::start().await;
    mount_feed(&server, "/fast", rss("fast", 2)).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss("slow", 2))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher_with_timeout(Duration::from_millis(300));
    let urls = [url(&server, "/fast"), url(&server, "/slow")];

    let started = Instant::now();
    let report = fetcher
        .collect_report(&urls, &FilterChain::new(), std::future::pending())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.articles.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].0.as_str().ends_with("/slow"));
}

// ============================================================================
// Batch semantics
// ============================================================================

#[tokio::test]
async fn test_duplicate_urls_fetched_independently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dup"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss("dup", 2)))
        .expect(2)
        .mount(&server)
        .await;

    // No cache, so neither request is conditional
    let fetcher = ArticleFetcher::http(TransportConfig::default(), 0).unwrap();
    let dup = url(&server, "/dup");

    let articles = fetcher
        .collect(&[dup.clone(), dup], &FilterChain::new())
        .await
        .unwrap();
    assert_eq!(articles.len(), 4);
}

#[tokio::test]
async fn test_filters_applied_over_http() {
    let server = MockServer::start().await;
    let body = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>
        <item><title>linked</title><link>https://example.com/1</link></item>
        <item><title>unlinked</title></item>
    </channel></rss>"#;
    mount_feed(&server, "/rss", body.to_string()).await;

    let fetcher = fetcher_with_timeout(Duration::from_secs(5));
    let filters = FilterChain::new().with(RequireLink);

    let articles = fetcher
        .collect(&[url(&server, "/rss")], &filters)
        .await
        .unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "linked");
}

#[tokio::test]
async fn test_cancel_returns_cancelled_promptly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let fetcher = fetcher_with_timeout(Duration::from_secs(60));
    let urls = [url(&server, "/a"), url(&server, "/b")];

    let started = Instant::now();
    let result = fetcher
        .collect_until(
            &urls,
            &FilterChain::new(),
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;

    assert_eq!(result.unwrap_err(), CollectError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

// ============================================================================
// Conditional GET across batches
// ============================================================================

#[tokio::test]
async fn test_unchanged_feed_served_from_cache_on_next_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .and(header("If-None-Match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"v1\"")
                .set_body_string(rss("cached", 2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_with_timeout(Duration::from_secs(5));
    let urls = [url(&server, "/rss")];

    let first = fetcher.collect(&urls, &FilterChain::new()).await.unwrap();
    let second = fetcher.collect(&urls, &FilterChain::new()).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
}

// ============================================================================
// Config and OPML inputs
// ============================================================================

#[tokio::test]
async fn test_config_and_opml_drive_a_batch() {
    let server = MockServer::start().await;
    mount_feed(&server, "/one", rss("one", 1)).await;
    mount_feed(&server, "/two", rss("two", 2)).await;

    let dir = std::env::temp_dir().join("feedfan_it_config_and_opml");
    std::fs::create_dir_all(&dir).unwrap();

    let config_path = dir.join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "timeout_secs = 5\nfeeds = [\"{}/one\"]\n\n[filters]\nrequire_link = true\n",
            server.uri()
        ),
    )
    .unwrap();

    let opml_path = dir.join("feeds.opml");
    std::fs::write(
        &opml_path,
        format!(
            r#"<opml version="2.0"><body><outline text="Two" xmlUrl="{}/two"/></body></opml>"#,
            server.uri()
        ),
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    let mut urls = config.feed_urls().unwrap();
    let listed = feedfan::feed::opml::parse(&opml_path).await.unwrap();
    assert_eq!(listed[0].title, "Two");
    urls.extend(listed.into_iter().map(|f| f.url));

    let fetcher =
        ArticleFetcher::http(config.transport_config(), config.cache_capacity).unwrap();
    let articles = fetcher
        .collect(&urls, &config.filter_chain())
        .await
        .unwrap();

    assert_eq!(articles.len(), 3);
    std::fs::remove_dir_all(&dir).ok();
}
