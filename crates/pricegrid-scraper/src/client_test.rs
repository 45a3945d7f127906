use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn fetcher() -> PageFetcher {
    PageFetcher::new(FetcherConfig::default()).expect("fetcher")
}

fn fetcher_with(config: FetcherConfig) -> PageFetcher {
    PageFetcher::new(config).expect("fetcher")
}

#[tokio::test]
async fn fetch_all_returns_one_result_per_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let targets = vec![
        FetchTarget::new(format!("{}/ok", server.uri()), FetchStrategy::Http),
        FetchTarget::new(format!("{}/broken", server.uri()), FetchStrategy::Http),
        // Nothing listens here; must still yield a (failed) result.
        FetchTarget::new("http://127.0.0.1:9/unreachable", FetchStrategy::Http),
    ];

    let results = fetcher().fetch_all(targets).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().filter(|r| r.success).count(), 1);
    for suffix in ["/ok", "/broken", "/unreachable"] {
        assert!(
            results.iter().any(|r| r.url.ends_with(suffix)),
            "missing result for {suffix}"
        );
    }
}

#[tokio::test]
async fn duplicate_targets_each_produce_a_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let url = format!("{}/p/1", server.uri());
    let targets = vec![
        FetchTarget::new(url.clone(), FetchStrategy::Http),
        FetchTarget::new(url, FetchStrategy::Http),
    ];
    let results = fetcher().fetch_all(targets).await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
}

#[tokio::test]
async fn success_captures_status_body_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>product</html>")
                .insert_header("x-store", "test"),
        )
        .mount(&server)
        .await;

    let results = fetcher()
        .fetch_all(vec![FetchTarget::new(
            format!("{}/item", server.uri()),
            FetchStrategy::Http,
        )])
        .await;

    let result = &results[0];
    assert!(result.success);
    assert_eq!(result.status_code, 200);
    assert_eq!(result.body, "<html>product</html>");
    assert_eq!(result.headers.get("x-store").map(String::as_str), Some("test"));
    assert_eq!(result.strategy_used, FetchStrategy::Http);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn non_2xx_is_a_failure_result_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .mount(&server)
        .await;

    let results = fetcher()
        .fetch_all(vec![FetchTarget::new(
            format!("{}/missing", server.uri()),
            FetchStrategy::Http,
        )])
        .await;

    let result = &results[0];
    assert!(!result.success);
    assert_eq!(result.status_code, 404);
    // The body is still captured for diagnostics.
    assert_eq!(result.body, "gone");
    assert!(result.error.as_deref().unwrap_or_default().contains("404"));
}

#[tokio::test]
async fn redirects_are_followed_and_final_url_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .mount(&server)
        .await;

    let results = fetcher()
        .fetch_all(vec![FetchTarget::new(
            format!("{}/old", server.uri()),
            FetchStrategy::Http,
        )])
        .await;

    let result = &results[0];
    assert!(result.success);
    assert!(result.final_url.ends_with("/new"));
    assert_eq!(result.body, "moved here");
}

#[tokio::test]
async fn per_request_timeout_becomes_a_failure_result() {
    // A server that accepts and then goes quiet for longer than the timeout.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    let fetcher = fetcher_with(FetcherConfig {
        request_timeout_secs: 1,
        ..FetcherConfig::default()
    });
    let results = fetcher
        .fetch_all(vec![FetchTarget::new(
            format!("http://127.0.0.1:{}/slow", addr.port()),
            FetchStrategy::Http,
        )])
        .await;

    let result = &results[0];
    assert!(!result.success);
    assert_eq!(result.status_code, 0);
    assert!(result.error.is_some());
}

/// Minimal HTTP server that tracks how many connections are in flight at
/// once. `connection: close` keeps reqwest from pooling, so connection
/// concurrency equals request concurrency.
async fn spawn_counting_server(
    hold: Duration,
) -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let max_handle = Arc::clone(&max_active);
    let active_handle = Arc::clone(&active);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let active = Arc::clone(&active_handle);
            let max_active = Arc::clone(&max_handle);
            tokio::spawn(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);

                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(hold).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                    )
                    .await;
                let _ = socket.shutdown().await;

                active.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    (port, max_active)
}

#[tokio::test]
async fn at_most_n_requests_in_flight_per_domain() {
    const LIMIT: usize = 2;
    let (port, max_active) = spawn_counting_server(Duration::from_millis(50)).await;

    let fetcher = fetcher_with(FetcherConfig {
        default_domain_limit: LIMIT,
        ..FetcherConfig::default()
    });
    let targets: Vec<FetchTarget> = (0..10)
        .map(|i| {
            FetchTarget::new(
                format!("http://127.0.0.1:{port}/p/{i}"),
                FetchStrategy::Http,
            )
        })
        .collect();

    let results = fetcher.fetch_all(targets).await;
    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r.success));
    assert!(
        max_active.load(Ordering::SeqCst) <= LIMIT,
        "domain concurrency cap exceeded: {}",
        max_active.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn domains_are_throttled_independently() {
    // "localhost" and "127.0.0.1" are distinct gate keys pointing at the
    // same loopback interface, which gives us two domains without DNS.
    let (port_a, max_a) = spawn_counting_server(Duration::from_millis(100)).await;
    let (port_b, max_b) = spawn_counting_server(Duration::from_millis(100)).await;

    let fetcher = fetcher_with(FetcherConfig {
        default_domain_limit: 1,
        ..FetcherConfig::default()
    });

    let mut targets = Vec::new();
    for i in 0..3 {
        targets.push(FetchTarget::new(
            format!("http://127.0.0.1:{port_a}/a/{i}"),
            FetchStrategy::Http,
        ));
        targets.push(FetchTarget::new(
            format!("http://localhost:{port_b}/b/{i}"),
            FetchStrategy::Http,
        ));
    }

    let results = fetcher.fetch_all(targets).await;
    assert_eq!(results.len(), 6);
    // Each domain respected its own cap of one.
    assert!(max_a.load(Ordering::SeqCst) <= 1);
    assert!(max_b.load(Ordering::SeqCst) <= 1);
}

#[tokio::test]
async fn empty_batch_returns_empty() {
    let results = fetcher().fetch_all(Vec::new()).await;
    assert!(results.is_empty());
}

#[test]
fn domain_limit_override_applies_to_gate() {
    let config = FetcherConfig {
        default_domain_limit: 4,
        domain_limits: HashMap::from([("fragile.example.com".to_owned(), 1)]),
        ..FetcherConfig::default()
    };
    let fetcher = fetcher_with(config);
    assert_eq!(fetcher.gates.limit_for("fragile.example.com"), 1);
    assert_eq!(fetcher.gates.limit_for("sturdy.example.com"), 4);
}
