// tests/reddit_http.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use reddit_relay::ingest::providers::reddit::RedditSource;
use reddit_relay::ingest::types::ContentSource;
use reddit_relay::RelayError;

const LISTING: &str = include_str!("fixtures/reddit_new.json");

#[derive(Clone, Default)]
struct Seen {
    requests: Arc<Mutex<Vec<(String, String, String)>>>, // (subs, limit, user-agent)
}

async fn listing(
    State(seen): State<Seen>,
    Path(subs): Path<String>,
    Query(q): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let ua = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.requests.lock().unwrap().push((
        subs.clone(),
        q.get("limit").cloned().unwrap_or_default(),
        ua,
    ));
    match subs.as_str() {
        "broken" => (StatusCode::SERVICE_UNAVAILABLE, "upstream sad".into()),
        "html" => (StatusCode::OK, "<html>blocked</html>".into()),
        _ => (StatusCode::OK, LISTING.to_string()),
    }
}

async fn serve(seen: Seen) -> String {
    let app = Router::new()
        .route("/r/{subs}/new.json", get(listing))
        .with_state(seen);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn fetches_combined_listing_with_limit_and_user_agent() {
    let seen = Seen::default();
    let base = serve(seen.clone()).await;
    let src = RedditSource::new(base, "relay-test/1.0").with_timeout(5);

    let items = src
        .fetch_recent(&["rust".into(), "golang".into()], 10)
        .await
        .unwrap();

    assert_eq!(items.len(), 4);
    assert_eq!(items[0].title, "Announcing Rust 1.80 & what's next");
    assert_eq!(items[1].title, "Go 1.23 released");
    assert_eq!(items[1].created_at, 1_721_318_000.0);
    assert_eq!(items[2].path, "/r/rust/comments/1c3a003/weekly_questions_thread/");

    let reqs = seen.requests.lock().unwrap().clone();
    assert_eq!(
        reqs,
        vec![("rust+golang".to_string(), "10".to_string(), "relay-test/1.0".to_string())]
    );
}

#[tokio::test]
async fn caps_results_at_limit() {
    let base = serve(Seen::default()).await;
    let src = RedditSource::new(base, "relay-test/1.0");
    let items = src.fetch_recent(&["rust".into()], 2).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].source_id, "rust");
}

#[tokio::test]
async fn http_error_and_bad_body_are_source_unavailable() {
    let base = serve(Seen::default()).await;
    let src = RedditSource::new(base, "relay-test/1.0");

    let err = src.fetch_recent(&["broken".into()], 10).await.unwrap_err();
    assert!(matches!(err, RelayError::SourceUnavailable(_)), "{err}");

    let err = src.fetch_recent(&["html".into()], 10).await.unwrap_err();
    assert!(matches!(err, RelayError::SourceUnavailable(_)), "{err}");
}

#[tokio::test]
async fn unreachable_host_is_source_unavailable() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let src = RedditSource::new(format!("http://{addr}"), "relay-test/1.0").with_timeout(2);
    let err = src.fetch_recent(&["rust".into()], 10).await.unwrap_err();
    assert!(matches!(err, RelayError::SourceUnavailable(_)));
}
