//! Tests for the shared rate-limit table fed from response headers.

use guildmaster_rate_limit::{RateLimitHeaders, RateLimitTable};
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;
use tokio::time::Instant;

fn headers(pairs: &[(&'static str, &'static str)]) -> RateLimitHeaders {
    let mut map = HeaderMap::new();
    for (key, value) in pairs {
        map.insert(*key, HeaderValue::from_static(value));
    }
    RateLimitHeaders::from_headers(&map)
}

#[tokio::test(start_paused = true)]
async fn test_routes_sharing_a_bucket_wait_together() {
    let table = RateLimitTable::new();
    let exhausted = headers(&[
        ("x-ratelimit-bucket", "abcd1234"),
        ("x-ratelimit-remaining", "0"),
        ("x-ratelimit-reset-after", "1.5"),
    ]);
    table.observe("POST /channels/301/messages", &exhausted).await;
    table.observe("POST /channels/304/messages", &exhausted).await;

    assert_eq!(
        table.bucket_for_route("POST /channels/304/messages").await,
        "abcd1234"
    );

    let started = Instant::now();
    table.wait_for_route("POST /channels/301/messages").await;
    assert!(started.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_unseen_route_is_its_own_bucket() {
    let table = RateLimitTable::new();
    assert_eq!(table.bucket_for_route("GET /guilds/100").await, "GET /guilds/100");
    assert_eq!(table.wait_for_route("GET /guilds/100").await, Duration::ZERO);
    assert!(table.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_global_limit_blocks_every_bucket() {
    let table = RateLimitTable::new();
    let global = headers(&[("x-ratelimit-global", "true"), ("retry-after", "2")]);
    table.observe("POST /guilds/100/roles", &global).await;
    assert!(table.is_global_limited().await);

    let started = Instant::now();
    table.wait_for("get_roles").await;
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(!table.is_global_limited().await);
}

#[tokio::test(start_paused = true)]
async fn test_clones_share_state() {
    let table = RateLimitTable::new();
    let gate_view = table.clone();
    table.update("create_role", 0, Duration::from_secs(1)).await;
    assert!(gate_view.is_rate_limited("create_role").await);
    let state = gate_view.bucket("create_role").await.unwrap();
    assert_eq!(*state.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_last_observation_wins() {
    let table = RateLimitTable::new();
    table.update("send_message", 0, Duration::from_secs(5)).await;
    table.update("send_message", 3, Duration::from_secs(5)).await;
    assert!(!table.is_rate_limited("send_message").await);
    assert_eq!(table.wait_for("send_message").await, Duration::ZERO);
}

#[test]
fn test_retry_body_overrides_header_delay() {
    let parsed = headers(&[("retry-after", "3")]).with_retry_body(0.25, true);
    assert_eq!(*parsed.retry_after(), Some(Duration::from_millis(250)));
    assert!(*parsed.global());
    assert!(headers(&[]).is_empty());
}
