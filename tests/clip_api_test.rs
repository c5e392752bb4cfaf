//! Integration tests for the upstream clip-listing client using wiremock

mod common;

use chrono::{Duration, Utc};
use cliprelay::clips::{ClipApi, TwitchClient};
use cliprelay::utils::error::FetchError;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token(value: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": value,
        "expires_in": 5_000_000,
        "token_type": "bearer",
    }))
}

fn client(mock_server: &MockServer) -> TwitchClient {
    TwitchClient::with_client(
        reqwest::Client::new(),
        common::upstream_config(&mock_server.uri()),
    )
}

/// Test login lookup sends credentials and returns the id
#[tokio::test]
async fn test_resolve_broadcaster_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token("t1"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .and(query_param("login", "xqc"))
        .and(header("client-id", "client-id"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "71092938", "login": "xqc", "display_name": "xQc"}]
        })))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let id = client.resolve_broadcaster_id("xqc").await.unwrap();
    assert_eq!(id, "71092938");

    // Cached token is reused
    client.resolve_broadcaster_id("xqc").await.unwrap();
}

/// Test an unknown login is reported
#[tokio::test]
async fn test_unknown_broadcaster() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token("t1"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server).resolve_broadcaster_id("nobody").await;
    assert!(matches!(result, Err(FetchError::UnknownBroadcaster(login)) if login == "nobody"));
}

/// Test a 401 refreshes the token once and replays the request
#[tokio::test]
async fn test_expired_token_refreshed_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token("stale"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token("fresh"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/helix/clips"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let base = mock_server.uri();
    Mock::given(method("GET"))
        .and(path("/helix/clips"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [common::clip_json(&base, "a", 10)],
            "pagination": {}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let now = Utc::now();
    let clips = client(&mock_server)
        .list_clips("71092938", now - Duration::hours(24), now)
        .await
        .unwrap();

    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].id, "a");
}

/// Test a failed refresh abandons the call with an auth error
#[tokio::test]
async fn test_refresh_failure_is_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token("stale"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid client secret"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/helix/clips"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let now = Utc::now();
    let result = client(&mock_server)
        .list_clips("71092938", now - Duration::hours(24), now)
        .await;

    assert!(matches!(result, Err(FetchError::Auth(_))));
}

/// Test a second 401 after refreshing is not retried again
#[tokio::test]
async fn test_second_unauthorized_is_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token("t"))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&mock_server)
        .await;

    let result = client(&mock_server).resolve_broadcaster_id("xqc").await;
    assert!(matches!(result, Err(FetchError::Auth(_))));
}

/// Test listing follows the pagination cursor
#[tokio::test]
async fn test_listing_follows_cursor() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token("t1"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/helix/clips"))
        .and(query_param("broadcaster_id", "71092938"))
        .and(query_param("first", "100"))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [common::clip_json(&base, "a", 5), common::clip_json(&base, "b", 9)],
            "pagination": {"cursor": "page-2"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/helix/clips"))
        .and(query_param("after", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [common::clip_json(&base, "c", 7)],
            "pagination": {}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let now = Utc::now();
    let clips = client(&mock_server)
        .list_clips("71092938", now - Duration::hours(24), now)
        .await
        .unwrap();

    let ids: Vec<_> = clips.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

/// Test 5xx and 4xx from the listing are classified
#[tokio::test]
async fn test_listing_error_statuses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token("t1"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/helix/clips"))
        .and(query_param("broadcaster_id", "down"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/helix/clips"))
        .and(query_param("broadcaster_id", "bad"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid broadcaster"))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let now = Utc::now();
    let start = now - Duration::hours(24);

    assert!(matches!(
        client.list_clips("down", start, now).await,
        Err(FetchError::ServerError(502))
    ));
    assert!(matches!(
        client.list_clips("bad", start, now).await,
        Err(FetchError::Rejected { status: 400, .. })
    ));
}
