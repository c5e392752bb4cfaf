//! Integration tests for the social-media client using wiremock

mod common;

use cliprelay::publish::{MediaId, SocialClient, XClient};
use cliprelay::utils::error::PublishError;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(mock_server: &MockServer) -> XClient {
    XClient::with_client(reqwest::Client::new(), common::social_config(&mock_server.uri()))
}

fn media_file(len: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&vec![5u8; len]).unwrap();
    file
}

async fn mount_initialize(mock_server: &MockServer, total_bytes: u64) {
    Mock::given(method("POST"))
        .and(path("/2/media/upload/initialize"))
        .and(header("authorization", "Bearer user-token"))
        .and(body_partial_json(json!({
            "media_type": "video/mp4",
            "total_bytes": total_bytes,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "m1", "media_key": "7_m1", "expires_after_secs": 86400}
        })))
        .expect(1)
        .mount(mock_server)
        .await;
}

/// Test chunked upload: initialize, one append per segment, finalize
#[tokio::test]
async fn test_chunked_upload() {
    let mock_server = MockServer::start().await;
    mount_initialize(&mock_server, 10).await;

    // 10 bytes in 4-byte segments
    Mock::given(method("POST"))
        .and(path("/2/media/upload/m1/append"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2/media/upload/m1/finalize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "m1", "processing_info": {"state": "succeeded"}}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let file = media_file(10);
    let media = client(&mock_server).upload_media(file.path()).await.unwrap();
    assert_eq!(media, MediaId("m1".into()));
}

/// Test processing status is polled until it succeeds
#[tokio::test]
async fn test_upload_waits_for_processing() {
    let mock_server = MockServer::start().await;
    mount_initialize(&mock_server, 4).await;

    Mock::given(method("POST"))
        .and(path("/2/media/upload/m1/append"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2/media/upload/m1/finalize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "m1", "processing_info": {"state": "pending", "check_after_secs": 0}}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/2/media/upload"))
        .and(query_param("command", "STATUS"))
        .and(query_param("media_id", "m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "m1", "processing_info": {"state": "succeeded", "progress_percent": 100}}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let file = media_file(4);
    assert!(client(&mock_server).upload_media(file.path()).await.is_ok());
}

/// Test failed processing surfaces the server's message
#[tokio::test]
async fn test_processing_failure() {
    let mock_server = MockServer::start().await;
    mount_initialize(&mock_server, 4).await;

    Mock::given(method("POST"))
        .and(path("/2/media/upload/m1/append"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2/media/upload/m1/finalize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "m1", "processing_info": {
                "state": "failed",
                "error": {"code": 1, "name": "InvalidMedia", "message": "Unsupported codec"}
            }}
        })))
        .mount(&mock_server)
        .await;

    let file = media_file(4);
    let result = client(&mock_server).upload_media(file.path()).await;
    assert!(matches!(result, Err(PublishError::MediaProcessing(msg)) if msg == "Unsupported codec"));
}

/// Test a post carries the text and media reference
#[tokio::test]
async fn test_create_post() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(header("authorization", "Bearer user-token"))
        .and(body_partial_json(json!({
            "text": "Clip abc",
            "media": {"media_ids": ["m1"]}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "1445880548472328192", "text": "Clip abc"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let post = client(&mock_server)
        .create_post("Clip abc", &MediaId("m1".into()))
        .await
        .unwrap();
    assert_eq!(post.to_string(), "1445880548472328192");
}

/// Test refused credentials and server errors are classified
#[tokio::test]
async fn test_post_error_statuses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_partial_json(json!({"text": "unauthorized"})))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_partial_json(json!({"text": "duplicate"})))
        .respond_with(
            ResponseTemplate::new(403).set_body_string("You are not allowed to create a Tweet with duplicate content."),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_partial_json(json!({"text": "down"})))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let media = MediaId("m1".into());

    assert!(matches!(
        client.create_post("unauthorized", &media).await,
        Err(PublishError::Unauthorized(401))
    ));
    assert!(matches!(
        client.create_post("duplicate", &media).await,
        Err(PublishError::Rejected { status: 403, .. })
    ));
    assert!(matches!(
        client.create_post("down", &media).await,
        Err(PublishError::ServerError(503))
    ));
}

/// Test a missing media file fails before any request
#[tokio::test]
async fn test_missing_media_file() {
    let mock_server = MockServer::start().await;

    let result = client(&mock_server)
        .upload_media(std::path::Path::new("/nonexistent/clip.mp4"))
        .await;

    assert!(matches!(result, Err(PublishError::Io { .. })));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}
