//! Integration tests for WebApiClient blob operations

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use pixsync_cloud::client::WebApiClient;
use pixsync_cloud::CloudError;
use pixsync_core::config::RemoteConfig;
use pixsync_core::domain::{RenderingJobRecord, RenderingSettings};
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

fn recorder() -> (Arc<Mutex<Vec<(u64, u64)>>>, pixsync_core::ports::ProgressFn) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: pixsync_core::ports::ProgressFn =
        Box::new(move |done: u64, total: u64| sink.lock().unwrap().push((done, total)));
    (seen, progress)
}

// ============================================================================
// Signed URLs
// ============================================================================

#[tokio::test]
async fn test_sas_url_is_parsed_from_plain_text() {
    let (server, client) = common::setup_api_mock().await;
    common::mount_sas_url(&server, "models/a.glb").await;

    let url = client.get_blob_sas_url("models/a.glb").await.unwrap();
    assert_eq!(url.as_str(), common::signed_url(&server, "models/a.glb"));
}

#[tokio::test]
async fn test_sas_url_garbage_is_invalid_url() {
    let (server, client) = common::setup_api_mock().await;
    Mock::given(method("GET"))
        .and(path("/GetUserBlobSasUrl"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not a url"))
        .mount(&server)
        .await;

    let err = client.get_blob_sas_url("models/a.glb").await.unwrap_err();
    assert!(matches!(err, CloudError::InvalidUrl(_)));
}

#[tokio::test]
async fn test_missing_token_sends_nothing() {
    let server = MockServer::start().await;
    let client = WebApiClient::with_base_url(None, server.uri());

    let err = client.list_resources("models").await.unwrap_err();
    assert!(matches!(err, CloudError::Unauthorized));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let (server, client) = common::setup_api_mock().await;
    Mock::given(method("GET"))
        .and(path("/GetUserBlobSasUrl"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.get_blob("models/a.glb", None).await.unwrap_err();
    assert!(matches!(err, CloudError::Unauthorized));
}

// ============================================================================
// Download / upload
// ============================================================================

#[tokio::test]
async fn test_download_reports_progress() {
    let (server, client) = common::setup_api_mock().await;
    let content: Vec<u8> = (0..100_000).map(|i| (i % 251) as u8).collect();
    common::mount_blob_download(&server, "renders/images/p/a.png", &content).await;

    let (seen, progress) = recorder();
    let data = client
        .get_blob("renders/images/p/a.png", Some(progress))
        .await
        .unwrap();

    assert_eq!(data.as_ref(), content.as_slice());
    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert_eq!(seen.last(), Some(&(100_000, 100_000)));
}

/// Client built from configuration with a one second request timeout
fn client_with_short_timeout(server: &MockServer) -> WebApiClient {
    let remote = RemoteConfig {
        api_url: server.uri(),
        request_timeout: 1,
        ..RemoteConfig::default()
    };
    WebApiClient::from_config(&remote, Some(common::TEST_TOKEN.to_string())).unwrap()
}

#[tokio::test]
async fn test_slow_blob_transfer_outlives_request_timeout() {
    let server = MockServer::start().await;
    let client = client_with_short_timeout(&server);
    common::mount_sas_url(&server, "models/big.glb").await;
    Mock::given(method("GET"))
        .and(path("/blob/models/big.glb"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow-model".to_vec())
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    let data = client.get_blob("models/big.glb", None).await.unwrap();
    assert_eq!(data.as_ref(), b"slow-model");
}

#[tokio::test]
async fn test_slow_api_call_times_out() {
    let server = MockServer::start().await;
    let client = client_with_short_timeout(&server);
    Mock::given(method("GET"))
        .and(path("/GetUserResourceFiles"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "directories": [] }))
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    let err = client.list_resources("models").await.unwrap_err();
    assert!(matches!(&err, CloudError::Network(e) if e.is_timeout()), "got {err}");
}

#[tokio::test]
async fn test_download_missing_blob_is_not_found() {
    let (server, client) = common::setup_api_mock().await;
    common::mount_sas_url(&server, "models/missing.glb").await;
    Mock::given(method("GET"))
        .and(path("/blob/models/missing.glb"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.get_blob("models/missing.glb", None).await.unwrap_err();
    assert!(matches!(err, CloudError::NotFound(p) if p == "models/missing.glb"));
}

#[tokio::test]
async fn test_upload_sends_block_blob() {
    let (server, client) = common::setup_api_mock().await;
    common::mount_blob_upload(&server, "models/a.glb").await;

    let content = Bytes::from(vec![7u8; 600_000]);
    let (seen, progress) = recorder();
    client
        .put_blob("models/a.glb", content.clone(), Some(progress))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .expect("upload request");
    assert_eq!(put.body, content.to_vec());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&(0, 600_000)));
    assert_eq!(seen.last(), Some(&(600_000, 600_000)));
}

#[tokio::test]
async fn test_upload_server_error_is_status() {
    let (server, client) = common::setup_api_mock().await;
    common::mount_sas_url(&server, "models/a.glb").await;
    Mock::given(method("PUT"))
        .and(path("/blob/models/a.glb"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client
        .put_blob("models/a.glb", Bytes::from_static(b"x"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CloudError::Status { status: 503, .. }));
}

// ============================================================================
// Listing, delete, renderer queue
// ============================================================================

#[tokio::test]
async fn test_list_resources_flattens_directories() {
    let (server, client) = common::setup_api_mock().await;
    Mock::given(method("GET"))
        .and(path("/GetUserResourceFiles"))
        .and(query_param("blobPrefix", "renders/videos/p"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "directories": [
                { "Files": [{ "Name": "a.mp4" }, { "Name": "b.mp4" }] },
                { "Files": [{ "Name": "c.mp4" }] }
            ]
        })))
        .mount(&server)
        .await;

    let names = client.list_resources("renders/videos/p").await.unwrap();
    assert_eq!(names, vec!["a.mp4", "b.mp4", "c.mp4"]);
}

#[tokio::test]
async fn test_list_resources_empty_body() {
    let (server, client) = common::setup_api_mock().await;
    Mock::given(method("GET"))
        .and(path("/GetUserResourceFiles"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    assert!(client.list_resources("models").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_blob_status() {
    let (server, client) = common::setup_api_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/DeleteUserResourceFile"))
        .and(query_param("blobPath", "models/a.glb"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/DeleteUserResourceFile"))
        .and(query_param("blobPath", "models/b.glb"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    assert!(client.delete_blob("models/a.glb").await.unwrap());
    assert!(!client.delete_blob("models/b.glb").await.unwrap());
}

#[tokio::test]
async fn test_notify_renderer_queue() {
    let (server, client) = common::setup_api_mock().await;
    let client = client.with_renderer_queue("production");
    let record = RenderingJobRecord::queued(
        Uuid::new_v4(),
        Uuid::new_v4(),
        common::TEST_TOKEN,
        RenderingSettings::default(),
    );
    Mock::given(method("POST"))
        .and(path("/RendererQueue"))
        .and(query_param("queue", "production"))
        .and(body_json(&record))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.notify_renderer_queue(&record).await.unwrap());
}

#[tokio::test]
async fn test_notify_renderer_queue_not_created() {
    let (server, client) = common::setup_api_mock().await;
    Mock::given(method("POST"))
        .and(path("/RendererQueue"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let record = RenderingJobRecord::pending(Uuid::new_v4());
    assert!(!client.notify_renderer_queue(&record).await.unwrap());
}
