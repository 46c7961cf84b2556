//! Shared test helpers for web API integration tests
//!
//! Provides wiremock-based mock server setup. Signed URLs handed out by the
//! mocked `GetUserBlobSasUrl` point back at the same server under `/blob/`.

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pixsync_cloud::client::WebApiClient;

pub const TEST_TOKEN: &str = "test-id-token";

/// Starts a mock server and returns a client pointing at it
pub async fn setup_api_mock() -> (MockServer, WebApiClient) {
    let server = MockServer::start().await;
    let client = WebApiClient::with_base_url(Some(TEST_TOKEN.to_string()), server.uri());
    (server, client)
}

/// Signed URL the mock hands out for `blob_path`
pub fn signed_url(server: &MockServer, blob_path: &str) -> String {
    format!("{}/blob/{}?sig=test-signature", server.uri(), blob_path)
}

/// Mounts `GetUserBlobSasUrl` for one blob path
pub async fn mount_sas_url(server: &MockServer, blob_path: &str) {
    Mock::given(method("GET"))
        .and(path("/GetUserBlobSasUrl"))
        .and(query_param("blobPath", blob_path))
        .and(header("Authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(signed_url(server, blob_path)))
        .mount(server)
        .await;
}

/// Mounts a signed-URL download for one blob path
pub async fn mount_blob_download(server: &MockServer, blob_path: &str, content: &[u8]) {
    mount_sas_url(server, blob_path).await;
    Mock::given(method("GET"))
        .and(path(format!("/blob/{blob_path}")))
        .and(query_param("sig", "test-signature"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}

/// Mounts a signed-URL block blob upload for one blob path
pub async fn mount_blob_upload(server: &MockServer, blob_path: &str) {
    mount_sas_url(server, blob_path).await;
    Mock::given(method("PUT"))
        .and(path(format!("/blob/{blob_path}")))
        .and(header("x-ms-blob-type", "BlockBlob"))
        .respond_with(ResponseTemplate::new(201))
        .mount(server)
        .await;
}

/// Mounts `GetUserResourceFiles` for one prefix
pub async fn mount_listing(server: &MockServer, prefix: &str, names: &[&str]) {
    let files: Vec<_> = names
        .iter()
        .map(|name| serde_json::json!({ "Name": name }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/GetUserResourceFiles"))
        .and(query_param("blobPrefix", prefix))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "directories": [{ "Files": files }]
        })))
        .mount(server)
        .await;
}
