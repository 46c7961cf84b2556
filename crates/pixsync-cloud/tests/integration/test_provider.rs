//! Integration tests for WebApiBlobStore through the ports

use bytes::Bytes;
use pixsync_cloud::client::WebApiClient;
use pixsync_cloud::provider::WebApiBlobStore;
use pixsync_core::domain::BlobPath;
use pixsync_core::ports::{BlobStoreError, IBlobStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_list_files_resolves_names_under_prefix() {
    let (server, client) = common::setup_api_mock().await;
    common::mount_listing(
        &server,
        "renders/images/p",
        &["b.png", "renders/images/p/a.png", "b.png", "renders/images/other/x.png"],
    )
    .await;
    let store = WebApiBlobStore::new(client);

    let paths = store.list_files("renders/images/p").await.unwrap();
    let paths: Vec<_> = paths.iter().map(BlobPath::as_str).collect();
    assert_eq!(paths, vec!["renders/images/p/a.png", "renders/images/p/b.png"]);
}

#[tokio::test]
async fn test_get_and_put_through_port() {
    let (server, client) = common::setup_api_mock().await;
    common::mount_blob_download(&server, "models/in.glb", b"remote").await;
    common::mount_blob_upload(&server, "models/out.glb").await;
    let store = WebApiBlobStore::new(client);

    let data = store
        .get_bytes(&BlobPath::new("models/in.glb").unwrap(), None)
        .await
        .unwrap();
    assert_eq!(data.as_ref(), b"remote");

    store
        .put_bytes(
            &BlobPath::new("models/out.glb").unwrap(),
            Bytes::from_static(b"local"),
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/GetUserResourceFiles"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let store = WebApiBlobStore::new(WebApiClient::with_base_url(
        Some(common::TEST_TOKEN.into()),
        server.uri(),
    ));

    let err = store.list_files("models").await.unwrap_err();
    assert!(matches!(err, BlobStoreError::Status { status: 500, .. }));

    store.set_id_token(None).await;
    let err = store.list_files("models").await.unwrap_err();
    assert_eq!(err, BlobStoreError::Unauthorized);
}

#[tokio::test]
async fn test_delete_missing_blob_is_not_found() {
    let (server, client) = common::setup_api_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/DeleteUserResourceFile"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let store = WebApiBlobStore::new(client);

    let err = store
        .delete_file(&BlobPath::new("models/gone.glb").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, BlobStoreError::NotFound(_)));
}
