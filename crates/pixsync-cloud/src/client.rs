//! Renderer web API client
//!
//! Provides a typed HTTP client for the renderer's Azure Functions API and
//! for the signed blob URLs it hands out.
//!
//! Every API call carries `Authorization: Bearer <id token>`; without a
//! token the call fails with [`CloudError::Unauthorized`] before anything is
//! sent. Signed URLs are self-authorizing and are requested without it.
//!
//! The configured request timeout bounds API calls only. Blob bodies moved
//! through signed URLs may take far longer; for those only the connection
//! attempt is bounded.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pixsync_cloud::client::WebApiClient;
//!
//! # async fn example() -> Result<(), pixsync_cloud::CloudError> {
//! let client = WebApiClient::new(Some("id-token".to_string()));
//! let names = client.list_resources("models").await?;
//! println!("{} models", names.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};
use pixsync_core::config::RemoteConfig;
use pixsync_core::domain::RenderingJobRecord;
use pixsync_core::ports::ProgressFn;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::CloudError;

/// Base URL of the renderer web API
pub const DEFAULT_API_URL: &str = "https://pixelrenderer-azurefunctions.azurewebsites.net/api";

/// Queue notified of new rendering requests
pub const DEFAULT_RENDERER_QUEUE: &str = "debug";

/// Size of the pieces an upload body is streamed in
const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Header required by Azure blob storage on signed-URL uploads
const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";

/// Largest buffer reserved up front from an announced `Content-Length`
const MAX_PREALLOCATION: u64 = 8 << 20;

// ============================================================================
// Web API response types
// ============================================================================

/// Response of `GetUserResourceFiles`
#[derive(Debug, Default, Deserialize)]
struct ResourceListing {
    #[serde(default)]
    directories: Vec<ResourceDirectory>,
}

#[derive(Debug, Deserialize)]
struct ResourceDirectory {
    #[serde(rename = "Files", default)]
    files: Vec<ResourceFile>,
}

#[derive(Debug, Deserialize)]
struct ResourceFile {
    #[serde(rename = "Name")]
    name: Option<String>,
}

// ============================================================================
// WebApiClient
// ============================================================================

/// HTTP client for the renderer web API
#[derive(Debug, Clone)]
pub struct WebApiClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests, without a trailing slash
    base_url: String,
    /// Credential sent as bearer token
    id_token: Option<String>,
    /// Queue name passed to `RendererQueue`
    renderer_queue: String,
    /// Total time allowed for one API call
    request_timeout: Option<Duration>,
}

impl WebApiClient {
    /// Creates a client for the production API
    pub fn new(id_token: Option<String>) -> Self {
        Self::with_base_url(id_token, DEFAULT_API_URL)
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(id_token: Option<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            id_token,
            renderer_queue: DEFAULT_RENDERER_QUEUE.to_string(),
            request_timeout: None,
        }
    }

    /// Creates a client from the `remote` configuration section
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(
        remote: &RemoteConfig,
        id_token: Option<String>,
    ) -> Result<Self, CloudError> {
        let timeout = Duration::from_secs(remote.request_timeout);
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            client,
            ..Self::with_base_url(id_token, remote.api_url.clone())
                .with_renderer_queue(remote.renderer_queue.clone())
                .with_request_timeout(timeout)
        })
    }

    /// Bounds the total duration of every API call
    ///
    /// Signed-URL transfers are not affected.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the queue notified by [`notify_renderer_queue`](Self::notify_renderer_queue)
    pub fn with_renderer_queue(mut self, queue: impl Into<String>) -> Self {
        self.renderer_queue = queue.into();
        self
    }

    /// Replaces the id token (e.g. after signing in again)
    pub fn set_id_token(&mut self, id_token: Option<String>) {
        self.id_token = id_token;
        debug!("Updated WebApiClient id token");
    }

    pub fn has_id_token(&self) -> bool {
        self.id_token.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn renderer_queue(&self) -> &str {
        &self.renderer_queue
    }

    /// Creates an authenticated request builder for an API endpoint
    ///
    /// # Errors
    /// Returns [`CloudError::Unauthorized`] if no id token is configured
    pub fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder, CloudError> {
        let token = self.id_token.as_deref().ok_or(CloudError::Unauthorized)?;
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let builder = self.client.request(method, url).bearer_auth(token);
        Ok(match self.request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        })
    }

    /// Asks the API for a signed URL granting access to one blob
    ///
    /// `GET /GetUserBlobSasUrl?blobPath=<path>`; the body is the URL as
    /// plain text.
    pub async fn get_blob_sas_url(&self, blob_path: &str) -> Result<Url, CloudError> {
        let response = self
            .request(Method::GET, "GetUserBlobSasUrl")?
            .query(&[("blobPath", blob_path)])
            .send()
            .await?;
        let response = check_status(response, "GetUserBlobSasUrl")?;

        let text = response.text().await?;
        let sas_url = Url::parse(text.trim())
            .map_err(|e| CloudError::InvalidUrl(format!("{e}: {}", text.trim())))?;
        debug!(blob_path, host = ?sas_url.host_str(), "Signed URL issued");
        Ok(sas_url)
    }

    /// Lists the names of every resource under a prefix
    ///
    /// `GET /GetUserResourceFiles?blobPrefix=<prefix>`, flattening
    /// `directories[].Files[].Name`.
    pub async fn list_resources(&self, blob_prefix: &str) -> Result<Vec<String>, CloudError> {
        let response = self
            .request(Method::GET, "GetUserResourceFiles")?
            .query(&[("blobPrefix", blob_prefix)])
            .send()
            .await?;
        let response = check_status(response, "GetUserResourceFiles")?;

        let body = response.bytes().await?;
        let listing: ResourceListing = if body.iter().all(u8::is_ascii_whitespace) {
            ResourceListing::default()
        } else {
            serde_json::from_slice(&body)
                .map_err(|e| CloudError::InvalidResponse(format!("resource listing: {e}")))?
        };

        let names: Vec<String> = listing
            .directories
            .into_iter()
            .flat_map(|directory| directory.files)
            .filter_map(|file| file.name)
            .collect();
        debug!(blob_prefix, count = names.len(), "Resources listed");
        Ok(names)
    }

    /// Deletes one blob
    ///
    /// `DELETE /DeleteUserResourceFile?blobPath=<path>`
    ///
    /// # Returns
    /// `true` if the API answered 200
    pub async fn delete_blob(&self, blob_path: &str) -> Result<bool, CloudError> {
        let response = self
            .request(Method::DELETE, "DeleteUserResourceFile")?
            .query(&[("blobPath", blob_path)])
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CloudError::Unauthorized),
            StatusCode::NOT_FOUND => Err(CloudError::NotFound(blob_path.to_string())),
            status => {
                debug!(blob_path, status = status.as_u16(), "Delete answered");
                Ok(status == StatusCode::OK)
            }
        }
    }

    /// Announces a rendering request to the renderer queue
    ///
    /// `POST /RendererQueue?queue=<queue>` with the request manifest as body.
    ///
    /// # Returns
    /// `true` if the queue answered 201
    pub async fn notify_renderer_queue(
        &self,
        record: &RenderingJobRecord,
    ) -> Result<bool, CloudError> {
        let response = self
            .request(Method::POST, "RendererQueue")?
            .query(&[("queue", self.renderer_queue.as_str())])
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(CloudError::Unauthorized);
        }
        info!(
            request = %record.id,
            queue = %self.renderer_queue,
            status = status.as_u16(),
            "Renderer queue notified"
        );
        Ok(status == StatusCode::CREATED)
    }

    /// Reads a blob through a fresh signed URL
    pub async fn get_blob(
        &self,
        blob_path: &str,
        progress: Option<ProgressFn>,
    ) -> Result<Bytes, CloudError> {
        let url = self.get_blob_sas_url(blob_path).await?;
        self.download_from_signed_url(url, blob_path, progress).await
    }

    /// Writes a blob through a fresh signed URL
    pub async fn put_blob(
        &self,
        blob_path: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<(), CloudError> {
        let url = self.get_blob_sas_url(blob_path).await?;
        self.upload_to_signed_url(url, blob_path, data, progress).await
    }

    /// Streams a response body into memory, reporting progress per chunk
    ///
    /// # Arguments
    /// * `url` - Signed URL of the blob
    /// * `blob_path` - Blob the URL refers to, for error reporting
    /// * `progress` - Optional callback reporting (bytes_received, content_length)
    pub async fn download_from_signed_url(
        &self,
        url: Url,
        blob_path: &str,
        progress: Option<ProgressFn>,
    ) -> Result<Bytes, CloudError> {
        let response = self.client.get(url).send().await?;
        let response = check_status(response, blob_path)?;

        let total = response.content_length().unwrap_or(0);
        let mut data = BytesMut::with_capacity(initial_capacity(total));
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk?);
            if let Some(progress) = &progress {
                progress(data.len() as u64, total);
            }
        }

        debug!(blob_path, bytes = data.len(), "Blob downloaded");
        Ok(data.freeze())
    }

    /// Uploads a body to a signed URL as a block blob
    ///
    /// The body is streamed in fixed-size chunks; progress is reported as
    /// each chunk is handed to the transport.
    pub async fn upload_to_signed_url(
        &self,
        url: Url,
        blob_path: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<(), CloudError> {
        let total = data.len() as u64;
        let progress = progress.map(Arc::new);
        if let Some(progress) = &progress {
            progress(0, total);
        }

        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
            .collect();
        let mut sent = 0u64;
        let body = stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            if let Some(progress) = &progress {
                progress(sent, total);
            }
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let response = self
            .client
            .put(url)
            .header(BLOB_TYPE_HEADER, "BlockBlob")
            .header(CONTENT_LENGTH, total)
            .body(Body::wrap_stream(body))
            .send()
            .await?;
        check_status(response, blob_path)?;

        debug!(blob_path, bytes = total, "Blob uploaded");
        Ok(())
    }
}

/// Buffer reserved for a body announced as `content_length` bytes
///
/// The announced length is only a hint; the buffer grows as data arrives.
fn initial_capacity(content_length: u64) -> usize {
    content_length.min(MAX_PREALLOCATION) as usize
}

/// Classifies a non-success status
fn check_status(response: Response, endpoint: &str) -> Result<Response, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CloudError::Unauthorized,
        StatusCode::NOT_FOUND => CloudError::NotFound(endpoint.to_string()),
        _ => CloudError::Status {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = WebApiClient::with_base_url(None, "http://localhost:1234/api/");
        assert_eq!(client.base_url(), "http://localhost:1234/api");
    }

    #[test]
    fn test_request_without_token_is_unauthorized() {
        let client = WebApiClient::new(None);
        assert!(matches!(
            client.request(Method::GET, "GetUserResourceFiles"),
            Err(CloudError::Unauthorized)
        ));
    }

    #[test]
    fn test_from_config() {
        let remote = RemoteConfig {
            api_url: "http://localhost:9000/api".into(),
            renderer_queue: "production".into(),
            request_timeout: 10,
        };
        let client = WebApiClient::from_config(&remote, Some("t".into())).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000/api");
        assert_eq!(client.renderer_queue(), "production");
        assert!(client.has_id_token());
    }

    #[test]
    fn test_request_timeout_applies_to_api_calls() {
        let remote = RemoteConfig {
            request_timeout: 7,
            ..RemoteConfig::default()
        };
        let client = WebApiClient::from_config(&remote, Some("t".into())).unwrap();
        let request = client
            .request(Method::GET, "GetUserResourceFiles")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.timeout(), Some(&Duration::from_secs(7)));

        let signed = client.client.get("http://localhost/blob/a").build().unwrap();
        assert_eq!(signed.timeout(), None);
    }

    #[test]
    fn test_initial_capacity_is_capped() {
        assert_eq!(initial_capacity(0), 0);
        assert_eq!(initial_capacity(1024), 1024);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOCATION as usize);
    }

    #[test]
    fn test_listing_tolerates_missing_fields() {
        let listing: ResourceListing = serde_json::from_str(
            r#"{"directories":[{"Files":[{"Name":"a.png"},{"Size":3}]},{}]}"#,
        )
        .unwrap();
        let names: Vec<_> = listing
            .directories
            .into_iter()
            .flat_map(|d| d.files)
            .filter_map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a.png"]);
    }
}
