//! Integration tests for pixsync-cloud
//!
//! Uses wiremock to simulate the renderer web API and blob storage, and
//! verifies end-to-end behavior of the WebApiClient and WebApiBlobStore.

mod common;

mod test_blob_ops;
mod test_provider;
