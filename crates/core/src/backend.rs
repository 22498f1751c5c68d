//! The backend calls the edit coordinator depends on.
//!
//! [`HttpDriveClient`](crate::HttpDriveClient) is the production implementation; tests
//! substitute in-memory fakes.

use crate::DriveResult;
use async_trait::async_trait;
use drive_types::ResourceId;
use url::Url;

#[async_trait]
pub trait EditBackend: Send + Sync {
    /// Raw text content of a text file (`GET /v1/files/files/{id}/content`).
    async fn fetch_content(&self, id: &ResourceId) -> DriveResult<String>;

    /// Time-limited signed URL for previewing binary media (`GET /v1/files/download/{id}`).
    async fn resolve_signed_url(&self, id: &ResourceId) -> DriveResult<Url>;

    /// Asks the backend to open an external edit session and returns the URL to open
    /// (`POST /v1/files/files/{id}/edit`).
    async fn start_edit(&self, id: &ResourceId) -> DriveResult<Url>;

    /// Asks the backend to pull whatever the external editor produced into canonical storage
    /// (`PUT /v1/files/files/{id}/content`).
    async fn persist_edit(&self, id: &ResourceId) -> DriveResult<()>;
}
