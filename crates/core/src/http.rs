//! Session-scoped REST client for the drive backend.
//!
//! Every request carries the session cookie from [`SessionContext`]. Non-success statuses are
//! mapped to [`DriveError`] in one place ([`error_for_status`]) so callers can match on
//! `Unauthenticated`, `Forbidden`, `NotFound` and `PayloadTooLarge` directly.

use crate::backend::EditBackend;
use crate::config::ClientConfig;
use crate::constants::{
    DOWNLOAD_FILE_ROUTE, DOWNLOAD_ROUTE, FILES_ROUTE, FOLDERS_ROUTE, LIST_FILES_ROUTE,
    LOGOUT_ROUTE, SESSION_ROUTE, TRASH_ROUTE, UPLOAD_ROUTE,
};
use crate::model::{FileHandle, UserProfile};
use crate::session::SessionContext;
use crate::upload::{prepare_upload_file, UploadRequest};
use crate::{DriveError, DriveResult};
use async_trait::async_trait;
use drive_types::{NonEmptyText, ResourceId};
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use url::Url;

#[derive(Debug, Deserialize)]
struct SessionRes {
    user: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
struct LogoutRes {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignedUrlRes {
    url: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditSessionRes {
    edit_url: Url,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// REST client bound to one backend and one session.
#[derive(Clone, Debug)]
pub struct HttpDriveClient {
    client: Client,
    base_url: Url,
    session: SessionContext,
}

impl HttpDriveClient {
    /// Builds a client for the backend in `cfg`, sending `session`'s cookie on every call.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Http`] if the underlying HTTP client cannot be built.
    pub fn new(cfg: &ClientConfig, session: SessionContext) -> DriveResult<Self> {
        let client = Client::builder()
            .timeout(cfg.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url().clone(),
            session,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn url(&self, path: &str) -> DriveResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn file_url(&self, id: &ResourceId, action: Option<&str>) -> DriveResult<Url> {
        match action {
            Some(action) => self.url(&format!("{FILES_ROUTE}/{id}/{action}")),
            None => self.url(&format!("{FILES_ROUTE}/{id}")),
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.session.cookie() {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> DriveResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> DriveResult<T> {
        let body = self.send(builder).await?.text().await?;
        serde_json::from_str(&body).map_err(DriveError::Decode)
    }

    /// Checks the session cookie against `GET /api/session`.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Unauthenticated`] on `401` or when the backend reports no user.
    pub async fn check_session(&self) -> DriveResult<UserProfile> {
        let url = self.url(SESSION_ROUTE)?;
        let res: SessionRes = self.send_json(self.request(Method::GET, url)).await?;
        res.user.ok_or(DriveError::Unauthenticated)
    }

    /// Checks the session and returns a client whose [`SessionContext`] records the user.
    pub async fn authenticate(self) -> DriveResult<Self> {
        let user = self.check_session().await?;
        tracing::debug!("authenticated as {}", user.email);
        Ok(Self {
            session: self.session.clone().authenticated_as(user),
            ..self
        })
    }

    /// Ends the session on the backend (`POST /logout`).
    pub async fn logout(&self) -> DriveResult<()> {
        let url = self.url(LOGOUT_ROUTE)?;
        let res: LogoutRes = self.send_json(self.request(Method::POST, url)).await?;
        if res.success {
            Ok(())
        } else {
            let message = res.message.unwrap_or_else(|| "logout failed".into());
            tracing::warn!("logout refused: {}", message);
            Err(DriveError::Status {
                status: StatusCode::OK,
                message,
            })
        }
    }

    /// Lists the root of the user's drive.
    pub async fn list_files(&self) -> DriveResult<Vec<FileHandle>> {
        let url = self.url(LIST_FILES_ROUTE)?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Lists the contents of a folder.
    pub async fn list_folder(&self, folder_id: &ResourceId) -> DriveResult<Vec<FileHandle>> {
        let url = self.url(&format!("{FOLDERS_ROUTE}/{folder_id}/files"))?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Lists files currently in the trash.
    pub async fn list_trash(&self) -> DriveResult<Vec<FileHandle>> {
        let url = self.url(TRASH_ROUTE)?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Fetches a single file document. Works without a session for public files.
    ///
    /// # Errors
    ///
    /// [`DriveError::Forbidden`] for a private file the session cannot read,
    /// [`DriveError::NotFound`] for an unknown id.
    pub async fn get_file(&self, id: &ResourceId) -> DriveResult<FileHandle> {
        let url = self.file_url(id, None)?;
        self.send_json(self.request(Method::GET, url)).await
    }

    pub async fn move_to_trash(&self, id: &ResourceId) -> DriveResult<()> {
        let url = self.file_url(id, Some("trash"))?;
        self.send(self.request(Method::POST, url)).await?;
        tracing::info!("moved {} to trash", id);
        Ok(())
    }

    pub async fn restore(&self, id: &ResourceId) -> DriveResult<()> {
        let url = self.file_url(id, Some("restore"))?;
        self.send(self.request(Method::POST, url)).await?;
        tracing::info!("restored {}", id);
        Ok(())
    }

    pub async fn delete_permanently(&self, id: &ResourceId) -> DriveResult<()> {
        let url = self.file_url(id, Some("permanent"))?;
        self.send(self.request(Method::DELETE, url)).await?;
        tracing::info!("permanently deleted {}", id);
        Ok(())
    }

    /// Signed URL for downloading the original bytes of a file.
    pub async fn download_url(&self, id: &ResourceId) -> DriveResult<Url> {
        let url = self.url(&format!("{DOWNLOAD_FILE_ROUTE}/{id}"))?;
        let res: SignedUrlRes = self.send_json(self.request(Method::GET, url)).await?;
        Ok(res.url)
    }

    /// Downloads a file to `dest` and returns the number of bytes written.
    ///
    /// The signed URL is pre-authorised, so the session cookie is not sent to it.
    pub async fn download_to(&self, id: &ResourceId, dest: &Path) -> DriveResult<u64> {
        let signed = self.download_url(id).await?;
        let bytes = self
            .send(self.client.get(signed))
            .await?
            .bytes()
            .await?;
        tokio::fs::write(dest, &bytes).await.map_err(|e| {
            DriveError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write {}: {}", dest.display(), e),
            ))
        })?;
        Ok(bytes.len() as u64)
    }

    /// Creates a folder at the drive root.
    pub async fn create_folder(&self, name: &NonEmptyText) -> DriveResult<FileHandle> {
        let url = self.url(FOLDERS_ROUTE)?;
        let body = serde_json::json!({ "name": name });
        let folder = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;
        tracing::info!("created folder {}", name);
        Ok(folder)
    }

    /// Uploads one or more local files in a single multipart request.
    ///
    /// Every file is read and size-checked before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns `DriveError` if:
    /// - `request.paths` is empty ([`DriveError::InvalidInput`])
    /// - a file is missing or unreadable ([`DriveError::Io`])
    /// - a file exceeds the upload limit, locally or per the backend's `413`
    ///   ([`DriveError::PayloadTooLarge`])
    pub async fn upload(&self, request: &UploadRequest) -> DriveResult<serde_json::Value> {
        if request.paths.is_empty() {
            return Err(DriveError::InvalidInput("no files to upload".into()));
        }

        let mut form = Form::new();
        for path in &request.paths {
            let file = prepare_upload_file(path).await?;
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }
        form = form.text("isPublic", request.visibility.is_public().to_string());
        if let Some(parent) = &request.parent {
            form = form.text("parent", parent.to_string());
        }

        let url = self.url(UPLOAD_ROUTE)?;
        let res = self
            .send_json(self.request(Method::POST, url).multipart(form))
            .await?;
        tracing::info!("uploaded {} file(s)", request.paths.len());
        Ok(res)
    }
}

#[async_trait]
impl EditBackend for HttpDriveClient {
    async fn fetch_content(&self, id: &ResourceId) -> DriveResult<String> {
        let url = self.file_url(id, Some("content"))?;
        let response = self.send(self.request(Method::GET, url)).await?;
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        let body = response.text().await?;
        if is_json {
            // A JSON string body is the text itself; anything else is passed through verbatim.
            if let Ok(text) = serde_json::from_str::<String>(&body) {
                return Ok(text);
            }
        }
        Ok(body)
    }

    async fn resolve_signed_url(&self, id: &ResourceId) -> DriveResult<Url> {
        let url = self.url(&format!("{DOWNLOAD_ROUTE}/{id}"))?;
        let res: SignedUrlRes = self.send_json(self.request(Method::GET, url)).await?;
        Ok(res.url)
    }

    async fn start_edit(&self, id: &ResourceId) -> DriveResult<Url> {
        let url = self.file_url(id, Some("edit"))?;
        let res: EditSessionRes = self.send_json(self.request(Method::POST, url)).await?;
        Ok(res.edit_url)
    }

    async fn persist_edit(&self, id: &ResourceId) -> DriveResult<()> {
        let url = self.file_url(id, Some("content"))?;
        self.send(self.request(Method::PUT, url)).await?;
        Ok(())
    }
}

/// Maps a non-success status and its body to a [`DriveError`].
///
/// The backend reports failures as `{ "message": "..." }`; when the body is not in that shape
/// the raw body (or the status reason) is used instead.
pub fn error_for_status(status: StatusCode, body: &str) -> DriveError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });

    match status {
        StatusCode::UNAUTHORIZED => DriveError::Unauthenticated,
        StatusCode::FORBIDDEN => DriveError::Forbidden(message),
        StatusCode::NOT_FOUND => DriveError::NotFound(message),
        StatusCode::PAYLOAD_TOO_LARGE => DriveError::PayloadTooLarge(message),
        _ => DriveError::Status { status, message },
    }
}
