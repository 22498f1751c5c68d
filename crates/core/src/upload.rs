//! Preparing local files for a multipart upload.
//!
//! Files are read fully into memory (the backend caps uploads at 10 MiB), checked against the
//! limit before any request is sent, and tagged with a best-effort content type.

use crate::constants::{FALLBACK_CONTENT_TYPE, MAX_UPLOAD_BYTES};
use crate::model::Visibility;
use crate::{DriveError, DriveResult};
use drive_types::ResourceId;
use std::path::{Path, PathBuf};

/// What to upload and where.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub paths: Vec<PathBuf>,
    pub visibility: Visibility,
    /// Target folder; `None` uploads to the drive root.
    pub parent: Option<ResourceId>,
}

/// A file read from disk and ready to become a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Reads `path` and prepares it for upload.
///
/// # Errors
///
/// Returns `DriveError` if:
/// - the path has no usable file name ([`DriveError::InvalidInput`])
/// - the file cannot be read ([`DriveError::Io`])
/// - the file is larger than [`MAX_UPLOAD_BYTES`] ([`DriveError::PayloadTooLarge`])
pub async fn prepare_upload_file(path: &Path) -> DriveResult<UploadFile> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            DriveError::InvalidInput(format!("not a file path: {}", path.display()))
        })?
        .to_string();

    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        DriveError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to stat {}: {}", path.display(), e),
        ))
    })?;
    if metadata.len() > MAX_UPLOAD_BYTES {
        return Err(DriveError::PayloadTooLarge(format!(
            "{} is {} bytes; the limit is {} bytes",
            path.display(),
            metadata.len(),
            MAX_UPLOAD_BYTES
        )));
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| {
        DriveError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read {}: {}", path.display(), e),
        ))
    })?;

    let content_type = content_type_for(path, &bytes);
    Ok(UploadFile {
        file_name,
        content_type,
        bytes,
    })
}

/// Sniffs the content type from the bytes, then falls back to the file extension.
pub fn content_type_for(path: &Path, bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") | Some("text") | Some("md") | Some("log") => "text/plain",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        _ => FALLBACK_CONTENT_TYPE,
    }
    .to_string()
}
