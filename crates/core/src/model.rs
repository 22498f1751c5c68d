//! Backend documents as the client sees them.
//!
//! Field names follow the backend's JSON (`_id`, `fileType`, `isPublic`, ...) through serde
//! renames; the Rust side uses its own names and typed enums.

use chrono::{DateTime, Utc};
use drive_types::ResourceId;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

/// Whether a handle names a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    #[default]
    File,
    Folder,
}

/// Who may read a file through its public link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl From<bool> for Visibility {
    fn from(is_public: bool) -> Self {
        if is_public {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

impl Visibility {
    pub fn is_public(self) -> bool {
        matches!(self, Visibility::Public)
    }
}

/// Media type tag of a stored file, reduced to the cases that change how it is previewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    /// `text/plain`
    TextPlain,
    /// One of the raster formats the preview can show (`image/png`, `image/jpeg`,
    /// `image/gif`, `image/webp`).
    Image(String),
    /// `application/pdf`
    Pdf,
    /// Anything else, kept verbatim.
    Other(String),
}

/// How a file should be previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStrategy {
    /// Fetch the text content and show it sanitized.
    InlineText,
    /// Resolve a signed URL and show the image.
    SignedImage,
    /// No inline preview; offer download.
    None,
}

const PREVIEWABLE_IMAGES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

impl MediaType {
    pub fn parse(raw: &str) -> Self {
        let essence = raw
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" => MediaType::TextPlain,
            "application/pdf" => MediaType::Pdf,
            e if PREVIEWABLE_IMAGES.contains(&e) => MediaType::Image(essence),
            _ => MediaType::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MediaType::TextPlain => "text/plain",
            MediaType::Pdf => "application/pdf",
            MediaType::Image(s) | MediaType::Other(s) => s,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, MediaType::TextPlain)
    }

    pub fn is_image(&self) -> bool {
        matches!(self, MediaType::Image(_))
    }

    pub fn preview_strategy(&self) -> PreviewStrategy {
        match self {
            MediaType::TextPlain => PreviewStrategy::InlineText,
            MediaType::Image(_) => PreviewStrategy::SignedImage,
            MediaType::Pdf | MediaType::Other(_) => PreviewStrategy::None,
        }
    }
}

impl Default for MediaType {
    fn default() -> Self {
        MediaType::Other(String::new())
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| MediaType::parse(&s)).unwrap_or_default())
    }
}

impl Serialize for MediaType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

fn visibility_from_flag<'de, D>(deserializer: D) -> Result<Visibility, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?
        .map(Visibility::from)
        .unwrap_or_default())
}

// Root-level documents carry `parent: ""` or `null`.
fn parent_from_raw<'de, D>(deserializer: D) -> Result<Option<ResourceId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.is_empty() => ResourceId::parse(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// A file or folder stored in the drive.
///
/// `content` is only ever set by an explicit content fetch and `remote_path` only by an
/// explicit signed-URL resolution; neither is trusted from a listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileHandle {
    #[serde(rename = "_id")]
    pub id: ResourceId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: FileKind,
    #[serde(rename = "fileType", default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub size: u64,
    #[serde(default, deserialize_with = "parent_from_raw")]
    pub parent: Option<ResourceId>,
    #[serde(rename = "isPublic", default, deserialize_with = "visibility_from_flag")]
    pub visibility: Visibility,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "deletedAt", default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub content: Option<String>,
    #[serde(skip)]
    pub remote_path: Option<Url>,
}

impl FileHandle {
    /// A bare handle with no backend metadata beyond what the coordinator needs.
    pub fn new(id: ResourceId, kind: FileKind, media_type: MediaType) -> Self {
        Self {
            id,
            name: String::new(),
            kind,
            media_type,
            size: 0,
            parent: None,
            visibility: Visibility::Private,
            created_at: None,
            deleted_at: None,
            content: None,
            remote_path: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// True for the only kind of file that can be handed to the external editor.
    pub fn is_editable_text(&self) -> bool {
        self.is_file() && self.media_type.is_text()
    }

    pub fn preview_strategy(&self) -> PreviewStrategy {
        if self.is_file() {
            self.media_type.preview_strategy()
        } else {
            PreviewStrategy::None
        }
    }
}

/// The signed-in user, as returned by `GET /api/session`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub total_storage_used: u64,
    #[serde(default)]
    pub storage_limit: u64,
}

impl UserProfile {
    /// Share of the storage quota in use, in percent, clamped to `0..=100`.
    pub fn storage_percent_used(&self) -> f64 {
        if self.storage_limit == 0 {
            return 0.0;
        }
        let pct = self.total_storage_used as f64 * 100.0 / self.storage_limit as f64;
        pct.clamp(0.0, 100.0)
    }
}

/// Human-readable size using binary multiples (`1536` → `"1.5 KB"`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
