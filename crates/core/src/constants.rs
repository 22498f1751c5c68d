//! Constants used throughout the drive core crate.
//!
//! Backend route prefixes, defaults and limits live here so the HTTP client and the
//! configuration layer agree on them.

/// Backend base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Interval between liveness samples of an external editing surface.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Per-request timeout for backend calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Desktop launcher used to hand edit URLs off when no foreground surface command is
/// configured. It exits as soon as the URL is handed off, so its exit says nothing about when
/// editing ends.
pub const DEFAULT_LAUNCHER_COMMAND: &str = "xdg-open";

/// Largest file the client will try to upload (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Route prefix for per-file operations.
pub const FILES_ROUTE: &str = "v1/files/files";

/// Route for signed preview URLs.
pub const DOWNLOAD_ROUTE: &str = "v1/files/download";

/// Route for signed download URLs.
pub const DOWNLOAD_FILE_ROUTE: &str = "v1/files/downloadfile";

/// Route for folder operations.
pub const FOLDERS_ROUTE: &str = "v1/files/folders";

/// Route listing the root of the user's drive.
pub const LIST_FILES_ROUTE: &str = "v1/files/getfiles";

/// Route listing trashed files.
pub const TRASH_ROUTE: &str = "v1/files/trash";

/// Route for multipart uploads.
pub const UPLOAD_ROUTE: &str = "v1/files/upload";

/// Route returning the signed-in user.
pub const SESSION_ROUTE: &str = "api/session";

/// Route ending the session.
pub const LOGOUT_ROUTE: &str = "logout";

/// Content type assumed for uploads that cannot be sniffed or guessed.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
