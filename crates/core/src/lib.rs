//! # Drive Core
//!
//! Client-side logic for a cloud file drive whose plain-text files are edited in an external
//! editor.
//!
//! This crate contains:
//! - The typed HTTP client for the drive backend ([`HttpDriveClient`])
//! - The preview and external-edit synchronisation state machine ([`EditSyncCoordinator`])
//! - The capabilities the coordinator depends on ([`EditBackend`], [`ExternalSurface`],
//!   [`Notifier`]) so front ends and tests can swap them out
//!
//! **No UI concerns**: rendering and argument parsing belong in `drive-cli`.

pub mod backend;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod model;
pub mod notify;
pub mod sanitize;
pub mod session;
pub mod surface;
pub mod upload;

pub use backend::EditBackend;
pub use config::ClientConfig;
pub use coordinator::{EditFailure, EditPhase, EditSession, EditSyncCoordinator};
pub use drive_types::{NonEmptyText, ResourceId};
pub use error::{DriveError, DriveResult};
pub use http::HttpDriveClient;
pub use model::{FileHandle, FileKind, MediaType, PreviewStrategy, UserProfile, Visibility};
pub use notify::{Notice, Notifier, TracingNotifier};
pub use session::SessionContext;
pub use surface::{CommandSurface, ExternalSurface, LauncherSurface, SurfaceHandle};
pub use upload::UploadRequest;
