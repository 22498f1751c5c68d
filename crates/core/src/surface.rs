//! External editing surfaces.
//!
//! An external surface is a UI context this process does not control, typically a browser
//! window opened on the third-party editor. The only things the coordinator can do with it
//! are open one and ask whether it is still open; there is no close notification, so
//! liveness is sampled.

use crate::{DriveError, DriveResult};
use std::collections::{HashMap, HashSet};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use url::Url;

/// Opaque reference to an opened surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

pub trait ExternalSurface: Send + Sync {
    /// Opens `url` in a new surface.
    fn open(&self, url: &Url) -> DriveResult<SurfaceHandle>;

    /// Liveness probe. Unknown handles report closed.
    fn is_open(&self, handle: &SurfaceHandle) -> bool;
}

/// Opens edit URLs by running a local command with the URL as its last argument.
///
/// The surface counts as open while the child process is running, so the command should stay
/// in the foreground for as long as the editor is in use (for example
/// `firefox --new-instance`). Launchers that return immediately (`xdg-open`) look closed on
/// the next sample; wrap those in [`LauncherSurface`].
#[derive(Debug)]
pub struct CommandSurface {
    program: String,
    args: Vec<String>,
    next_handle: AtomicU64,
    children: Mutex<HashMap<SurfaceHandle, Child>>,
}

impl CommandSurface {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            next_handle: AtomicU64::new(1),
            children: Mutex::new(HashMap::new()),
        }
    }

    fn children(&self) -> MutexGuard<'_, HashMap<SurfaceHandle, Child>> {
        self.children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ExternalSurface for CommandSurface {
    fn open(&self, url: &Url) -> DriveResult<SurfaceHandle> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DriveError::Surface(format!("failed to run {}: {}", self.program, e)))?;

        let handle = SurfaceHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        tracing::debug!("opened {} (pid {})", handle, child.id());
        self.children().insert(handle, child);
        Ok(handle)
    }

    fn is_open(&self, handle: &SurfaceHandle) -> bool {
        let mut children = self.children();
        let Some(child) = children.get_mut(handle) else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::debug!("{} exited with {}", handle, status);
                children.remove(handle);
                false
            }
            Err(e) => {
                tracing::warn!("cannot query {}: {}", handle, e);
                children.remove(handle);
                false
            }
        }
    }
}

/// Opens edit URLs with a launcher that hands off and exits, such as `xdg-open`.
///
/// The launcher's exit says nothing about the editor, so a surface stays open until
/// [`finish`](LauncherSurface::finish) or [`finish_all`](LauncherSurface::finish_all) is
/// called, typically once the user confirms they are done.
#[derive(Debug)]
pub struct LauncherSurface {
    launcher: CommandSurface,
    open: Mutex<HashSet<SurfaceHandle>>,
}

impl LauncherSurface {
    pub fn new(launcher: CommandSurface) -> Self {
        Self {
            launcher,
            open: Mutex::new(HashSet::new()),
        }
    }

    fn open_handles(&self) -> MutexGuard<'_, HashSet<SurfaceHandle>> {
        self.open
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks `handle` as closed. Returns `false` if it was not open.
    pub fn finish(&self, handle: &SurfaceHandle) -> bool {
        self.open_handles().remove(handle)
    }

    /// Marks every surface opened so far as closed.
    pub fn finish_all(&self) {
        self.open_handles().clear();
    }
}

impl ExternalSurface for LauncherSurface {
    fn open(&self, url: &Url) -> DriveResult<SurfaceHandle> {
        let handle = self.launcher.open(url)?;
        self.open_handles().insert(handle);
        Ok(handle)
    }

    fn is_open(&self, handle: &SurfaceHandle) -> bool {
        // Reaps the launcher process; its exit status is irrelevant here.
        self.launcher.is_open(handle);
        self.open_handles().contains(handle)
    }
}
