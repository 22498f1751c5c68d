//! Preview selection and external-editor synchronisation.
//!
//! [`EditSyncCoordinator`] owns two independent pieces of state:
//!
//! - the **active file**: what the preview is showing, replaced by every
//!   [`select_file`](EditSyncCoordinator::select_file) and cleared by
//!   [`close_preview`](EditSyncCoordinator::close_preview);
//! - the **edit session**: a plain-text file handed to an external editor.
//!
//! ## Edit session phases
//!
//! ```text
//! idle ──request_external_edit──▶ awaiting-external-open ──surface opened──▶ editing
//!                                        │                                     │
//!                                        ▼ start failed                        ▼ surface closed
//!                                      failed ◀──────── persist/refetch failed ── reconciling
//!                                                                              │
//!                                                                              ▼
//!                                                                            synced
//! ```
//!
//! `synced` and `failed` are terminal; the next request starts a fresh session.
//!
//! While `editing`, a spawned task samples [`ExternalSurface::is_open`] every poll interval.
//! When the surface is gone it asks the backend to persist the external edits, re-fetches the
//! canonical content and merges it into the active file, but only if that file is still the
//! one being previewed.
//!
//! Sessions are numbered. A session's task keeps running after it has been superseded (the
//! edits it is responsible for still have to be persisted), but once a newer session exists
//! its phase updates are discarded, so a late completion can never clobber newer state.

use crate::backend::EditBackend;
use crate::config::ClientConfig;
use crate::http::HttpDriveClient;
use crate::model::{FileHandle, PreviewStrategy};
use crate::notify::{Notice, Notifier};
use crate::sanitize::sanitize_content;
use crate::session::SessionContext;
use crate::surface::{ExternalSurface, SurfaceHandle};
use crate::DriveResult;
use drive_types::ResourceId;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

const EDIT_LOADING_MESSAGE: &str = "Redirecting to Google Docs...";
const EDIT_SYNCED_MESSAGE: &str = "File updated with your changes from Google Docs.";
const EDIT_START_FAILED_MESSAGE: &str =
    "Unable to open the file in Google Docs. Please try again later.";

/// Phase of the current edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Idle,
    AwaitingExternalOpen,
    Editing,
    Reconciling,
    Synced,
    Failed,
}

impl EditPhase {
    /// Between a successful request and a terminal phase.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            EditPhase::AwaitingExternalOpen | EditPhase::Editing | EditPhase::Reconciling
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EditPhase::Synced | EditPhase::Failed)
    }
}

impl std::fmt::Display for EditPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EditPhase::Idle => "idle",
            EditPhase::AwaitingExternalOpen => "awaiting-external-open",
            EditPhase::Editing => "editing",
            EditPhase::Reconciling => "reconciling",
            EditPhase::Synced => "synced",
            EditPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a session ended in [`EditPhase::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditFailure {
    /// The backend refused the edit session or the surface could not be opened.
    SessionStart,
    /// Persisting or re-fetching after the surface closed failed.
    Reconciliation,
    /// The surface stayed open longer than the configured edit timeout.
    TimedOut,
}

/// Snapshot of the current edit session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub number: u64,
    pub target: ResourceId,
    pub external_handle: Option<SurfaceHandle>,
    pub phase: EditPhase,
    pub failure: Option<EditFailure>,
}

#[derive(Debug, Default)]
struct State {
    active: Option<FileHandle>,
    // Bumped by every select/close so late fetches for an older selection are dropped.
    selection: u64,
    // Bumped whenever reconciled content is merged; a content fetch that started earlier is stale.
    reconciled_writes: u64,
    preview_loading: bool,
    session: Option<EditSession>,
    sessions_started: u64,
}

struct Inner {
    backend: Arc<dyn EditBackend>,
    surface: Arc<dyn ExternalSurface>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
    edit_timeout: Option<Duration>,
    state: Mutex<State>,
    phase_tx: watch::Sender<EditPhase>,
}

/// Coordinates the preview and the external edit flow. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EditSyncCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EditSyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSyncCoordinator")
            .field("poll_interval", &self.inner.poll_interval)
            .field("edit_timeout", &self.inner.edit_timeout)
            .field("phase", &self.phase())
            .finish()
    }
}

impl EditSyncCoordinator {
    /// Creates a coordinator with explicit collaborators.
    ///
    /// Poll interval and edit timeout are taken from `cfg`.
    pub fn new(
        cfg: &ClientConfig,
        backend: Arc<dyn EditBackend>,
        surface: Arc<dyn ExternalSurface>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(EditPhase::Idle);
        Self {
            inner: Arc::new(Inner {
                backend,
                surface,
                notifier,
                poll_interval: cfg.poll_interval(),
                edit_timeout: cfg.edit_timeout(),
                state: Mutex::new(State::default()),
                phase_tx,
            }),
        }
    }

    /// Creates a coordinator backed by [`HttpDriveClient`] for an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Unauthenticated`](crate::DriveError::Unauthenticated) if
    /// `session` has not passed a session check, or an HTTP client construction error.
    pub fn for_session(
        cfg: &ClientConfig,
        session: SessionContext,
        surface: Arc<dyn ExternalSurface>,
        notifier: Arc<dyn Notifier>,
    ) -> DriveResult<Self> {
        session.require_authenticated()?;
        let client = HttpDriveClient::new(cfg, session)?;
        Ok(Self::new(cfg, Arc::new(client), surface, notifier))
    }

    /// Makes `file` the active preview target and loads what its preview needs.
    ///
    /// Text files get their content fetched; previewable images get a signed URL. Either
    /// fetch is attempted once. On failure the file stays selected without the extra data
    /// and the error is only logged.
    pub async fn select_file(&self, file: FileHandle) {
        let strategy = file.preview_strategy();
        let id = file.id.clone();
        let (selection, reconciled_writes) = {
            let mut state = self.inner.state();
            state.selection += 1;
            state.active = Some(file);
            state.preview_loading = strategy != PreviewStrategy::None;
            (state.selection, state.reconciled_writes)
        };

        match strategy {
            PreviewStrategy::InlineText => match self.inner.backend.fetch_content(&id).await {
                Ok(content) => {
                    self.inner
                        .merge_fetched_content(selection, reconciled_writes, content)
                }
                Err(e) => tracing::warn!("failed to fetch content for {}: {}", id, e),
            },
            PreviewStrategy::SignedImage => {
                match self.inner.backend.resolve_signed_url(&id).await {
                    Ok(url) => self
                        .inner
                        .merge_into_selection(selection, |f| f.remote_path = Some(url)),
                    Err(e) => {
                        tracing::warn!("preview unavailable for {}: {}", id, e)
                    }
                }
            }
            PreviewStrategy::None => {}
        }

        let mut state = self.inner.state();
        if state.selection == selection {
            state.preview_loading = false;
        }
    }

    /// Clears the active file. Any edit session keeps running.
    pub fn close_preview(&self) {
        let mut state = self.inner.state();
        state.selection += 1;
        state.active = None;
        state.preview_loading = false;
    }

    /// Hands the active file to the external editor.
    ///
    /// A no-op unless the active file is a plain-text file. Also a no-op while a session for
    /// the same file is still in flight; a request for a different file supersedes the
    /// current session.
    pub async fn request_external_edit(&self) {
        let Some((number, target)) = self.inner.begin_session() else {
            return;
        };

        self.inner
            .notifier
            .notify(Notice::Loading(EDIT_LOADING_MESSAGE.into()));
        let opened = match self.inner.backend.start_edit(&target).await {
            Ok(url) => self.inner.surface.open(&url),
            Err(e) => Err(e),
        };
        self.inner.notifier.notify(Notice::Dismiss);

        match opened {
            Ok(handle) => {
                tracing::info!("editing {} externally in {}", target, handle);
                self.inner.update_session(number, |s| {
                    s.external_handle = Some(handle);
                    s.phase = EditPhase::Editing;
                });
                self.spawn_surface_watch(number, target, handle);
            }
            Err(e) => {
                tracing::error!("failed to start edit session for {}: {}", target, e);
                self.inner.update_session(number, |s| {
                    s.phase = EditPhase::Failed;
                    s.failure = Some(EditFailure::SessionStart);
                });
                self.inner
                    .notifier
                    .notify(Notice::Error(EDIT_START_FAILED_MESSAGE.into()));
            }
        }
    }

    fn spawn_surface_watch(&self, number: u64, target: ResourceId, handle: SurfaceHandle) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.watch_surface(number, target, handle).await });
    }

    /// Resets a terminal session to `idle`. Returns `false` if a session is still in flight.
    pub fn dismiss_session(&self) -> bool {
        let mut state = self.inner.state();
        match &state.session {
            Some(session) if session.phase.is_in_flight() => false,
            _ => {
                state.session = None;
                self.inner.phase_tx.send_replace(EditPhase::Idle);
                true
            }
        }
    }

    pub fn active_file(&self) -> Option<FileHandle> {
        self.inner.state().active.clone()
    }

    pub fn edit_session(&self) -> Option<EditSession> {
        self.inner.state().session.clone()
    }

    pub fn phase(&self) -> EditPhase {
        self.inner
            .state()
            .session
            .as_ref()
            .map_or(EditPhase::Idle, |s| s.phase)
    }

    pub fn preview_loading(&self) -> bool {
        self.inner.state().preview_loading
    }

    /// True from a successful edit request until the session is synced or failed.
    pub fn is_pending(&self) -> bool {
        self.phase().is_in_flight()
    }

    /// True while external edits are being pulled back.
    pub fn is_updating_content(&self) -> bool {
        self.phase() == EditPhase::Reconciling
    }

    /// The active file's content escaped for display, or an empty string.
    pub fn sanitized_content(&self) -> String {
        self.inner
            .state()
            .active
            .as_ref()
            .and_then(|f| f.content.as_deref())
            .map(sanitize_content)
            .unwrap_or_default()
    }

    /// Receives every phase change of the current session.
    pub fn subscribe(&self) -> watch::Receiver<EditPhase> {
        self.inner.phase_tx.subscribe()
    }

    /// Waits until no session is in flight and returns the phase reached.
    pub async fn wait_until_settled(&self) -> EditPhase {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|phase| !phase.is_in_flight()).await {
            Ok(phase) => *phase,
            Err(_) => self.phase(),
        };
        settled
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin_session(&self) -> Option<(u64, ResourceId)> {
        let mut state = self.state();
        let Some(file) = state.active.as_ref() else {
            tracing::debug!("edit requested with no active file");
            return None;
        };
        if !file.is_editable_text() {
            tracing::debug!(
                "edit requested for {} ({}), only plain-text files can be edited",
                file.id,
                file.media_type
            );
            return None;
        }
        let target = file.id.clone();

        if let Some(current) = &state.session {
            if current.phase.is_in_flight() && current.target == target {
                tracing::debug!(
                    "edit session {} for {} is already {}",
                    current.number,
                    target,
                    current.phase
                );
                return None;
            }
        }

        state.sessions_started += 1;
        let number = state.sessions_started;
        state.session = Some(EditSession {
            number,
            target: target.clone(),
            external_handle: None,
            phase: EditPhase::AwaitingExternalOpen,
            failure: None,
        });
        self.phase_tx.send_replace(EditPhase::AwaitingExternalOpen);
        Some((number, target))
    }

    /// Applies `f` if session `number` is still the current one.
    fn update_session(&self, number: u64, f: impl FnOnce(&mut EditSession)) -> bool {
        let mut state = self.state();
        match state.session.as_mut() {
            Some(session) if session.number == number => {
                f(session);
                self.phase_tx.send_replace(session.phase);
                true
            }
            _ => {
                tracing::debug!("session {} superseded, discarding its update", number);
                false
            }
        }
    }

    fn merge_into_selection(&self, selection: u64, f: impl FnOnce(&mut FileHandle)) {
        let mut state = self.state();
        if state.selection != selection {
            tracing::debug!("selection changed, discarding fetched preview data");
            return;
        }
        if let Some(file) = state.active.as_mut() {
            f(file);
        }
    }

    fn merge_fetched_content(&self, selection: u64, reconciled_writes: u64, content: String) {
        let mut state = self.state();
        if state.selection != selection {
            tracing::debug!("selection changed, discarding fetched content");
            return;
        }
        if state.reconciled_writes != reconciled_writes {
            tracing::debug!("synced content arrived first, discarding fetched content");
            return;
        }
        if let Some(file) = state.active.as_mut() {
            file.content = Some(content);
        }
    }

    fn merge_reconciled(&self, number: u64, target: &ResourceId, content: String) {
        let mut guard = self.state();
        let state = &mut *guard;
        let newer_session_owns_target = state
            .session
            .as_ref()
            .is_some_and(|s| s.number != number && &s.target == target);
        if newer_session_owns_target {
            tracing::debug!("newer session edits {}, discarding content", target);
            return;
        }
        match state.active.as_mut() {
            Some(file) if &file.id == target => {
                file.content = Some(content);
                state.reconciled_writes += 1;
            }
            _ => tracing::debug!("{} is no longer previewed, discarding content", target),
        }
    }

    async fn watch_surface(&self, number: u64, target: ResourceId, handle: SurfaceHandle) {
        let started = Instant::now();
        let mut ticker =
            tokio::time::interval_at(started + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !self.surface.is_open(&handle) {
                break;
            }
            if let Some(limit) = self.edit_timeout {
                if started.elapsed() >= limit {
                    tracing::warn!(
                        "edit session {} for {} timed out after {:?}",
                        number,
                        target,
                        limit
                    );
                    self.update_session(number, |s| {
                        s.phase = EditPhase::Failed;
                        s.failure = Some(EditFailure::TimedOut);
                        s.external_handle = None;
                    });
                    return;
                }
            }
        }

        self.reconcile(number, &target).await;
    }

    async fn reconcile(&self, number: u64, target: &ResourceId) {
        self.update_session(number, |s| s.phase = EditPhase::Reconciling);

        let result = match self.backend.persist_edit(target).await {
            Ok(()) => self.backend.fetch_content(target).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(content) => {
                self.merge_reconciled(number, target, content);
                let current = self.update_session(number, |s| {
                    s.phase = EditPhase::Synced;
                    s.external_handle = None;
                });
                tracing::info!("synced external edits for {}", target);
                if current {
                    self.notifier
                        .notify(Notice::Success(EDIT_SYNCED_MESSAGE.into()));
                }
            }
            Err(e) => {
                tracing::warn!("failed to sync external edits for {}: {}", target, e);
                self.update_session(number, |s| {
                    s.phase = EditPhase::Failed;
                    s.failure = Some(EditFailure::Reconciliation);
                    s.external_handle = None;
                });
            }
        }
    }
}
