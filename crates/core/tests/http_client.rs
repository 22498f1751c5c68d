//! HTTP client tests against an in-process fake backend.

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use drive_core::{
    ClientConfig, DriveError, EditBackend, EditPhase, EditSyncCoordinator, ExternalSurface,
    FileKind, HttpDriveClient, MediaType, NonEmptyText, ResourceId, SessionContext,
    SurfaceHandle, TracingNotifier, UploadRequest, Visibility,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

const GOOD_COOKIE: &str = "connect.sid=good";

#[derive(Debug, Clone, PartialEq)]
struct UploadedPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    body: String,
}

#[derive(Default)]
struct Backend {
    contents: Mutex<HashMap<String, String>>,
    external_edits: Mutex<HashMap<String, String>>,
    hits: Mutex<Vec<String>>,
    cookies: Mutex<Vec<Option<String>>>,
    uploads: Mutex<Vec<UploadedPart>>,
    reject_uploads: AtomicBool,
}

impl Backend {
    fn hit(&self, route: String, headers: &HeaderMap) {
        self.hits.lock().unwrap().push(route);
        let cookie = headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.cookies.lock().unwrap().push(cookie);
    }

    fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

type Shared = State<Arc<Backend>>;

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

fn authorised(headers: &HeaderMap) -> bool {
    headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == GOOD_COOKIE)
}

async fn session(State(b): Shared, headers: HeaderMap) -> Response {
    b.hit("GET session".into(), &headers);
    if !authorised(&headers) {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    Json(json!({
        "user": {
            "displayName": "Ada",
            "email": "ada@example.com",
            "totalStorageUsed": 512,
            "storageLimit": 1024
        }
    }))
    .into_response()
}

async fn logout(State(b): Shared, headers: HeaderMap) -> Response {
    b.hit("POST logout".into(), &headers);
    Json(json!({ "success": true, "message": "Logged out successfully" })).into_response()
}

async fn list_files(State(b): Shared, headers: HeaderMap) -> Response {
    b.hit("GET getfiles".into(), &headers);
    Json(json!([
        {
            "_id": "a1",
            "name": "notes.txt",
            "type": "file",
            "fileType": "text/plain",
            "size": 5,
            "parent": "",
            "isPublic": false,
            "createdAt": "2024-01-01T00:00:00.000Z"
        },
        {
            "_id": "f1",
            "name": "Photos",
            "type": "folder",
            "fileType": null,
            "parent": null,
            "isPublic": true
        }
    ]))
    .into_response()
}

async fn get_content(State(b): Shared, Path(id): Path<String>, headers: HeaderMap) -> Response {
    b.hit(format!("GET content {id}"), &headers);
    if id == "secret" {
        return message(StatusCode::FORBIDDEN, "This file is private");
    }
    let content = b.contents.lock().unwrap().get(&id).cloned();
    match content {
        Some(text) => Json(text).into_response(),
        None => message(StatusCode::NOT_FOUND, "File not found"),
    }
}

async fn put_content(State(b): Shared, Path(id): Path<String>, headers: HeaderMap) -> Response {
    b.hit(format!("PUT content {id}"), &headers);
    let edited = b.external_edits.lock().unwrap().remove(&id);
    if let Some(text) = edited {
        b.contents.lock().unwrap().insert(id, text);
    }
    Json(json!({ "success": true })).into_response()
}

async fn start_edit(State(b): Shared, Path(id): Path<String>, headers: HeaderMap) -> Response {
    b.hit(format!("POST edit {id}"), &headers);
    Json(json!({ "editUrl": format!("https://docs.example/{id}/edit") })).into_response()
}

async fn signed_preview(State(b): Shared, Path(id): Path<String>, headers: HeaderMap) -> Response {
    b.hit(format!("GET download {id}"), &headers);
    Json(json!({ "url": format!("https://storage.example/{id}?sig=1") })).into_response()
}

async fn signed_download(
    State(b): Shared,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    b.hit(format!("GET downloadfile {id}"), &headers);
    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({ "url": format!("http://{host}/raw/{id}") })).into_response()
}

async fn raw_bytes(State(b): Shared, Path(id): Path<String>, headers: HeaderMap) -> Response {
    b.hit(format!("GET raw {id}"), &headers);
    b"raw file bytes".to_vec().into_response()
}

async fn trash(State(b): Shared, Path(id): Path<String>, headers: HeaderMap) -> Response {
    b.hit(format!("POST trash {id}"), &headers);
    Json(json!({ "message": "File moved to trash" })).into_response()
}

async fn restore(State(b): Shared, Path(id): Path<String>, headers: HeaderMap) -> Response {
    b.hit(format!("POST restore {id}"), &headers);
    Json(json!({ "message": "File restored" })).into_response()
}

async fn delete_permanent(
    State(b): Shared,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    b.hit(format!("DELETE permanent {id}"), &headers);
    StatusCode::NO_CONTENT.into_response()
}

async fn create_folder(
    State(b): Shared,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    b.hit("POST folders".into(), &headers);
    let name = body["name"].as_str().unwrap_or_default();
    (
        StatusCode::CREATED,
        Json(json!({ "_id": "new1", "name": name, "type": "folder", "isPublic": false })),
    )
        .into_response()
}

async fn upload(State(b): Shared, headers: HeaderMap, mut multipart: Multipart) -> Response {
    b.hit("POST upload".into(), &headers);
    if b.reject_uploads.load(Ordering::SeqCst) {
        return message(StatusCode::PAYLOAD_TOO_LARGE, "File too large");
    }
    while let Some(field) = multipart.next_field().await.unwrap() {
        let part = UploadedPart {
            name: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            body: String::new(),
        };
        let body = field.text().await.unwrap();
        b.uploads.lock().unwrap().push(UploadedPart { body, ..part });
    }
    (StatusCode::CREATED, Json(json!({ "message": "Files uploaded" }))).into_response()
}

async fn spawn_backend(backend: Arc<Backend>) -> Url {
    let app = Router::new()
        .route("/api/session", get(session))
        .route("/logout", post(logout))
        .route("/v1/files/getfiles", get(list_files))
        .route(
            "/v1/files/files/:id/content",
            get(get_content).put(put_content),
        )
        .route("/v1/files/files/:id/edit", post(start_edit))
        .route("/v1/files/files/:id/trash", post(trash))
        .route("/v1/files/files/:id/restore", post(restore))
        .route("/v1/files/files/:id/permanent", delete(delete_permanent))
        .route("/v1/files/download/:id", get(signed_preview))
        .route("/v1/files/downloadfile/:id", get(signed_download))
        .route("/v1/files/folders", post(create_folder))
        .route("/v1/files/upload", post(upload))
        .route("/raw/:id", get(raw_bytes))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

async fn setup(contents: &[(&str, &str)]) -> (Arc<Backend>, ClientConfig) {
    let backend = Arc::new(Backend::default());
    {
        let mut map = backend.contents.lock().unwrap();
        for (id, text) in contents {
            map.insert(id.to_string(), text.to_string());
        }
    }
    let base = spawn_backend(backend.clone()).await;
    let cfg = ClientConfig::with_base_url(base)
        .unwrap()
        .with_poll_interval(Duration::from_millis(20))
        .unwrap();
    (backend, cfg)
}

fn client(cfg: &ClientConfig) -> HttpDriveClient {
    HttpDriveClient::new(cfg, SessionContext::with_cookie(GOOD_COOKIE).unwrap()).unwrap()
}

fn id(raw: &str) -> ResourceId {
    ResourceId::parse(raw).unwrap()
}

#[tokio::test]
async fn test_check_session_returns_user() {
    let (backend, cfg) = setup(&[]).await;

    let client = client(&cfg).authenticate().await.unwrap();

    let user = client.session().user().unwrap();
    assert_eq!(user.display_name, "Ada");
    assert_eq!(user.storage_percent_used(), 50.0);
    assert_eq!(
        backend.cookies.lock().unwrap().clone(),
        vec![Some(GOOD_COOKIE.to_string())]
    );
}

#[tokio::test]
async fn test_check_session_rejects_bad_cookie() {
    let (_backend, cfg) = setup(&[]).await;
    let client =
        HttpDriveClient::new(&cfg, SessionContext::with_cookie("connect.sid=bad").unwrap())
            .unwrap();

    let err = client.check_session().await.unwrap_err();
    assert!(matches!(err, DriveError::Unauthenticated));
}

#[tokio::test]
async fn test_anonymous_session_sends_no_cookie() {
    let (backend, cfg) = setup(&[]).await;
    let client = HttpDriveClient::new(&cfg, SessionContext::anonymous()).unwrap();

    assert!(matches!(
        client.check_session().await,
        Err(DriveError::Unauthenticated)
    ));
    assert_eq!(backend.cookies.lock().unwrap().clone(), vec![None]);
}

#[tokio::test]
async fn test_logout() {
    let (backend, cfg) = setup(&[]).await;
    client(&cfg).logout().await.unwrap();
    assert_eq!(backend.hits(), vec!["POST logout"]);
}

#[tokio::test]
async fn test_list_files_decodes_documents() {
    let (_backend, cfg) = setup(&[]).await;

    let files = client(&cfg).list_files().await.unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].id.as_str(), "a1");
    assert_eq!(files[0].media_type, MediaType::TextPlain);
    assert!(files[0].is_editable_text());
    assert_eq!(files[0].parent, None);
    assert!(files[0].created_at.is_some());
    assert_eq!(files[1].kind, FileKind::Folder);
    assert_eq!(files[1].visibility, Visibility::Public);
    assert!(files.iter().all(|f| f.content.is_none()));
}

#[tokio::test]
async fn test_edit_backend_calls() {
    let (backend, cfg) = setup(&[("a1", "hello")]).await;
    let client = client(&cfg);

    assert_eq!(client.fetch_content(&id("a1")).await.unwrap(), "hello");
    assert_eq!(
        client.resolve_signed_url(&id("img1")).await.unwrap().as_str(),
        "https://storage.example/img1?sig=1"
    );
    assert_eq!(
        client.start_edit(&id("a1")).await.unwrap().as_str(),
        "https://docs.example/a1/edit"
    );
    client.persist_edit(&id("a1")).await.unwrap();

    assert_eq!(
        backend.hits(),
        vec![
            "GET content a1",
            "GET download img1",
            "POST edit a1",
            "PUT content a1"
        ]
    );
    assert!(backend
        .cookies
        .lock()
        .unwrap()
        .iter()
        .all(|c| c.as_deref() == Some(GOOD_COOKIE)));
}

#[tokio::test]
async fn test_error_statuses_are_mapped() {
    let (_backend, cfg) = setup(&[]).await;
    let client = client(&cfg);

    match client.fetch_content(&id("secret")).await {
        Err(DriveError::Forbidden(m)) => assert_eq!(m, "This file is private"),
        other => panic!("expected forbidden, got {other:?}"),
    }
    match client.fetch_content(&id("missing")).await {
        Err(DriveError::NotFound(m)) => assert_eq!(m, "File not found"),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[tokio::test]
async fn test_trash_lifecycle_routes() {
    let (backend, cfg) = setup(&[]).await;
    let client = client(&cfg);

    client.move_to_trash(&id("a1")).await.unwrap();
    client.restore(&id("a1")).await.unwrap();
    client.delete_permanently(&id("a1")).await.unwrap();

    assert_eq!(
        backend.hits(),
        vec!["POST trash a1", "POST restore a1", "DELETE permanent a1"]
    );
}

#[tokio::test]
async fn test_create_folder() {
    let (_backend, cfg) = setup(&[]).await;

    let folder = client(&cfg)
        .create_folder(&NonEmptyText::new("Reports").unwrap())
        .await
        .unwrap();

    assert_eq!(folder.id.as_str(), "new1");
    assert_eq!(folder.name, "Reports");
    assert_eq!(folder.kind, FileKind::Folder);
}

#[tokio::test]
async fn test_download_does_not_leak_cookie_to_signed_url() {
    let (backend, cfg) = setup(&[]).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.bin");

    let written = client(&cfg).download_to(&id("a1"), &dest).await.unwrap();

    assert_eq!(written, 14);
    assert_eq!(std::fs::read(&dest).unwrap(), b"raw file bytes");
    assert_eq!(backend.hits(), vec!["GET downloadfile a1", "GET raw a1"]);
    assert_eq!(
        backend.cookies.lock().unwrap().clone(),
        vec![Some(GOOD_COOKIE.to_string()), None]
    );
}

#[tokio::test]
async fn test_upload_sends_multipart_fields() {
    let (backend, cfg) = setup(&[]).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "hello").unwrap();

    client(&cfg)
        .upload(&UploadRequest {
            paths: vec![path],
            visibility: Visibility::Public,
            parent: Some(id("f1")),
        })
        .await
        .unwrap();

    let parts = backend.uploads.lock().unwrap().clone();
    let file = parts.iter().find(|p| p.name == "files").unwrap();
    assert_eq!(file.file_name.as_deref(), Some("notes.txt"));
    assert_eq!(file.content_type.as_deref(), Some("text/plain"));
    assert_eq!(file.body, "hello");
    let field = |name: &str| {
        parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.body.clone())
    };
    assert_eq!(field("isPublic").as_deref(), Some("true"));
    assert_eq!(field("parent").as_deref(), Some("f1"));
}

#[tokio::test]
async fn test_upload_rejected_by_backend() {
    let (backend, cfg) = setup(&[]).await;
    backend.reject_uploads.store(true, Ordering::SeqCst);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "hello").unwrap();

    let err = client(&cfg)
        .upload(&UploadRequest {
            paths: vec![path],
            visibility: Visibility::Private,
            parent: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DriveError::PayloadTooLarge(m) if m == "File too large"));
}

#[tokio::test]
async fn test_upload_without_paths_sends_nothing() {
    let (backend, cfg) = setup(&[]).await;

    let err = client(&cfg)
        .upload(&UploadRequest {
            paths: vec![],
            visibility: Visibility::Private,
            parent: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DriveError::InvalidInput(_)));
    assert!(backend.hits().is_empty());
}

/// Surface that stays open until the test closes it.
#[derive(Default)]
struct ManualSurface {
    next: AtomicU64,
    open: Mutex<HashSet<SurfaceHandle>>,
}

impl ManualSurface {
    fn close_all(&self) {
        self.open.lock().unwrap().clear();
    }
}

impl ExternalSurface for ManualSurface {
    fn open(&self, _url: &Url) -> drive_core::DriveResult<SurfaceHandle> {
        let handle = SurfaceHandle::new(self.next.fetch_add(1, Ordering::SeqCst));
        self.open.lock().unwrap().insert(handle);
        Ok(handle)
    }

    fn is_open(&self, handle: &SurfaceHandle) -> bool {
        self.open.lock().unwrap().contains(handle)
    }
}

#[tokio::test]
async fn test_coordinator_syncs_external_edit_over_http() {
    let (backend, cfg) = setup(&[("a1", "hello")]).await;
    let session = client(&cfg).authenticate().await.unwrap().session().clone();
    let surface = Arc::new(ManualSurface::default());
    let coordinator = EditSyncCoordinator::for_session(
        &cfg,
        session,
        surface.clone(),
        Arc::new(TracingNotifier),
    )
    .unwrap();

    let files = client(&cfg).list_files().await.unwrap();
    coordinator.select_file(files[0].clone()).await;
    assert_eq!(coordinator.sanitized_content(), "hello");

    coordinator.request_external_edit().await;
    assert_eq!(coordinator.phase(), EditPhase::Editing);

    backend
        .external_edits
        .lock()
        .unwrap()
        .insert("a1".into(), "hello <world>".into());
    surface.close_all();

    let settled = tokio::time::timeout(Duration::from_secs(5), coordinator.wait_until_settled())
        .await
        .unwrap();
    assert_eq!(settled, EditPhase::Synced);
    assert_eq!(coordinator.sanitized_content(), "hello &lt;world&gt;");
}

#[tokio::test]
async fn test_coordinator_requires_authenticated_session() {
    let (_backend, cfg) = setup(&[]).await;
    let err = EditSyncCoordinator::for_session(
        &cfg,
        SessionContext::with_cookie(GOOD_COOKIE).unwrap(),
        Arc::new(ManualSurface::default()),
        Arc::new(TracingNotifier),
    )
    .unwrap_err();
    assert!(matches!(err, DriveError::Unauthenticated));
}
