//! HTTP adapter.
//!
//! A thin axum layer over [`GalleryIndex`] and [`ThumbnailCache`]. Every
//! core call blocks (filesystem walks, image decoding, condvar waits), so
//! handlers hop onto tokio's blocking pool before touching either.
//!
//! ## Routes
//!
//! | Route | Response |
//! |---|---|
//! | `GET /` | the web UI when `frontend_dist` is set, else a JSON pointer to the API |
//! | `GET /api/health` | `{"status":"ok"}` |
//! | `GET /api/images?refresh=` | every image, newest first |
//! | `GET /api/folders?page=&page_size=&refresh=` | one page of folder covers |
//! | `GET /api/folders/*rel_dir?refresh=` | all images of one folder |
//! | `GET /api/root?refresh=` | all images directly under the root |
//! | `GET /api/index/status` | index health |
//! | `POST /api/index/refresh` | synchronous rebuild, then status |
//! | `GET /api/media/*rel_path` | original bytes |
//! | `GET /api/thumb/*rel_path?size=` | cached JPEG thumbnail |
//!
//! ## Errors
//!
//! Failures become `{"detail": "..."}` with 400 for bad input (traversal,
//! bad pagination, query strings that do not parse), 404 for missing files
//! or folders, and 500 for failed index builds. A thumbnail that cannot be
//! generated is not an error: the original image is served instead.
//!
//! ## Frontend and CORS
//!
//! With a frontend directory configured, every path no API route claims is
//! served from it, and unknown paths get its `index.html` so client-side
//! routes survive a reload. CORS is permissive: LAN clients on other
//! origins may call the API.

use crate::config::GalleryConfig;
use crate::index::{GalleryIndex, IndexError};
use crate::paths::{PathError, ROOT_DIR, resolve_media_path, to_posix};
use crate::scan::ImageRecord;
use crate::thumbs::{ThumbnailCache, ThumbnailError};
use axum::async_trait;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

/// Default page size for `/api/folders`.
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("Cannot resolve bind address {0}")]
    Address(String),
    #[error("Server error: {0}")]
    Serve(String),
}

/// Shared by every handler.
pub struct AppState {
    index: GalleryIndex,
    /// `None` when thumbnails are disabled.
    thumbs: Option<ThumbnailCache>,
    root: PathBuf,
    extensions: BTreeSet<String>,
    /// Built web UI served for every non-API path.
    frontend_dist: Option<PathBuf>,
}

impl AppState {
    pub fn new(index: GalleryIndex, thumbs: Option<ThumbnailCache>) -> Self {
        let settings = index.settings();
        Self {
            root: settings.root.clone(),
            extensions: settings.extensions.clone(),
            frontend_dist: None,
            index,
            thumbs,
        }
    }

    /// Serve the web UI from `dist`.
    pub fn with_frontend(mut self, dist: Option<PathBuf>) -> Self {
        self.frontend_dist = dist;
        self
    }

    pub fn from_config(config: &GalleryConfig) -> Result<Self, ServerError> {
        let index = GalleryIndex::from_config(config)?;
        let thumbs = config
            .thumbnails
            .enabled
            .then(|| ThumbnailCache::from_config(config));
        Ok(Self::new(index, thumbs).with_frontend(config.frontend_dir()))
    }

    pub fn index(&self) -> &GalleryIndex {
        &self.index
    }
}

/// Error response body: `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<PathError> for ApiError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::InvalidPath(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            PathError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
        }
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            tracing::error!(error = %err, "index request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

/// [`Query`] whose rejection is an [`ApiError`], so a malformed query string
/// still gets a `{"detail"}` body.
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// [`Path`] whose rejection is an [`ApiError`].
#[derive(Debug)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Query flag: `true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`, any case.
/// An empty value (`?refresh=`) is false.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean flag, got {other:?}"
        ))),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default, deserialize_with = "flag")]
    pub refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct FoldersQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    #[serde(default, deserialize_with = "flag")]
    pub refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ThumbQuery {
    pub size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ImageList {
    pub items: Vec<ImageRecord>,
    pub total: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/health", get(health))
        .route("/api/images", get(images))
        .route("/api/folders", get(folders))
        .route("/api/folders/*rel_dir", get(folder_images))
        .route("/api/root", get(root_images))
        .route("/api/index/status", get(index_status))
        .route("/api/index/refresh", post(index_refresh))
        .route("/api/media/*rel_path", get(media))
        .route("/api/thumb/*rel_path", get(thumb));

    let app = match &state.frontend_dist {
        Some(dist) => api.fallback_service(frontend(dist)),
        None => api.route("/", get(root_info)),
    };
    app.layer(CorsLayer::permissive()).with_state(state)
}

/// Files under `dist`; anything missing gets `index.html`.
fn frontend(dist: &std::path::Path) -> ServeDir<ServeFile> {
    ServeDir::new(dist).fallback(ServeFile::new(dist.join("index.html")))
}

/// Run `f` on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("background task failed: {e}")))?
}

async fn root_info() -> Json<serde_json::Value> {
    Json(json!({
        "message": "LanGallery API. No frontend configured; set server.frontend_dist to serve one.",
        "api": "/api/folders",
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn images(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RefreshQuery>,
) -> Result<Json<ImageList>, ApiError> {
    let items = blocking(move || Ok(state.index.list_images(query.refresh)?)).await?;
    Ok(Json(ImageList {
        total: items.len(),
        items,
    }))
}

async fn folders(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<FoldersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let listing = blocking(move || {
        Ok(state
            .index
            .list_folder_covers(page, page_size, query.refresh)?)
    })
    .await?;
    Ok(Json(listing))
}

async fn folder_images(
    State(state): State<Arc<AppState>>,
    ApiPath(rel_dir): ApiPath<String>,
    ApiQuery(query): ApiQuery<RefreshQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let listing =
        blocking(move || Ok(state.index.list_folder_images(&rel_dir, query.refresh)?)).await?;
    Ok(Json(listing))
}

async fn root_images(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RefreshQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let listing =
        blocking(move || Ok(state.index.list_folder_images(ROOT_DIR, query.refresh)?)).await?;
    Ok(Json(listing))
}

async fn index_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.index.status())
}

async fn index_refresh(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let status = blocking(move || {
        state.index.refresh_sync()?;
        Ok(state.index.status())
    })
    .await?;
    Ok(Json(status))
}

async fn media(
    State(state): State<Arc<AppState>>,
    ApiPath(rel_path): ApiPath<String>,
) -> Result<Response, ApiError> {
    blocking(move || {
        let path = resolve_media_path(&state.root, &rel_path, &state.extensions)?;
        file_response(&path)
    })
    .await
}

async fn thumb(
    State(state): State<Arc<AppState>>,
    ApiPath(rel_path): ApiPath<String>,
    ApiQuery(query): ApiQuery<ThumbQuery>,
) -> Result<Response, ApiError> {
    blocking(move || {
        let source = resolve_media_path(&state.root, &rel_path, &state.extensions)?;
        let Some(thumbs) = &state.thumbs else {
            return file_response(&source);
        };

        // Fingerprint on the normalized path, not the raw request.
        let rel_path = source
            .strip_prefix(&state.root)
            .map(to_posix)
            .unwrap_or(rel_path);
        match thumbs.ensure_thumbnail(&source, &rel_path, query.size) {
            Ok(path) => file_response(&path),
            Err(ThumbnailError::InvalidSize(size)) => Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("size must be >= 1, got {size}"),
            )),
            Err(e) => {
                tracing::warn!(
                    rel_path = %rel_path,
                    error = %e,
                    "thumbnail failed, serving original"
                );
                file_response(&source)
            }
        }
    })
    .await
}

/// Read a whole file into a response with a content type by extension.
fn file_response(path: &std::path::Path) -> Result<Response, ApiError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ApiError::new(StatusCode::NOT_FOUND, "Image not found."),
        _ => ApiError::internal(format!("failed to read {}: {e}", path.display())),
    })?;
    Ok(([(header::CONTENT_TYPE, content_type_for(path))], bytes).into_response())
}

pub fn content_type_for(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Resolve `host:port`, accepting names as well as literal addresses.
pub fn bind_address(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ServerError::Address(format!("{host}:{port}")))
}

/// Build the runtime and serve until Ctrl-C.
pub fn run(config: &GalleryConfig) -> Result<(), ServerError> {
    let state = Arc::new(AppState::from_config(config)?);
    let addr = bind_address(&config.server.host, config.server.port)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(state, addr))
}

async fn serve(state: Arc<AppState>, addr: SocketAddr) -> Result<(), ServerError> {
    state.index.warmup_async();
    tracing::info!(
        %addr,
        root = %state.root.display(),
        thumbnails = state.thumbs.is_some(),
        frontend = state.frontend_dist.is_some(),
        "langallery listening"
    );

    axum::Server::bind(&addr)
        .serve(router(Arc::clone(&state)).into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

    if let Some(thumbs) = &state.thumbs {
        tracing::info!(stats = %thumbs.stats(), "thumbnail cache");
    }
    tracing::info!("langallery stopped");
    Ok(())
}
