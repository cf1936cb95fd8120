pub mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Path as UrlPath, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Json, Response},
    routing::{MethodRouter, any, delete, get, post},
};
use http::header;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::models::Work;
use crate::services::export;
use crate::utils::safe_folder_name;

pub use store::{InvalidWorkId, NovelStore};

const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    store: Arc<NovelStore>,
    public_url: String,
}

impl AppState {
    pub fn new(store: NovelStore, public_url: &str) -> Self {
        AppState {
            store: Arc::new(store),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Maps a handler failure to a JSON error: 400 for a malformed work id,
/// 500 for everything else.
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is::<InvalidWorkId>() {
            StatusCode::BAD_REQUEST
        } else {
            error!("request failed: {:#}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

pub fn router(state: AppState, dist_dir: &Path) -> Router {
    let images = ServeDir::new(state.store.images_dir());

    let api = Router::new()
        .route("/api/works", get(list_works).post(save_work))
        .route("/api/works/:id", delete(delete_work))
        .route("/api/works/:id/epub", get(export_epub))
        .route("/api/save-image", post(save_image))
        .route("/health", get(health_check))
        .nest_service("/images", images)
        .with_state(state);

    let index = dist_dir.join("index.html");
    let app = if index.is_file() {
        let spa: MethodRouter = any(spa_fallback).with_state(Arc::new(index));
        api.fallback_service(ServeDir::new(dist_dir).fallback(spa))
    } else {
        api.route("/", get(status_page))
            .fallback(|| async { not_found("Not Found") })
    };

    app.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        )
}

/// Client-side routes get `index.html`. Missing assets and unknown API paths
/// stay 404.
async fn spa_fallback(State(index): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let path = uri.path();
    let is_api = path == "/api" || path.starts_with("/api/");
    let is_asset = path.rsplit('/').next().is_some_and(|segment| segment.contains('.'));
    if is_api || is_asset {
        return not_found("Not Found");
    }
    match tokio::fs::read_to_string(index.as_path()).await {
        Ok(html) => Html(html).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn list_works(State(state): State<AppState>) -> Result<Json<Vec<Work>>, ApiError> {
    Ok(Json(state.store.list_works().await?))
}

async fn save_work(
    State(state): State<AppState>,
    Json(work): Json<Work>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = state.store.save_work(&work).await?;
    Ok(Json(json!({
        "success": true,
        "path": path.display().to_string(),
    })))
}

async fn delete_work(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Response, ApiError> {
    if state.store.delete_work(&id).await? {
        Ok(Json(json!({ "success": true })).into_response())
    } else {
        Ok(not_found("Work not found"))
    }
}

async fn export_epub(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Response, ApiError> {
    let Some(work) = state.store.find_work(&id).await? else {
        return Ok(not_found("Work not found"));
    };
    let bytes = export::to_epub(&work)?;
    let disposition = format!("attachment; filename=\"{}.epub\"", safe_folder_name(&work.title));
    Ok((
        [
            (header::CONTENT_TYPE, "application/epub+zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct SaveImageRequest {
    image: Option<String>,
}

async fn save_image(
    State(state): State<AppState>,
    Json(request): Json<SaveImageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let image = request
        .image
        .filter(|i| !i.is_empty())
        .ok_or_else(|| anyhow::anyhow!("No image data provided"))?;
    let stored = state.store.save_image(&image).await?;
    Ok(Json(json!({
        "url": format!("{}/images/{}", state.public_url, stored.filename),
        "filename": stored.filename,
    })))
}

async fn status_page() -> Html<String> {
    let html_content = r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>Novelist Server</title>
        <meta charset="utf-8">
        <style>
            body { font-family: Arial, sans-serif; margin: 40px; }
            .info-box { background-color: #f0f8ff; padding: 20px; border-radius: 8px; margin: 20px 0; }
            .endpoint { background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }
        </style>
    </head>
    <body>
        <h1>Server is Running</h1>

        <div class="info-box">
            <p>No frontend build was found in the dist directory.</p>
            <p>Build the frontend, or run its dev server separately.</p>
        </div>

        <h2>Available Endpoints:</h2>
        <div class="endpoint">GET /api/works - List all works</div>
        <div class="endpoint">POST /api/works - Save or update a work</div>
        <div class="endpoint">DELETE /api/works/:id - Delete a work</div>
        <div class="endpoint">GET /api/works/:id/epub - Download a work as EPUB</div>
        <div class="endpoint">POST /api/save-image - Store an image</div>
        <div class="endpoint">GET /health - Health check</div>
    </body>
    </html>
    "#
    .to_string();

    Html(html_content)
}
