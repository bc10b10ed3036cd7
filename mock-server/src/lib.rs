//! Minimal stand-in for the upload endpoints the client talks to.
//!
//! # Design
//! `POST /post` parses a multipart body, streams file parts while counting
//! their bytes, and echoes what it saw as JSON. `?pad=N` inflates the reply
//! so clients can exercise response truncation. `POST /status/{code}` drains
//! the body and answers with the requested status, and `POST /redirect`
//! answers 302 to `/landing`.
//!
//! `POST /api/dumps/` is the crash-dump store: a multipart `file` plus an
//! optional `label`, answered 201 with the stored record. When the app is
//! built with a token, the request must carry `Authorization: Bearer <token>`.
//!
//! Every request except `GET /stats` is counted; `/stats` reports the count.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, Request, State,
    },
    http::{header, HeaderMap, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use uuid::Uuid;

/// Number of leading file bytes echoed back.
pub const HEAD_LEN: usize = 16;

/// Where `POST /redirect` points.
pub const LANDING_PATH: &str = "/landing";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub head: Vec<u8>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Echo {
    pub form: BTreeMap<String, String>,
    pub files: BTreeMap<String, UploadedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EchoParams {
    #[serde(default)]
    pub pad: usize,
}

/// A stored crash dump as returned by `POST /api/dumps/`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dump {
    pub id: u64,
    pub original_name: String,
    pub stored_name: String,
    pub time: String,
    pub label: Option<String>,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub requests: u64,
}

#[derive(Clone, Debug, Default)]
pub struct AppState {
    requests: Arc<AtomicU64>,
    dumps: Arc<AtomicU64>,
    token: Option<Arc<str>>,
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

/// Like [`app`], but `/api/dumps/` requires `Authorization: Bearer <token>`.
pub fn app_with_token(token: impl Into<String>) -> Router {
    app_with_state(AppState {
        token: Some(Arc::from(token.into())),
        ..AppState::default()
    })
}

fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/post", post(echo))
        .route("/status/{code}", post(status))
        .route("/redirect", post(redirect))
        .route(LANDING_PATH, get(landing).post(landing))
        .route("/api/dumps/", post(create_dump))
        .route("/stats", get(stats))
        .layer(from_fn_with_state(state.clone(), count_requests))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, app()).await
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

async fn count_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.uri().path() != "/stats" {
        state.requests.fetch_add(1, Ordering::Relaxed);
    }
    next.run(request).await
}

async fn stats(State(state): State<AppState>) -> Json<Stats> {
    Json(Stats {
        requests: state.requests.load(Ordering::Relaxed),
    })
}

async fn echo(
    Query(params): Query<EchoParams>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Echo>, (StatusCode, String)> {
    let mut echo = Echo {
        authorization: header_text(&headers, header::AUTHORIZATION),
        accept_encoding: header_text(&headers, header::ACCEPT_ENCODING),
        ..Echo::default()
    };
    while let Some(mut field) = multipart.next_field().await.map_err(reject)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_owned) {
            Some(filename) => {
                let mut upload = UploadedFile {
                    filename,
                    content_type: field.content_type().map(str::to_owned),
                    ..UploadedFile::default()
                };
                while let Some(chunk) = field.chunk().await.map_err(reject)? {
                    let room = HEAD_LEN.saturating_sub(upload.head.len()).min(chunk.len());
                    upload.head.extend_from_slice(&chunk[..room]);
                    upload.size += chunk.len() as u64;
                }
                echo.files.insert(name, upload);
            }
            None => {
                let value = field.text().await.map_err(reject)?;
                echo.form.insert(name, value);
            }
        }
    }
    if params.pad > 0 {
        echo.padding = Some("x".repeat(params.pad));
    }
    Ok(Json(echo))
}

async fn status(Path(code): Path<u16>, body: Body) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    drain(body).await?;
    Ok((status, format!("status {code}")))
}

async fn redirect(body: Body) -> Result<impl IntoResponse, StatusCode> {
    drain(body).await?;
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, LANDING_PATH)],
        "redirecting",
    ))
}

async fn landing() -> &'static str {
    "landed"
}

async fn create_dump(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, (StatusCode, String)> {
    // The whole body is read before answering so a rejected client still
    // gets a response instead of a reset connection.
    let mut file: Option<(String, u64)> = None;
    let mut label = None;
    while let Some(mut field) = multipart.next_field().await.map_err(reject)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_owned) {
            Some(filename) => {
                let mut size = 0u64;
                while let Some(chunk) = field.chunk().await.map_err(reject)? {
                    size += chunk.len() as u64;
                }
                if name == "file" {
                    file = Some((filename, size));
                }
            }
            None => {
                let value = field.text().await.map_err(reject)?;
                if name == "label" {
                    label = Some(value);
                }
            }
        }
    }

    if let Some(token) = state.token.as_deref() {
        let expected = format!("Bearer {token}");
        if header_text(&headers, header::AUTHORIZATION).as_deref() != Some(expected.as_str()) {
            let detail = json!({ "detail": "Authentication credentials were not provided." });
            return Ok((StatusCode::UNAUTHORIZED, Json(detail)).into_response());
        }
    }

    let Some((original_name, size)) = file else {
        let error = json!({ "error": "No file provided" });
        return Ok((StatusCode::BAD_REQUEST, Json(error)).into_response());
    };
    let dump = Dump {
        id: state.dumps.fetch_add(1, Ordering::Relaxed) + 1,
        original_name,
        stored_name: Uuid::new_v4().simple().to_string(),
        time: chrono::Utc::now().to_rfc3339(),
        label,
        size,
    };
    Ok((StatusCode::CREATED, Json(dump)).into_response())
}

async fn drain(body: Body) -> Result<(), StatusCode> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .map(|_| ())
        .map_err(|_| StatusCode::BAD_REQUEST)
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn reject(e: MultipartError) -> (StatusCode, String) {
    (e.status(), e.body_text())
}
