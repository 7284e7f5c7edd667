use crate::{AppState, Route};
use apkdrop_storage::{is_hidden, validate_name};
use axum::Json;
use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use time::UtcDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tokio_util::io::ReaderStream;

/// IMF-fixdate, the only format HTTP/1.1 senders may generate.
const HTTP_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT");

#[derive(Debug, Serialize)]
struct ListingFailure {
    error: &'static str,
    details: String,
}

pub(crate) async fn inventory(State(state): State<Arc<AppState>>) -> Response {
    match state.inventory.scan().await {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => {
            tracing::error!(error = ?err, "Failed to list packages");
            let body = ListingFailure {
                error: "Failed to list packages",
                details: err.detail().to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        },
    }
}

pub(crate) async fn download(State(state): State<Arc<AppState>>, UrlPath(filename): UrlPath<String>) -> Response {
    // Only names that are already a single clean component; anything that
    // needs normalising was not produced by the listing. Dotfiles stay private.
    let name = match validate_name(&filename) {
        Ok(name) if name.as_os_str() == filename.as_str() && !is_hidden(&name) => name,
        _ => {
            tracing::debug!(%filename, "Rejected download path");
            return StatusCode::NOT_FOUND.into_response();
        },
    };
    let (info, reader) = match state.inventory.backend().open(&name).await {
        Ok(opened) => opened,
        Err(err) if err.is_not_found() => {
            tracing::debug!(%filename, "Requested package does not exist");
            return StatusCode::NOT_FOUND.into_response();
        },
        Err(err) => {
            tracing::error!(%filename, error = ?err, "Failed to open package");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        },
    };

    let mut headers = file_headers(&name, info.modified);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(info.size));
    (headers, Body::from_stream(ReaderStream::new(reader))).into_response()
}

/// Fallback for every path the router doesn't claim.
pub(crate) async fn fallback(State(state): State<Arc<AppState>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET, HEAD")]).into_response();
    }
    match state.routes.resolve(uri.path()) {
        Route::Shell => shell(&state, method, uri.path()).await,
        // Under the mount, but not a single file name.
        Route::Download | Route::Inventory => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn shell(state: &AppState, method: Method, path: &str) -> Response {
    let file = match state.shell.load(path).await {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(error = ?err, "Application shell is missing its entry document");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        },
    };
    let modified = state.shell.backend().stat(&file.path).await.map(|info| info.modified).ok();
    let mut headers = match modified {
        Some(modified) => file_headers(&file.path, modified),
        None => content_type(&file.path),
    };
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.data.len()));
    let body = match method {
        Method::HEAD => Body::empty(),
        _ => Body::from(file.data),
    };
    (headers, body).into_response()
}

fn content_type(path: &Path) -> HeaderMap {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers
}

fn file_headers(path: &Path, modified: UtcDateTime) -> HeaderMap {
    let mut headers = content_type(path);
    if let Some(value) = modified.format(HTTP_DATE).ok().and_then(|date| HeaderValue::from_str(&date).ok()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    headers
}
