//! HTTP surface: landing pages, downloads, favicon
//!
//! A download request runs the whole lookup-decide-activate-persist
//! sequence under the store lock and only streams the file once the lock
//! is released. Range requests are honored so an interrupted download can
//! resume within the validity window.

use std::io::SeekFrom;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{Duration, Utc};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

use tokens::{lifecycle, Access, Denial, TokenStore};

use crate::pages;
use crate::state::ServerState;

/// Favicon compiled into the binary, served without touching the disk
const FAVICON: &[u8] = include_bytes!("../assets/favicon.ico");

/// Body served with every refusal, whatever the reason
const NOT_FOUND_BODY: &str = "404 page not found\n";

/// HTTP server for one-time downloads
pub struct ShareServer {
    state: ServerState,
}

impl ShareServer {
    /// Create a server over `store`, enforcing the given validity window
    pub fn new(store: TokenStore, validity: Duration) -> Self {
        Self {
            state: ServerState::new(store, validity),
        }
    }

    /// The router with all routes configured
    pub fn router(&self) -> Router {
        Router::new()
            .route("/favicon.ico", get(favicon))
            .route("/d/:token", get(download))
            .route("/:token", get(landing))
            .fallback(fallback)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind `addr` and serve until the process is stopped
    pub async fn serve(self, addr: &str) -> crate::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("serving one-time downloads on {}", addr);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// Landing page: a read-only view of one token
async fn landing(State(state): State<ServerState>, Path(token): Path<String>) -> Response {
    let found = {
        let store = state.store().await;
        lifecycle::peek(&store.load_or_empty(), &token, state.validity())
    };
    let info = match found {
        Some(info) => info,
        None => return deny(&token, Denial::UnknownToken),
    };
    // Live stat: the page shows the current size and doubles as the
    // file-existence check.
    let meta = match tokio::fs::metadata(&info.path).await {
        Ok(meta) => meta,
        Err(err) => {
            tracing::warn!(
                "{} points at unreadable file {}: {}",
                token,
                info.path.display(),
                err
            );
            return deny(&token, Denial::FileMissing);
        }
    };
    if !meta.is_file() {
        tracing::warn!(
            "{} no longer points at a regular file: {}",
            token,
            info.path.display()
        );
        return deny(&token, Denial::FileMissing);
    }
    tracing::info!("landing page for {} ({})", token, info.name);
    Html(pages::landing_page(
        &info.name,
        meta.len(),
        info.valid_until,
        &token,
    ))
    .into_response()
}

/// Download trigger: the activation and expiry rules are enforced here
async fn download(
    State(state): State<ServerState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Response {
    // The whole redeem sequence runs under the in-process mutex and the
    // cross-process store lock: load, decide, open the file, persist the
    // activation. Streaming starts after both are released.
    let (file, size, name, first) = {
        let store = state.store().await;
        let _held = match store.lock() {
            Ok(held) => held,
            Err(err) => {
                tracing::error!("cannot lock token store: {}", err);
                return internal_error();
            }
        };
        let mut map = store.load_or_empty();
        let now = Utc::now();
        let (path, name, first) = match lifecycle::access(&map, &token, now, state.validity()) {
            Access::Granted { path, name, first } => (path, name, first),
            Access::Denied(denial) => return deny(&token, denial),
        };
        // Open and stat before activating: a vanished file, or one
        // swapped for something unservable, must not burn the one-shot
        // transition.
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(
                    "{} points at unreadable file {}: {}",
                    token,
                    path.display(),
                    err
                );
                return deny(&token, Denial::FileMissing);
            }
        };
        let meta = match file.metadata().await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => {
                tracing::warn!(
                    "{} no longer points at a regular file: {}",
                    token,
                    path.display()
                );
                return deny(&token, Denial::FileMissing);
            }
            Err(err) => {
                tracing::warn!("cannot stat {} for {}: {}", path.display(), token, err);
                return deny(&token, Denial::FileMissing);
            }
        };
        if first {
            lifecycle::activate(&mut map, &token, now);
            match store.save(&map) {
                Ok(()) => tracing::info!("token {} activated", token),
                // The serve decision is already taken; refusing now would
                // not undo it. Keep serving and alert the operator.
                Err(err) => tracing::error!("activation of {} not persisted: {}", token, err),
            }
        }
        (file, meta.len(), name, first)
    };

    let mime = mime_guess::from_path(&name)
        .first_or_octet_stream()
        .to_string();

    if let Some(range) = headers.get(header::RANGE) {
        return serve_range(file, size, range, &mime, &name).await;
    }

    tracing::info!(
        "sending {} for {} ({} bytes, first: {})",
        name,
        token,
        size,
        first
    );
    let body = Body::from_stream(ReaderStream::new(file));
    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_DISPOSITION, attachment(&name))
        .header(header::ACCEPT_RANGES, "bytes")
        .body(body)
    {
        Ok(response) => response,
        Err(err) => {
            tracing::error!("building download response failed: {}", err);
            internal_error()
        }
    }
}

/// Serve one byte range of an already-opened file
async fn serve_range(
    mut file: File,
    size: u64,
    range: &HeaderValue,
    mime: &str,
    name: &str,
) -> Response {
    let (start, end) = match parse_range(range, size) {
        Ok(span) => span,
        Err(RangeError::Malformed) => {
            return (StatusCode::BAD_REQUEST, "invalid range header").into_response();
        }
        Err(RangeError::Unsatisfiable) => {
            return (
                StatusCode::RANGE_NOT_SATISFIABLE,
                format!("range not satisfiable, file size is {}", size),
            )
                .into_response();
        }
    };
    let len = end - start + 1;
    if let Err(err) = file.seek(SeekFrom::Start(start)).await {
        tracing::error!("seek in {} failed: {}", name, err);
        return internal_error();
    }

    let body = Body::from_stream(ReaderStream::new(file.take(len)));
    match Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_LENGTH, len)
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, size),
        )
        .header(header::CONTENT_DISPOSITION, attachment(name))
        .header(header::ACCEPT_RANGES, "bytes")
        .body(body)
    {
        Ok(response) => response,
        Err(err) => {
            tracing::error!("building range response failed: {}", err);
            internal_error()
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RangeError {
    Malformed,
    Unsatisfiable,
}

/// Parse a `bytes=start-end` header against the file size.
///
/// Only single forward ranges are supported; suffix ranges and range
/// lists are rejected as malformed. An `end` past the last byte is
/// clamped to it, so an omitted and an oversized `end` both mean "to the
/// end of the file".
fn parse_range(value: &HeaderValue, size: u64) -> Result<(u64, u64), RangeError> {
    let raw = value.to_str().map_err(|_| RangeError::Malformed)?;
    let range_part = raw.strip_prefix("bytes=").ok_or(RangeError::Malformed)?;
    let parts: Vec<&str> = range_part.split('-').collect();
    if parts.len() != 2 {
        return Err(RangeError::Malformed);
    }
    let start: u64 = parts[0].parse().map_err(|_| RangeError::Malformed)?;
    let end: u64 = if parts[1].is_empty() {
        size.saturating_sub(1)
    } else {
        parts[1]
            .parse::<u64>()
            .map_err(|_| RangeError::Malformed)?
            .min(size.saturating_sub(1))
    };
    if start > end || start >= size {
        return Err(RangeError::Unsatisfiable);
    }
    Ok((start, end))
}

/// Content-Disposition value for a download. Header values must be
/// visible ASCII, so anything else in the file name is replaced.
fn attachment(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_ascii_graphic() || ch == ' ' => ch,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// Log a refusal and answer with the uniform not-found response.
///
/// Unknown, expired and missing-file all produce byte-identical responses
/// so a probing client learns nothing about which tokens exist.
fn deny(token: &str, denial: Denial) -> Response {
    match denial {
        Denial::FileMissing => tracing::warn!("404 {}: {}", token, denial.reason()),
        _ => tracing::info!("404 {}: {}", token, denial.reason()),
    }
    not_found()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error\n").into_response()
}

/// Embedded favicon, same bytes for every request
async fn favicon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/x-icon")], FAVICON)
}

/// Anything that matches no route gets the same body as a bad token
async fn fallback() -> Response {
    not_found()
}
