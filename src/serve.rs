//! HTTP server for decks and pages.
//!
//! The directory holding the entry deck is the serve root. Markdown decks are
//! rendered on every request, HTML pages get their code blocks normalized,
//! and anything else is handed to `ServeDir` as a static asset.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{Path as UrlPath, Query, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::deck;
use crate::highlight::Highlighter;
use crate::normalize::Whitespace;
use crate::page;
use crate::web_assets;

/// Largest deck or page that will be read and rendered (16 MiB).
pub const MAX_DOCUMENT_SIZE: u64 = 16 * 1024 * 1024;

/// Looked up, in order, when a request names a directory.
const INDEX_FILES: &[&str] = &["index.md", "index.html"];

/// Per-server rendering settings.
pub struct AppConfig {
    /// Whitespace definition used when trimming code blocks.
    pub whitespace: Whitespace,
}

struct AppState {
    /// Canonical serve root.
    root: PathBuf,
    /// Canonical path of the document served at `/`.
    entry: PathBuf,
    highlighter: Highlighter,
    whitespace: Whitespace,
    /// Fingerprint of everything besides the file that shapes a rendering.
    settings_tag: String,
    started: SystemTime,
    static_files: ServeDir,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// How a document is turned into a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendering {
    Deck,
    /// Deck source as `text/plain` (`?raw=1`).
    Raw,
    Page,
}

impl Rendering {
    fn as_str(self) -> &'static str {
        match self {
            Rendering::Deck => "deck",
            Rendering::Raw => "raw",
            Rendering::Page => "page",
        }
    }
}

/// `None` for files that are served as static assets.
fn rendering_for(path: &Path, raw: bool) -> Option<Rendering> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "md" | "markdown" if raw => Some(Rendering::Raw),
        "md" | "markdown" => Some(Rendering::Deck),
        "html" | "htm" => Some(Rendering::Page),
        _ => None,
    }
}

fn settings_tag(theme: &str, ws: Whitespace) -> String {
    let mut hasher = DefaultHasher::new();
    env!("CARGO_PKG_VERSION").hash(&mut hasher);
    theme.hash(&mut hasher);
    ws.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Turn a decoded request path into a path relative to the serve root.
///
/// Only plain names and `.` are accepted; `..` and absolute paths are not.
fn relative_path(request_path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(request_path).components() {
        match component {
            Component::Normal(name) => relative.push(name),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(relative)
}

/// Find the file for `relative` under `root`, following directory index
/// files. Symlinks are resolved and must stay inside `root`.
async fn locate(root: &Path, relative: &Path) -> Option<PathBuf> {
    let candidate = root.join(relative);
    let file = if tokio::fs::metadata(&candidate).await.ok()?.is_dir() {
        let mut found = None;
        for name in INDEX_FILES {
            let index = candidate.join(name);
            if tokio::fs::metadata(&index).await.is_ok_and(|m| m.is_file()) {
                found = Some(index);
                break;
            }
        }
        found?
    } else {
        candidate
    };

    let canonical = tokio::fs::canonicalize(&file).await.ok()?;
    canonical.starts_with(root).then_some(canonical)
}

// ---------------------------------------------------------------------------
// Conditional requests
// ---------------------------------------------------------------------------

/// Cache validators for one rendering of a document.
struct Validators {
    etag: String,
    last_modified: String,
    /// Truncated to whole seconds (HTTP date precision).
    modified: SystemTime,
}

impl Validators {
    /// `variant` names the rendering so different bodies of the same file
    /// never share an ETag.
    fn new(len: u64, modified: SystemTime, variant: &str) -> Self {
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let modified = UNIX_EPOCH + Duration::from_secs(secs);
        Self {
            etag: format!("\"{len:x}-{secs:x}-{variant}\""),
            last_modified: httpdate::fmt_http_date(modified),
            modified,
        }
    }

    /// `If-None-Match` wins over `If-Modified-Since` when both are sent.
    fn is_fresh(&self, headers: &HeaderMap) -> bool {
        if let Some(tags) = header_str(headers, header::IF_NONE_MATCH) {
            return tags.split(',').map(str::trim).any(|tag| {
                tag == "*" || tag.strip_prefix("W/").unwrap_or(tag) == self.etag
            });
        }
        header_str(headers, header::IF_MODIFIED_SINCE)
            .and_then(|date| httpdate::parse_http_date(date).ok())
            .is_some_and(|since| self.modified <= since)
    }
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn wants_raw(query: &HashMap<String, String>) -> bool {
    query.get("raw").is_some_and(|v| v == "1")
}

async fn stylesheet() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        web_assets::CSS,
    )
}

async fn entry_document(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let rendering = rendering_for(&state.entry, wants_raw(&query)).unwrap_or(Rendering::Page);
    serve_document(&state, &state.entry, "/", rendering, &headers).await
}

async fn document_or_file(
    State(state): State<Arc<AppState>>,
    UrlPath(path): UrlPath<String>,
    Query(query): Query<HashMap<String, String>>,
    req: Request,
) -> Response {
    let Some(relative) = relative_path(&path) else {
        eprintln!("[resolve] path={path} denied=outside-root");
        return not_found();
    };
    let Some(file) = locate(&state.root, &relative).await else {
        eprintln!("[resolve] path={path} denied=not-found");
        return not_found();
    };

    match rendering_for(&file, wants_raw(&query)) {
        Some(rendering) => serve_document(&state, &file, &path, rendering, req.headers()).await,
        None => {
            eprintln!("[request] path={path} mode=static");
            let mut files = state.static_files.clone();
            match files.try_call(req).await {
                Ok(response) => response.map(Body::new),
                Err(e) => {
                    eprintln!("[request] path={path} mode=static error={e}");
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
                }
            }
        }
    }
}

async fn serve_document(
    state: &AppState,
    file: &Path,
    label: &str,
    rendering: Rendering,
    headers: &HeaderMap,
) -> Response {
    let Ok(meta) = tokio::fs::metadata(file).await else {
        return not_found();
    };
    if meta.len() > MAX_DOCUMENT_SIZE {
        eprintln!("[request] path={label} denied=too-large size={}", meta.len());
        let message = format!(
            "Content Too Large: {label} ({} bytes exceeds {MAX_DOCUMENT_SIZE} byte limit)",
            meta.len()
        );
        return (StatusCode::PAYLOAD_TOO_LARGE, message).into_response();
    }

    // Rendered bodies also depend on the server settings, so they never
    // look older than the server itself.
    let mtime = meta.modified().unwrap_or(UNIX_EPOCH);
    let validators = match rendering {
        Rendering::Raw => Validators::new(meta.len(), mtime, rendering.as_str()),
        Rendering::Deck | Rendering::Page => Validators::new(
            meta.len(),
            mtime.max(state.started),
            &format!("{}.{}", rendering.as_str(), state.settings_tag),
        ),
    };
    if validators.is_fresh(headers) {
        eprintln!("[request] path={label} mode={} fresh=true", rendering.as_str());
        return (
            StatusCode::NOT_MODIFIED,
            [
                (header::ETAG, validators.etag),
                (header::LAST_MODIFIED, validators.last_modified),
            ],
        )
            .into_response();
    }

    let Ok(source) = tokio::fs::read_to_string(file).await else {
        return not_found();
    };

    let (content_type, body) = match rendering {
        Rendering::Raw => ("text/plain; charset=utf-8", source),
        Rendering::Page => {
            let rewrite = page::rewrite_page(&source, state.whitespace);
            eprintln!(
                "[page] path={label} blocks={} changed={}",
                rewrite.blocks, rewrite.changed
            );
            ("text/html; charset=utf-8", rewrite.html)
        }
        Rendering::Deck => {
            match deck::render_deck(&source, file, &state.highlighter, state.whitespace) {
                Ok(deck) => ("text/html; charset=utf-8", deck::build_page_shell(&deck, false)),
                Err(e) => {
                    eprintln!("[request] path={label} mode=deck error={e}");
                    return (StatusCode::INTERNAL_SERVER_ERROR, format!("Deck Error: {e}"))
                        .into_response();
                }
            }
        }
    };

    eprintln!("[request] path={label} mode={}", rendering.as_str());
    (
        [
            (header::CONTENT_TYPE, content_type.to_owned()),
            (header::ETAG, validators.etag),
            (header::LAST_MODIFIED, validators.last_modified),
        ],
        body,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        eprintln!("[shutdown] cannot listen for SIGINT: {e}");
        std::future::pending::<()>().await;
    }
    eprintln!("[shutdown] signal=SIGINT");
}

/// Serve the deck or page `file` (at `/`) and its directory.
///
/// Runs until SIGINT (Ctrl+C).
pub async fn run_serve(
    file: String,
    bind_addr: String,
    port: u16,
    highlighter: Highlighter,
    config: AppConfig,
) -> io::Result<()> {
    let entry = tokio::fs::canonicalize(&file)
        .await
        .map_err(|e| io::Error::new(e.kind(), format!("{file}: {e}")))?;
    if rendering_for(&entry, false).is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{file}' is not a markdown deck or HTML page"),
        ));
    }
    let root = entry
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    let listener = tokio::net::TcpListener::bind((bind_addr.as_str(), port))
        .await
        .map_err(|e| io::Error::new(e.kind(), format!("bind {bind_addr}:{port}: {e}")))?;
    let local = listener.local_addr()?;

    println!("snipdeck serve");
    println!("deck:  {}", entry.display());
    println!("url:   http://{local}/");

    let settings_tag = settings_tag(highlighter.default_theme(), config.whitespace);
    eprintln!(
        "[serve] addr={local} theme={} whitespace={:?} settings={settings_tag}",
        highlighter.default_theme(),
        config.whitespace
    );

    let state = Arc::new(AppState {
        static_files: ServeDir::new(&root),
        root,
        entry,
        highlighter,
        whitespace: config.whitespace,
        settings_tag,
        started: SystemTime::now(),
    });

    let app = Router::new()
        .route("/", get(entry_document))
        .route("/assets/snipdeck.css", get(stylesheet))
        .route("/{*path}", get(document_or_file))
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(CompressionLayer::new());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
