//! Operator upload form.
//!
//! A small axum server where operators register proof for a social post:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /` | HTML form |
//! | `POST /upload` | multipart: `account`, `platform`, `link`, `proof_urls`, `files` |
//! | `GET /media/{name}` | stored proof files |
//! | `GET /registry/{account}` | every non-empty registry of an account |
//! | `GET /registry/{account}/{platform}` | current registry as JSON |
//! | `GET /health` | liveness |

use crate::classify::Platform;
use crate::config::UploadConfig;
use crate::store::{self, MatchStore, RegistryView};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

const FORM_TEMPLATE: &str = include_str!("form.html");

/// Shared state of the upload server.
#[derive(Clone)]
pub struct UploadState {
    store: MatchStore,
    accounts: Arc<Vec<String>>,
    media_dir: PathBuf,
    public_base_url: String,
}

impl UploadState {
    pub fn new(
        store: MatchStore,
        accounts: Vec<String>,
        media_dir: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            accounts: Arc::new(accounts),
            media_dir: media_dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn knows_account(&self, name: &str) -> bool {
        self.accounts.iter().any(|a| a == name)
    }
}

/// Build the router. `max_upload_bytes` caps request bodies.
pub fn router(state: UploadState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(form_page))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/media/{name}", get(media))
        .route("/registry/{account}", get(account_registries))
        .route("/registry/{account}/{platform}", get(registry))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Bind the configured `host:port`.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn bind(config: &UploadConfig) -> anyhow::Result<tokio::net::TcpListener> {
    let addr = format!("{}:{}", config.host, config.port);
    tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("cannot bind upload form on {addr}: {e}"))
}

/// Serve the upload form on an already bound listener.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: UploadState,
    max_upload_bytes: usize,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    let app = router(state, max_upload_bytes);
    tracing::info!("upload form listening on http://{local_addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok"
    }))
}

async fn form_page(State(state): State<UploadState>) -> Html<String> {
    Html(render_form(&state.accounts))
}

fn render_form(accounts: &[String]) -> String {
    let account_options: String = accounts
        .iter()
        .map(|a| {
            let a = escape_html(a);
            format!("<option value=\"{a}\">{a}</option>")
        })
        .collect();
    let platform_options: String = Platform::ALL
        .iter()
        .map(|p| format!("<option value=\"{p}\">{p}</option>"))
        .collect();
    FORM_TEMPLATE
        .replace("{{ACCOUNT_OPTIONS}}", &account_options)
        .replace("{{PLATFORM_OPTIONS}}", &platform_options)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

#[derive(Default)]
struct UploadForm {
    account: String,
    platform: String,
    link: String,
    proof_urls: Vec<String>,
    files: Vec<(Option<String>, Bytes)>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, String> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "account" => form.account = field.text().await.map_err(|e| e.to_string())?,
            "platform" => form.platform = field.text().await.map_err(|e| e.to_string())?,
            "link" => form.link = field.text().await.map_err(|e| e.to_string())?,
            "proof_urls" => {
                let text = field.text().await.map_err(|e| e.to_string())?;
                form.proof_urls.extend(
                    text.lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_owned),
                );
            }
            "files" | "file" => {
                let file_name = field.file_name().map(str::to_owned);
                let data = field.bytes().await.map_err(|e| e.to_string())?;
                // Browsers send an empty part when no file was picked.
                if !data.is_empty() {
                    form.files.push((file_name, data));
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown upload field"),
        }
    }
    Ok(form)
}

async fn upload(State(state): State<UploadState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid form: {e}")),
    };

    let account = form.account.trim();
    if !state.knows_account(account) {
        return error_response(StatusCode::BAD_REQUEST, format!("unknown account `{account}`"));
    }
    let platform: Platform = match form.platform.parse() {
        Ok(platform) => platform,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    let link = form.link.trim();
    if link.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "link must not be empty");
    }
    if form.proof_urls.is_empty() && form.files.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "at least one proof URL or file is required",
        );
    }

    let mut artifacts = form.proof_urls;
    for (file_name, data) in &form.files {
        match store_media(&state, file_name.as_deref(), data).await {
            Ok(url) => artifacts.push(url),
            Err(e) => {
                tracing::error!("failed to store uploaded file: {e}");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not store file");
            }
        }
    }

    match state.store.insert(account, platform, link, &artifacts) {
        Ok(stored) => {
            tracing::info!(account, platform = %platform, link, proofs = stored.len(), "proof registered");
            (
                StatusCode::OK,
                Json(json!({
                    "account": account,
                    "platform": platform,
                    "link": link,
                    "artifacts": stored,
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(account, platform = %platform, "failed to save registry: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not save registry")
        }
    }
}

/// Write one uploaded file under the media directory and return its public URL.
async fn store_media(state: &UploadState, file_name: Option<&str>, data: &[u8]) -> std::io::Result<String> {
    tokio::fs::create_dir_all(&state.media_dir).await?;
    let name = format!("{}{}", uuid::Uuid::new_v4().simple(), extension_of(file_name));
    tokio::fs::write(state.media_dir.join(&name), data).await?;
    Ok(format!("{}/media/{name}", state.public_base_url))
}

/// `.ext` from an uploaded file name, restricted to short alphanumeric extensions.
fn extension_of(file_name: Option<&str>) -> String {
    let ext = file_name
        .and_then(|n| std::path::Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    ext.map(|e| format!(".{e}")).unwrap_or_default()
}

/// Only names produced by [`store_media`]: 32 lowercase hex digits plus an
/// optional short alphanumeric extension.
fn is_media_name(name: &str) -> bool {
    let (stem, ext) = match name.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (name, None),
    };
    let stem_ok = stem.len() == 32
        && stem
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    let ext_ok = ext.is_none_or(|e| {
        !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    });
    stem_ok && ext_ok
}

fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or_default();
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

async fn media(State(state): State<UploadState>, Path(name): Path<String>) -> Response {
    if !is_media_name(&name) {
        return error_response(StatusCode::BAD_REQUEST, "invalid media name");
    }
    match tokio::fs::read(state.media_dir.join(&name)).await {
        Ok(data) => ([(header::CONTENT_TYPE, content_type_for(&name))], data).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error_response(StatusCode::NOT_FOUND, "no such media")
        }
        Err(e) => {
            tracing::error!(name, "failed to read media: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not read media")
        }
    }
}

async fn registry(
    State(state): State<UploadState>,
    Path((account, platform)): Path<(String, String)>,
) -> Response {
    if !state.knows_account(&account) {
        return error_response(StatusCode::NOT_FOUND, format!("unknown account `{account}`"));
    }
    let platform: Platform = match platform.parse() {
        Ok(platform) => platform,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    match state.store.load(&account, platform) {
        Ok(entries) => Json(RegistryView {
            account: &account,
            platform,
            entries: &entries,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(account, platform = %platform, "failed to load registry: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not load registry")
        }
    }
}

async fn account_registries(
    State(state): State<UploadState>,
    Path(account): Path<String>,
) -> Response {
    if !state.knows_account(&account) {
        return error_response(StatusCode::NOT_FOUND, format!("unknown account `{account}`"));
    }
    match store::snapshot(&state.store, &account) {
        Ok(all) => Json(all).into_response(),
        Err(e) => {
            tracing::error!(account, "failed to load registries: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not load registry")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_lists_accounts_and_platforms() {
        let html = render_form(&["alice".to_owned(), "<bob>".to_owned()]);
        assert!(html.contains("<option value=\"alice\">alice</option>"));
        assert!(html.contains("&lt;bob&gt;"));
        assert!(html.contains("<option value=\"linkedin\">linkedin</option>"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn extensions_are_sanitised() {
        assert_eq!(extension_of(Some("proof.PNG")), ".png");
        assert_eq!(extension_of(Some("archive.tar.gz")), ".gz");
        assert_eq!(extension_of(Some("evil.p/hp")), "");
        assert_eq!(extension_of(Some("noext")), "");
        assert_eq!(extension_of(None), "");
    }

    #[test]
    fn only_stored_media_names_are_served() {
        let stored = uuid::Uuid::new_v4().simple().to_string();
        assert!(is_media_name(&stored));
        assert!(is_media_name(&format!("{stored}.png")));
        assert!(!is_media_name("3f2a.png"));
        assert!(!is_media_name("twitter.json"));
        assert!(!is_media_name("seen.json"));
        assert!(!is_media_name(&format!("{stored}.tar.gz")));
        assert!(!is_media_name(&format!("{stored}.")));
        assert!(!is_media_name(&format!("{}.png", stored.to_uppercase())));
        assert!(!is_media_name("../secret"));
        assert!(!is_media_name(""));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
