//! Upload form served on an ephemeral port and driven over HTTP.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use questclaim::upload::{self, UploadState};
use questclaim::{MatchStore, Platform};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

struct Harness {
    base: String,
    store: MatchStore,
    _dir: tempfile::TempDir,
}

async fn start() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = MatchStore::new(dir.path());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let state = UploadState::new(
        store.clone(),
        vec!["alice".to_owned(), "bob".to_owned()],
        dir.path().join("media"),
        base.clone(),
    );
    tokio::spawn(upload::serve(listener, state, 1024 * 1024));
    Harness {
        base,
        store,
        _dir: dir,
    }
}

fn form(account: &str, platform: &str, link: &str) -> Form {
    Form::new()
        .text("account", account.to_owned())
        .text("platform", platform.to_owned())
        .text("link", link.to_owned())
}

async fn post(h: &Harness, form: Form) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/upload", h.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

// ────────────────────────────────────────────────────────────────────────────
// Pages
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let h = start().await;
    let body: Value = reqwest::get(format!("{}/health", h.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn form_lists_accounts_and_platforms() {
    let h = start().await;
    let page = reqwest::get(&h.base).await.unwrap().text().await.unwrap();
    assert!(page.contains("<option value=\"alice\">alice</option>"));
    assert!(page.contains("<option value=\"bob\">bob</option>"));
    assert!(page.contains("<option value=\"tiktok\">tiktok</option>"));
    assert!(!page.contains("{{"));
}

// ────────────────────────────────────────────────────────────────────────────
// Uploads
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_registers_urls_and_files() {
    let h = start().await;
    let file = Part::bytes(b"PNGDATA".to_vec())
        .file_name("proof.PNG")
        .mime_str("image/png")
        .unwrap();
    let form = form("alice", "twitter", "https://x.com/reef/status/1")
        .text("proof_urls", "https://x.com/me/status/2\n\n  https://x.com/me/status/3  ")
        .part("files", file);

    let (status, body) = post(&h, form).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["account"], "alice");
    assert_eq!(body["platform"], "twitter");

    let artifacts: Vec<String> = serde_json::from_value(body["artifacts"].clone()).unwrap();
    assert_eq!(artifacts.len(), 3);
    assert_eq!(artifacts[0], "https://x.com/me/status/2");
    assert_eq!(artifacts[1], "https://x.com/me/status/3");
    let media_url = &artifacts[2];
    assert!(media_url.starts_with(&format!("{}/media/", h.base)));
    assert!(media_url.ends_with(".png"));

    let stored = h
        .store
        .lookup("alice", Platform::Twitter, "https://twitter.com/reef/status/1")
        .unwrap();
    assert_eq!(stored.as_ref(), Some(&artifacts));

    let media = reqwest::get(media_url).await.unwrap();
    assert_eq!(media.status(), StatusCode::OK);
    assert_eq!(media.headers()["content-type"], "image/png");
    assert_eq!(media.bytes().await.unwrap().as_ref(), b"PNGDATA");
}

#[tokio::test]
async fn repeated_upload_appends_without_duplicates() {
    let h = start().await;
    let link = "https://www.tiktok.com/@reef/video/9";
    for proofs in ["https://a.example/1", "https://a.example/1\nhttps://a.example/2"] {
        let (status, _) = post(&h, form("bob", "tiktok", link).text("proof_urls", proofs)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let body: Value = reqwest::get(format!("{}/registry/bob/tiktok", h.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["account"], "bob");
    assert_eq!(
        body["entries"][link],
        serde_json::json!(["https://a.example/1", "https://a.example/2"])
    );

    let all: Value = reqwest::get(format!("{}/registry/bob", h.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(all["tiktok"][link].is_array());
    assert!(all.get("twitter").is_none());
}

#[tokio::test]
async fn invalid_uploads_are_rejected() {
    let h = start().await;
    let cases = [
        form("mallory", "twitter", "https://x.com/a/status/1").text("proof_urls", "p"),
        form("alice", "myspace", "https://x.com/a/status/1").text("proof_urls", "p"),
        form("alice", "twitter", "   ").text("proof_urls", "p"),
        form("alice", "twitter", "https://x.com/a/status/1"),
        form("alice", "twitter", "https://x.com/a/status/1")
            .part("files", Part::bytes(Vec::new()).file_name("empty.png")),
    ];
    for case in cases {
        let (status, body) = post(&h, case).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(body["error"].is_string());
    }
    assert!(h.store.load("alice", Platform::Twitter).unwrap().is_empty());
}

#[tokio::test]
async fn unknown_account_and_media_are_not_found() {
    let h = start().await;
    let registry = reqwest::get(format!("{}/registry/mallory/twitter", h.base))
        .await
        .unwrap();
    assert_eq!(registry.status(), StatusCode::NOT_FOUND);

    let media = reqwest::get(format!("{}/media/0123456789abcdef0123456789abcdef.png", h.base))
        .await
        .unwrap();
    assert_eq!(media.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn account_state_is_never_served_as_media() {
    let dir = tempfile::tempdir().unwrap();
    let store = MatchStore::new(dir.path());
    store
        .insert("media", Platform::Twitter, "https://x.com/a/status/1", &["secret-proof".to_owned()])
        .unwrap();
    assert!(!store.registry_path("media", Platform::Twitter).starts_with(dir.path().join("media")));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let state = UploadState::new(
        store,
        vec!["media".to_owned()],
        questclaim::app_dirs::media_dir(dir.path()),
        base.clone(),
    );
    tokio::spawn(upload::serve(listener, state, 1024 * 1024));

    for name in ["twitter.json", "seen.json", "accounts"] {
        let response = reqwest::get(format!("{base}/media/{name}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{name}");
        let body = response.text().await.unwrap();
        assert!(!body.contains("secret-proof"));
    }
}
