//! Telegram delivery against a mock Bot API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use questclaim::Notifier;
use questclaim::TelegramNotifier;
use questclaim::config::TelegramConfig;
use questclaim::notify;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEND: &str = "/botTOKEN/sendMessage";

fn config(server: &MockServer, max_attempts: u32) -> TelegramConfig {
    TelegramConfig {
        bot_token: Some("TOKEN".into()),
        chat_id: Some("12345".into()),
        api_base: server.uri(),
        max_attempts,
        backoff_base_ms: 2,
    }
}

#[tokio::test]
async fn sends_chat_id_and_text_as_form_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND))
        .and(body_string_contains("chat_id=12345"))
        .and(body_string_contains("text=hello"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(&config(&server, 3)).unwrap();
    assert_eq!(notifier.id(), "telegram");
    notifier.notify("hello").await.unwrap();
}

#[tokio::test]
async fn retries_until_the_api_accepts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(&config(&server, 3)).unwrap();
    notifier.notify("eventually").await.unwrap();
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .expect(3)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(&config(&server, 3)).unwrap();
    let err = notifier.notify("dropped").await.unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("after 3 attempts"), "unexpected error: {chain}");
    assert!(chain.contains("429"), "unexpected error: {chain}");
}

#[tokio::test]
async fn best_effort_delivery_swallows_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = notify::from_config(&config(&server, 1)).unwrap();
    assert_eq!(notifier.id(), "telegram");
    notify::notify_best_effort(notifier.as_ref(), "lost").await;
}

#[tokio::test]
async fn disabled_config_yields_noop_notifier() {
    let notifier = notify::from_config(&TelegramConfig::default()).unwrap();
    assert_eq!(notifier.id(), "noop");
    notifier.notify("nobody listens").await.unwrap();
}
