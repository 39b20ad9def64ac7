//! Outbound operator notifications.
//!
//! Delivery is best effort: callers go through [`notify_best_effort`], which
//! logs failures and never propagates them into the polling loop.

pub mod telegram;

use crate::config::TelegramConfig;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

pub use telegram::TelegramNotifier;

/// Notification sink contract.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Stable sink identifier (e.g. `telegram`).
    fn id(&self) -> &'static str;

    /// Deliver one text message.
    async fn notify(&self, text: &str) -> anyhow::Result<()>;
}

/// Sink used when nothing is configured. Messages are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    fn id(&self) -> &'static str {
        "noop"
    }

    async fn notify(&self, text: &str) -> anyhow::Result<()> {
        tracing::debug!("notifications not configured, skipping: {text}");
        Ok(())
    }
}

/// Keeps every message in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages().iter().filter(|m| m.contains(needle)).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn id(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, text: &str) -> anyhow::Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_owned());
        Ok(())
    }
}

/// Build the configured sink: Telegram when token and chat id are set,
/// otherwise [`NoopNotifier`].
///
/// # Errors
///
/// Returns an error if the Telegram HTTP client cannot be built.
pub fn from_config(config: &TelegramConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    if !config.is_enabled() {
        tracing::info!("telegram notifications disabled (TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID unset)");
        return Ok(Arc::new(NoopNotifier));
    }
    Ok(Arc::new(TelegramNotifier::new(config)?))
}

/// Send `text`, logging any failure instead of returning it.
pub async fn notify_best_effort(notifier: &dyn Notifier, text: &str) {
    if let Err(e) = notifier.notify(text).await {
        tracing::warn!(sink = notifier.id(), "notification dropped: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify("first").await.unwrap();
        notify_best_effort(&notifier, "second").await;
        assert_eq!(notifier.messages(), vec!["first", "second"]);
        assert_eq!(notifier.count_containing("sec"), 1);
    }

    #[test]
    fn unconfigured_telegram_is_noop() {
        let sink = from_config(&TelegramConfig::default()).unwrap();
        assert_eq!(sink.id(), "noop");
    }

    #[test]
    fn configured_telegram_is_selected() {
        let config = TelegramConfig {
            bot_token: Some("123:abc".into()),
            chat_id: Some("@chan".into()),
            ..Default::default()
        };
        assert_eq!(from_config(&config).unwrap().id(), "telegram");
    }
}
