//! Accounts and the per-account context handed to every operation.

use crate::config::{AccountConfig, BotConfig};
use crate::error::Result;
use crate::notify::Notifier;
use crate::store::MatchStore;
use crate::upstream::UpstreamClient;
use std::sync::Arc;

/// A monitored account. Immutable after startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    name: String,
    cookie: String,
}

impl Account {
    pub fn new(name: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cookie: cookie.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    /// First characters of the cookie, for startup logs.
    pub fn cookie_preview(&self) -> String {
        if self.cookie.is_empty() {
            return "<empty>".to_owned();
        }
        let preview: String = self.cookie.chars().take(12).collect();
        format!("{preview}... ({} chars)", self.cookie.chars().count())
    }
}

impl From<&AccountConfig> for Account {
    fn from(config: &AccountConfig) -> Self {
        Self::new(config.name.trim(), config.cookie.clone())
    }
}

// Cookies never reach Debug output.
impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("cookie", &"<redacted>")
            .finish()
    }
}

/// Everything an account's monitor and claim workers need.
pub struct AccountContext {
    pub account: Account,
    pub client: UpstreamClient,
    pub store: MatchStore,
    pub notifier: Arc<dyn Notifier>,
}

impl AccountContext {
    /// Build the context for `account`, creating its authenticated client.
    ///
    /// # Errors
    ///
    /// Fails when the upstream client cannot be built (e.g. a cookie with
    /// invalid header bytes).
    pub fn new(
        config: &BotConfig,
        account: Account,
        store: MatchStore,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let client = UpstreamClient::new(
            &config.api,
            &config.community,
            account.cookie(),
            config.request_timeout(),
        )?;
        Ok(Self {
            account,
            client,
            store,
            notifier,
        })
    }

    pub fn name(&self) -> &str {
        self.account.name()
    }

    /// Deliver `text` through the notifier, logging instead of failing.
    pub async fn notify(&self, text: &str) {
        crate::notify::notify_best_effort(self.notifier.as_ref(), text).await;
    }
}
