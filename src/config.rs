//! Configuration types for the quest monitor.
//!
//! Configuration comes from an optional TOML file, then environment variables
//! (usually supplied through a `.env` file) override individual fields.

use crate::error::{QuestError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of indexed `ACCOUNT_{i}_*` environment slots that are scanned.
pub const ACCOUNT_ENV_SLOTS: usize = 20;

/// Longest accepted sleep between board fetches (one day).
pub const MAX_POLL_INTERVAL_SECS: f64 = 86_400.0;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Community slug on the quest board (e.g. `reef`).
    pub community: String,
    /// Seconds to sleep between quest-board fetches.
    pub poll_interval_secs: f64,
    /// Claim workers per account.
    pub max_workers: usize,
    /// Pending claim jobs buffered per account before the monitor waits.
    pub queue_capacity: usize,
    /// Per-request timeout for upstream calls in seconds.
    pub request_timeout_secs: u64,
    /// What happens to a quest whose claim failed.
    pub claim_retry: ClaimRetryPolicy,
    /// Persist each account's seen set so it survives restarts.
    pub persist_seen: bool,
    /// Data directory override (None = platform data dir).
    pub data_dir: Option<PathBuf>,
    /// Also write a daily-rolling log file under `<data_dir>/logs/`.
    pub log_to_file: bool,
    /// Upstream API endpoints.
    pub api: ApiConfig,
    /// Monitored accounts.
    pub accounts: Vec<AccountConfig>,
    /// Telegram notification sink.
    pub telegram: TelegramConfig,
    /// Operator upload form.
    pub upload: UploadConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            community: "reef".to_owned(),
            poll_interval_secs: 2.0,
            max_workers: 10,
            queue_capacity: 64,
            request_timeout_secs: 10,
            claim_retry: ClaimRetryPolicy::Never,
            persist_seen: true,
            data_dir: None,
            log_to_file: false,
            api: ApiConfig::default(),
            accounts: Vec::new(),
            telegram: TelegramConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

/// Upstream quest-board endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API root, e.g. `https://api-v1.zealy.io`.
    pub base_url: String,
    /// Web frontend root used for human-facing quest links.
    pub frontend_url: String,
    /// User-Agent override (None = built-in browser UA).
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-v1.zealy.io".to_owned(),
            frontend_url: "https://zealy.io".to_owned(),
            user_agent: None,
        }
    }
}

/// A monitored account: display name plus session cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub name: String,
    pub cookie: String,
}

/// Telegram `sendMessage` notification settings.
///
/// Notifications are disabled unless both `bot_token` and `chat_id` are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    /// Bot API root.
    pub api_base: String,
    /// Delivery attempts per message.
    pub max_attempts: u32,
    /// First retry delay; doubles on every further attempt.
    pub backoff_base_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_owned(),
            max_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

impl TelegramConfig {
    /// True when both the bot token and chat id are configured.
    pub fn is_enabled(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.bot_token) && set(&self.chat_id)
    }
}

/// Operator upload form settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Base URL under which stored proof files are reachable by the quest
    /// board (None = `http://{host}:{port}`).
    pub public_base_url: Option<String>,
    /// Maximum accepted request body in bytes.
    pub max_upload_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_owned(),
            port: 8787,
            public_base_url: None,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl UploadConfig {
    /// Base URL for stored media, without a trailing slash.
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_owned(),
            _ => format!("http://{}:{}", self.host, self.port),
        }
    }
}

/// What the monitor does with a quest whose claim failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimRetryPolicy {
    /// The quest stays seen; a failed claim is reported and never retried.
    #[default]
    Never,
    /// The quest is forgotten so the next poll rediscovers and retries it.
    NextPoll,
}

impl std::str::FromStr for ClaimRetryPolicy {
    type Err = QuestError;

    fn from_str(input: &str) -> Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "never" | "none" | "off" => Ok(Self::Never),
            "next_poll" | "next-poll" | "nextpoll" | "retry" => Ok(Self::NextPoll),
            other => Err(QuestError::Config(format!(
                "unknown claim retry policy `{other}` (expected never or next_poll)"
            ))),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| QuestError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| QuestError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/questclaim/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }

    /// Load and validate the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Self::resolve`] fails or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::resolve(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path` (or the default config path when it exists), then apply
    /// process environment overrides. The result is not validated.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is unreadable or an override is
    /// malformed.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Copy with cookies and the bot token masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |value: &str| {
            if value.is_empty() {
                String::new()
            } else {
                "<redacted>".to_owned()
            }
        };
        let mut copy = self.clone();
        for account in &mut copy.accounts {
            account.cookie = mask(&account.cookie);
        }
        copy.telegram.bot_token = copy.telegram.bot_token.as_deref().map(mask);
        copy
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Recognised keys: `ACCOUNT_{1..20}_NAME`, `ACCOUNT_{1..20}_COOKIE`,
    /// `COMMUNITY`, `POLL_INTERVAL`, `MAX_WORKERS`, `CLAIM_RETRY`,
    /// `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `UPLOAD_PORT`.
    /// Accounts found in the environment replace those from the file.
    ///
    /// # Errors
    ///
    /// Returns [`QuestError::Config`] when a numeric or enum value is malformed.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let accounts = parse_env_accounts(&lookup);
        if !accounts.is_empty() {
            self.accounts = accounts;
        }
        if let Some(community) = get("COMMUNITY") {
            self.community = community;
        }
        if let Some(raw) = get("POLL_INTERVAL") {
            self.poll_interval_secs = raw
                .parse()
                .map_err(|_| QuestError::Config(format!("POLL_INTERVAL is not a number: {raw}")))?;
        }
        if let Some(raw) = get("MAX_WORKERS") {
            self.max_workers = raw
                .parse()
                .map_err(|_| QuestError::Config(format!("MAX_WORKERS is not an integer: {raw}")))?;
        }
        if let Some(raw) = get("CLAIM_RETRY") {
            self.claim_retry = raw.parse()?;
        }
        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat) = get("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat);
        }
        if let Some(raw) = get("UPLOAD_PORT") {
            self.upload.port = raw
                .parse()
                .map_err(|_| QuestError::Config(format!("UPLOAD_PORT is not a port: {raw}")))?;
        }
        Ok(())
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - at least one account, with unique non-empty names
    /// - `community` is not empty
    /// - `poll_interval_secs` is finite, positive and at most a day
    /// - `max_workers`, `queue_capacity`, `request_timeout_secs` are positive
    /// - `telegram.max_attempts` is positive
    pub fn validate(&self) -> Result<()> {
        if self.accounts.is_empty() {
            return Err(QuestError::Config(
                "no accounts configured (set ACCOUNT_1_NAME / ACCOUNT_1_COOKIE)".into(),
            ));
        }
        let mut names = std::collections::HashSet::new();
        for account in &self.accounts {
            let name = account.name.trim();
            if name.is_empty() {
                return Err(QuestError::Config("account name must not be empty".into()));
            }
            if !names.insert(crate::app_dirs::sanitize_segment(name)) {
                return Err(QuestError::Config(format!(
                    "duplicate account name `{name}`"
                )));
            }
        }
        if self.community.trim().is_empty() {
            return Err(QuestError::Config("community must not be empty".into()));
        }
        if !self.poll_interval_secs.is_finite() || self.poll_interval_secs <= 0.0 {
            return Err(QuestError::Config(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(QuestError::Config(format!(
                "poll_interval_secs must be at most {MAX_POLL_INTERVAL_SECS}"
            )));
        }
        if self.max_workers == 0 {
            return Err(QuestError::Config(
                "max_workers must be greater than 0".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(QuestError::Config(
                "queue_capacity must be greater than 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(QuestError::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.telegram.max_attempts == 0 {
            return Err(QuestError::Config(
                "telegram.max_attempts must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Sleep between board fetches, clamped to `0..=MAX_POLL_INTERVAL_SECS`.
    pub fn poll_interval(&self) -> Duration {
        let secs = if self.poll_interval_secs.is_nan() {
            0.0
        } else {
            self.poll_interval_secs.clamp(0.0, MAX_POLL_INTERVAL_SECS)
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    /// Upstream request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Effective data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(crate::app_dirs::data_dir)
    }
}

/// Scan `ACCOUNT_{i}_NAME` / `ACCOUNT_{i}_COOKIE` for `i` in `1..=20`.
///
/// A slot with neither variable is skipped. A missing name becomes
/// `account_{i}`; a missing cookie becomes empty.
pub fn parse_env_accounts<F>(lookup: &F) -> Vec<AccountConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut accounts = Vec::new();
    for i in 1..=ACCOUNT_ENV_SLOTS {
        let name = lookup(&format!("ACCOUNT_{i}_NAME"))
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());
        let cookie = lookup(&format!("ACCOUNT_{i}_COOKIE"))
            .map(|c| strip_cookie(&c))
            .filter(|c| !c.is_empty());
        if name.is_none() && cookie.is_none() {
            continue;
        }
        accounts.push(AccountConfig {
            name: name.unwrap_or_else(|| format!("account_{i}")),
            cookie: cookie.unwrap_or_default(),
        });
    }
    accounts
}

/// Trim whitespace and one pair of matching surrounding quotes.
pub fn strip_cookie(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_owned();
        }
    }
    trimmed.to_owned()
}
