//! Telegram Bot API `sendMessage` sink.

use crate::config::TelegramConfig;
use crate::notify::Notifier;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Per-request timeout for the Bot API.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts messages to one chat, retrying with exponential backoff.
pub struct TelegramNotifier {
    endpoint: String,
    chat_id: String,
    max_attempts: u32,
    backoff_base: Duration,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// # Errors
    ///
    /// Fails when the token or chat id is unset, or the client cannot be built.
    pub fn new(config: &TelegramConfig) -> anyhow::Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("telegram bot token is empty"))?;
        let chat_id = config
            .chat_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| anyhow::anyhow!("telegram chat id is empty"))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            endpoint: format!(
                "{}/bot{token}/sendMessage",
                config.api_base.trim_end_matches('/')
            ),
            chat_id: chat_id.to_owned(),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            client,
        })
    }

    async fn send_once(&self, text: &str) -> anyhow::Result<()> {
        let form = [("chat_id", self.chat_id.as_str()), ("text", text)];
        // The endpoint embeds the bot token; keep it out of error text.
        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "telegram send failed ({status}): {}",
                crate::error::truncate(&body, 200)
            );
        }
        Ok(())
    }
}

/// Delay before retry number `attempt` (1-based): base doubled per attempt
/// plus up to half the base of jitter.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    let exp = base.saturating_mul(factor);
    let jitter_cap = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
    let jitter = if jitter_cap == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_cap)
    };
    exp.saturating_add(Duration::from_millis(jitter))
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn id(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, text: &str) -> anyhow::Result<()> {
        let mut attempt = 1;
        loop {
            match self.send_once(text).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt >= self.max_attempts => {
                    return Err(err.context(format!(
                        "telegram delivery failed after {attempt} attempts"
                    )));
                }
                Err(err) => {
                    let delay = backoff_delay(self.backoff_base, attempt);
                    tracing::warn!(
                        attempt,
                        "telegram send failed: {err}; retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// Token is part of the endpoint; keep it out of Debug output.
impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
