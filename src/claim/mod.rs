//! Claim submission.
//!
//! A [`ClaimJob`] describes one task to claim and the proof to send with it.
//! [`submit`] posts it, consumes the registry entry on success, and reports
//! the outcome to the operator.

pub mod pool;

use crate::account::AccountContext;
use crate::classify::Platform;
use serde_json::{Value, json};

pub use pool::{ClaimPool, ClaimReport};

/// Proof sent with a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimValue {
    /// Reaction tasks need no proof.
    TweetReact,
    /// File tasks carry every registered artifact URL.
    Files(Vec<String>),
    /// URL tasks carry a single value.
    Url(String),
}

impl ClaimValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TweetReact => "tweetReact",
            Self::Files(_) => "file",
            Self::Url(_) => "url",
        }
    }
}

/// Registry entry that a successful claim consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedLink {
    pub platform: Platform,
    pub link: String,
}

/// One task to claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimJob {
    pub quest_id: String,
    pub task_id: String,
    pub box_id: Option<String>,
    pub title: String,
    pub value: ClaimValue,
    pub consumed: Option<ConsumedLink>,
}

impl ClaimJob {
    /// JSON body for the claim endpoint.
    pub fn payload(&self) -> Value {
        let value = match &self.value {
            ClaimValue::TweetReact => json!({
                "taskId": self.task_id,
                "type": "tweetReact",
                "tweetUrl": "",
            }),
            ClaimValue::Files(urls) => json!({
                "taskId": self.task_id,
                "type": "file",
                "fileUrls": urls,
            }),
            ClaimValue::Url(url) => json!({
                "taskId": self.task_id,
                "type": "url",
                "value": url,
            }),
        };
        json!({ "taskValues": [value] })
    }
}

/// Result of one claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Success,
    HttpFailure { status: u16, body: String },
    TransportError(String),
}

impl ClaimOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Post `job`, then notify the outcome once.
///
/// On success the consumed registry entry (if any) is removed; a removal
/// failure is logged and does not change the outcome. Failures are never
/// retried here.
pub async fn submit(ctx: &AccountContext, job: &ClaimJob) -> ClaimOutcome {
    let account = ctx.name();
    let frontend = ctx.client.frontend_url(job.box_id.as_deref(), &job.quest_id);

    let outcome = match ctx.client.post_claim(&job.quest_id, &job.payload()).await {
        Ok(response) if response.is_ok() => ClaimOutcome::Success,
        Ok(response) => ClaimOutcome::HttpFailure {
            status: response.status,
            body: crate::error::truncate(&response.body, 500),
        },
        Err(e) => ClaimOutcome::TransportError(e.to_string()),
    };

    let message = match &outcome {
        ClaimOutcome::Success => {
            if let Some(consumed) = &job.consumed {
                match ctx.store.remove(account, consumed.platform, &consumed.link) {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!(
                        account,
                        link = %consumed.link,
                        "registry entry already gone"
                    ),
                    Err(e) => tracing::error!(
                        account,
                        link = %consumed.link,
                        "failed to remove claimed registry entry: {e}"
                    ),
                }
            }
            let msg = format!("✅ [{account}] Claimed: {}", job.title);
            tracing::info!(account, quest_id = %job.quest_id, kind = job.value.kind(), "{msg}");
            msg
        }
        ClaimOutcome::HttpFailure { status, body } => {
            let msg = format!(
                "❌ [{account}] Failed to claim: {} → {status} → {body}\nURL: {frontend}",
                job.title
            );
            tracing::warn!(account, quest_id = %job.quest_id, status, "claim rejected");
            msg
        }
        ClaimOutcome::TransportError(err) => {
            let msg = format!(
                "❌ [{account}] Error claiming {}: {err}\nURL: {frontend}",
                job.title
            );
            tracing::error!(account, quest_id = %job.quest_id, "claim request failed: {err}");
            msg
        }
    };

    ctx.notify(&message).await;
    outcome
}
