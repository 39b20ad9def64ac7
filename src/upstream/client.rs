//! Per-account quest-board HTTP client.
//!
//! Each account gets its own [`reqwest::Client`] with the session cookie and
//! browser-like headers baked into the default header map, so every request
//! made through it is authenticated the same way the web frontend is.

use crate::config::ApiConfig;
use crate::error::{QuestError, Result};
use crate::upstream::types::{QuestBox, QuestDetail};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Default browser User-Agent sent to the quest board.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

/// Board status filters requested on every poll.
pub const BOARD_FILTERS: &[&str] = &["locked", "available", "inCooldown", "inReview"];

/// Status and body of a claim POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimResponse {
    pub status: u16,
    pub body: String,
}

impl ClaimResponse {
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }
}

/// Authenticated client for one account on one community.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    api_base: String,
    frontend_base: String,
    community: String,
}

impl UpstreamClient {
    /// Build a client for `community` authenticated with `cookie`.
    ///
    /// An empty cookie is allowed; the board will usually answer 401 and the
    /// monitor keeps polling.
    ///
    /// # Errors
    ///
    /// Returns [`QuestError::Config`] if the cookie or community contain bytes
    /// that are not valid in an HTTP header, and [`QuestError::Http`] if the
    /// client cannot be constructed.
    pub fn new(api: &ApiConfig, community: &str, cookie: &str, timeout: Duration) -> Result<Self> {
        let headers = default_headers(api, community, cookie)?;
        let ua = api
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(ua)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| QuestError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: api.base_url.trim_end_matches('/').to_owned(),
            frontend_base: api.frontend_url.trim_end_matches('/').to_owned(),
            community: community.to_owned(),
        })
    }

    pub fn community(&self) -> &str {
        &self.community
    }

    fn community_url(&self, tail: &str) -> String {
        format!(
            "{}/communities/{}/{tail}",
            self.api_base, self.community
        )
    }

    /// Human-facing quest page, included in notifications.
    pub fn frontend_url(&self, box_id: Option<&str>, quest_id: &str) -> String {
        match box_id {
            Some(box_id) => format!(
                "{}/cw/{}/questboard/{box_id}/{quest_id}",
                self.frontend_base, self.community
            ),
            None => format!(
                "{}/cw/{}/questboard/{quest_id}",
                self.frontend_base, self.community
            ),
        }
    }

    /// Fetch the quest board.
    ///
    /// # Errors
    ///
    /// [`QuestError::Status`] on any status other than 200, [`QuestError::Http`]
    /// on transport failure, [`QuestError::Parse`] on a malformed body.
    pub async fn fetch_board(&self) -> Result<Vec<QuestBox>> {
        let url = self.community_url("questboard/v2");
        let query: Vec<(&str, &str)> = BOARD_FILTERS.iter().map(|f| ("filters", *f)).collect();
        let response = self.http.get(&url).query(&query).send().await?;
        let body = read_ok_body(response).await?;
        tracing::trace!(body = %crate::error::truncate(&body, 200), "questboard response");
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch the full detail (description and tasks) of one quest.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch_board`].
    pub async fn fetch_detail(&self, quest_id: &str) -> Result<QuestDetail> {
        let url = self.community_url(&format!("quests/v2/{quest_id}"));
        let response = self.http.get(&url).send().await?;
        let body = read_ok_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST a claim body for `quest_id` and return the raw status and body.
    ///
    /// Non-200 statuses are not errors here; the caller decides.
    ///
    /// # Errors
    ///
    /// Returns [`QuestError::Http`] on transport failure or timeout.
    pub async fn post_claim(
        &self,
        quest_id: &str,
        body: &serde_json::Value,
    ) -> Result<ClaimResponse> {
        let url = self.community_url(&format!("quests/v2/{quest_id}/claim"));
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(ClaimResponse { status, body })
    }
}

async fn read_ok_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(QuestError::status(status.as_u16(), &body));
    }
    Ok(response.text().await?)
}

fn default_headers(api: &ApiConfig, community: &str, cookie: &str) -> Result<HeaderMap> {
    let frontend = api.frontend_url.trim_end_matches('/');
    let mut headers = HeaderMap::new();

    let pairs: [(HeaderName, String); 10] = [
        (header::ACCEPT, "application/json".to_owned()),
        (header::ACCEPT_LANGUAGE, "en-US,en;q=0.9".to_owned()),
        (header::ORIGIN, frontend.to_owned()),
        (header::REFERER, format!("{frontend}/cw/{community}/questboard")),
        (HeaderName::from_static("x-zealy-subdomain"), community.to_owned()),
        (HeaderName::from_static("sec-fetch-site"), "same-site".to_owned()),
        (HeaderName::from_static("sec-fetch-mode"), "cors".to_owned()),
        (HeaderName::from_static("sec-fetch-dest"), "empty".to_owned()),
        (HeaderName::from_static("sec-ch-ua-mobile"), "?0".to_owned()),
        (HeaderName::from_static("sec-ch-ua-platform"), "\"macOS\"".to_owned()),
    ];
    for (name, value) in pairs {
        let value = HeaderValue::from_str(&value)
            .map_err(|_| QuestError::Config(format!("invalid value for header {}", name.as_str())))?;
        headers.insert(name, value);
    }

    if !cookie.is_empty() {
        let mut value = HeaderValue::from_str(cookie)
            .map_err(|_| QuestError::Config("cookie contains invalid header bytes".into()))?;
        value.set_sensitive(true);
        headers.insert(header::COOKIE, value);
    }
    Ok(headers)
}
