//! Nodeseek forum: JSON attendance API and unread-notification counter.

use crate::error::{Result, SiteError};
use crate::http::{HttpClient, RequestBody, RequestOptions};
use crate::site::SignInStrategy;
use crate::types::{ChallengeAnswer, SignInSite, SiteStatus, SubmitOutcome};
use serde::Deserialize;

/// Default site address.
pub const DEFAULT_BASE_URL: &str = "https://www.nodeseek.com";

/// The API answers a second attendance on the same day with this message.
const REPEATED: &str = "请勿重复操作";

/// Attendance API response. On failure only `message` is populated.
#[derive(Debug, Clone, Deserialize)]
pub struct SignResponse {
    /// Whether the attendance was recorded.
    pub success: bool,
    /// Human-readable result, e.g. today's reward.
    #[serde(default)]
    pub message: String,
    /// Reward gained today.
    #[serde(default)]
    pub gain: Option<i64>,
    /// Balance after today's reward.
    #[serde(default)]
    pub current: Option<i64>,
}

/// Unread notification counters.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    /// Total unread.
    pub all: u64,
    /// Unread private messages.
    #[serde(default)]
    pub message: u64,
    /// Unread mentions.
    #[serde(default)]
    pub at_me: u64,
    /// Unread replies.
    #[serde(default)]
    pub reply: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyResponse {
    success: bool,
    #[serde(default)]
    unread_count: Option<UnreadCount>,
    #[serde(default)]
    message: Option<String>,
}

/// Nodeseek sign-in strategy and notification checker.
#[derive(Debug, Clone)]
pub struct NodeseekSite {
    base_url: String,
}

impl Default for NodeseekSite {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl NodeseekSite {
    /// Strategy for the site at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    /// Fetch unread notification counters.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Api`] when the API reports failure (typically a
    /// signed-out session).
    pub async fn unread_count(&self, http: &HttpClient) -> Result<UnreadCount> {
        let url = format!("{}/api/notification/unread-count", self.base_url);
        let resp: NotifyResponse = http.get(&url).await?.ensure_success().await?.json().await?;
        if !resp.success {
            return Err(SiteError::Api(
                resp.message
                    .unwrap_or_else(|| "unread-count request failed".to_owned()),
            ));
        }
        Ok(resp.unread_count.unwrap_or_default())
    }

    /// Notification page, opened at the most specific tab with unread items.
    pub fn notification_url(&self, unread: &UnreadCount) -> String {
        let hash = if unread.at_me > 0 {
            "/atMe"
        } else if unread.reply > 0 {
            "/reply"
        } else {
            "/message?mode=list"
        };
        format!("{}/notification#{hash}", self.base_url)
    }
}

impl SignInStrategy for NodeseekSite {
    fn site(&self) -> SignInSite {
        SignInSite::Nodeseek
    }

    fn login_url(&self) -> String {
        format!("{}/signIn.html", self.base_url)
    }

    /// The site has no status page; a repeated attendance is detected from
    /// the submit response instead.
    async fn check_status(&self, _http: &HttpClient) -> Result<SiteStatus> {
        Ok(SiteStatus::Pending)
    }

    async fn submit_sign_in(
        &self,
        http: &HttpClient,
        _answer: Option<ChallengeAnswer>,
    ) -> Result<SubmitOutcome> {
        let url = format!("{}/api/attendance?random=true", self.base_url);
        let options = RequestOptions::new().referrer(format!("{}/board", self.base_url));
        let resp: SignResponse = http
            .request(&url, Some(RequestBody::Form(String::new())), &options)
            .await?
            .json()
            .await?;
        classify_sign_response(resp)
    }
}

pub(crate) fn classify_sign_response(resp: SignResponse) -> Result<SubmitOutcome> {
    if resp.success {
        return Ok(SubmitOutcome::Accepted(resp.message));
    }
    if resp.message.contains(REPEATED) {
        return Ok(SubmitOutcome::AlreadyDone(resp.message));
    }
    Err(SiteError::Rejected { raw: resp.message })
}
