//! HDTime private tracker. Visiting the attendance page signs in.

use crate::error::{Result, SiteError};
use crate::http::HttpClient;
use crate::site::SignInStrategy;
use crate::types::{ChallengeAnswer, SignInSite, SiteStatus, SubmitOutcome};

/// Default site address.
pub const DEFAULT_BASE_URL: &str = "https://hdtime.org";

const SIGNED_MARKER: &str = "签到成功";

#[derive(Debug, Clone)]
pub struct HdTimeSite {
    base_url: String,
}

impl Default for HdTimeSite {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl HdTimeSite {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }
}

impl SignInStrategy for HdTimeSite {
    fn site(&self) -> SignInSite {
        SignInSite::HdTime
    }

    fn login_url(&self) -> String {
        format!("{}/login.php", self.base_url)
    }

    async fn check_status(&self, _http: &HttpClient) -> Result<SiteStatus> {
        Ok(SiteStatus::Pending)
    }

    async fn submit_sign_in(
        &self,
        http: &HttpClient,
        _answer: Option<ChallengeAnswer>,
    ) -> Result<SubmitOutcome> {
        let url = format!("{}/attendance.php", self.base_url);
        let text = http.get(&url).await?.ensure_success().await?.text().await?;
        if text.contains(SIGNED_MARKER) {
            Ok(SubmitOutcome::Accepted(SIGNED_MARKER.to_owned()))
        } else {
            Err(SiteError::Rejected { raw: text })
        }
    }
}
