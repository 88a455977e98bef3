//! SHT forum (Discuz with the `dd_sign` plugin).
//!
//! The site only accepts a daily sign-in from accounts that replied to a
//! thread, and the sign form carries a one-time arithmetic question. Every
//! request spoofs `Referer`/`Origin` to the site itself, which the forum
//! checks on AJAX endpoints.

use crate::error::{Result, SiteError};
use crate::extract;
use crate::http::{HttpClient, RequestBody, RequestOptions};
use crate::site::SignInStrategy;
use crate::types::{ChallengeAnswer, ReplyToken, SignForm, SignInSite, SiteStatus, SubmitOutcome};

/// Default site address.
pub const DEFAULT_BASE_URL: &str = "https://www.sehuatang.net";

/// Default forum whose listing supplies threads to reply to.
pub const DEFAULT_FORUM_ID: u32 = 103;

const NOT_LOGGED_IN: &str = "尚未登录";
const SIGNED_TODAY: &str = "今日已签到";
const REPLY_OK: &str = "回复发布成功";
const SIGN_OK: &str = "签到成功";

const REPLY_TOKEN_PATTERN: &str =
    r#"(?s)name="formhash"\s+value="(?P<formhash>[^"]+)".*?name="srhfid"\s+value="(?P<fid>\d+)""#;
const SIGN_FORM_PATTERN: &str = r#"(?s)id="signform_(?P<form_id>[^"]+)".*?name="formhash"\s+value="(?P<formhash>[^"]+)".*?id="secqaa_(?P<challenge_id>[^"]+)""#;
const CHALLENGE_PATTERN: &str = r#"(?s)class="vm".*?'(?P<question>[^'=\n]+?)\s*="#;

/// SHT forum sign-in strategy.
#[derive(Debug, Clone)]
pub struct ShtSite {
    base_url: String,
    forum_id: u32,
}

impl Default for ShtSite {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ShtSite {
    /// Strategy for the forum at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            forum_id: DEFAULT_FORUM_ID,
        }
    }

    /// Use another forum's listing for reply candidates.
    pub fn with_forum_id(mut self, forum_id: u32) -> Self {
        self.forum_id = forum_id;
        self
    }

    /// Site address without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Link to a thread page.
    pub fn thread_url(&self, thread_id: &str) -> String {
        format!("{}/forum.php?mod=viewthread&tid={thread_id}", self.base_url)
    }

    fn options(&self) -> RequestOptions {
        RequestOptions::new()
            .referrer(self.base_url.clone())
            .header("Origin", self.base_url.clone())
    }

    async fn fetch(&self, http: &HttpClient, url: &str, body: Option<RequestBody>) -> Result<String> {
        http.request(url, body, &self.options())
            .await?
            .ensure_success()
            .await?
            .text()
            .await
    }
}

impl SignInStrategy for ShtSite {
    fn site(&self) -> SignInSite {
        SignInSite::Sht
    }

    fn login_url(&self) -> String {
        format!("{}/plugin.php?id=dd_sign:index", self.base_url)
    }

    async fn check_status(&self, http: &HttpClient) -> Result<SiteStatus> {
        let html = self.fetch(http, &self.login_url(), None).await?;
        Ok(parse_status(&html))
    }

    fn requires_reply(&self) -> bool {
        true
    }

    async fn list_threads(&self, http: &HttpClient) -> Result<Vec<String>> {
        let url = format!(
            "{}/forum.php?mod=forumdisplay&fid={}",
            self.base_url, self.forum_id
        );
        let html = self.fetch(http, &url, None).await?;
        let ids = extract::thread_ids(&html)?;
        tracing::debug!(count = ids.len(), forum = self.forum_id, "SHT thread listing parsed");
        Ok(ids)
    }

    async fn submit_reply(&self, http: &HttpClient, thread_id: &str, message: &str) -> Result<()> {
        let page = self.fetch(http, &self.thread_url(thread_id), None).await?;
        let token = parse_reply_token(&page)?;

        // The forum refuses the reply unless its post-rule check ran first.
        let precheck = format!(
            "{}/forum.php?mod=ajax&action=checkpostrule&inajax=yes&ac=reply",
            self.base_url
        );
        self.fetch(http, &precheck, None).await?;

        let url = format!(
            "{}/forum.php?mod=post&action=reply&fid={}&tid={thread_id}&extra=page%3D1&replysubmit=yes&infloat=yes&handlekey=fastpost&inajax=1",
            self.base_url, token.fid
        );
        let body = reply_body(message, chrono::Utc::now().timestamp(), &token);
        let text = self.fetch(http, &url, Some(RequestBody::Form(body))).await?;
        check_marker(&text, REPLY_OK)?;
        tracing::info!(thread_id, "SHT reply posted");
        Ok(())
    }

    async fn request_sign_form(&self, http: &HttpClient) -> Result<Option<SignForm>> {
        let url = format!(
            "{}/plugin.php?id=dd_sign&mod=sign&infloat=yes&handlekey=pc_click_ddsign&inajax=1&ajaxtarget=fwin_content_pc_click_ddsign",
            self.base_url
        );
        let text = self.fetch(http, &url, Some(RequestBody::EmptyMultipart)).await?;
        parse_sign_form(&text).map(Some)
    }

    async fn fetch_challenge(&self, http: &HttpClient, form: SignForm) -> Result<ChallengeAnswer> {
        let url = format!(
            "{}/misc.php?mod=secqaa&action=update&idhash={}&{}",
            self.base_url,
            form.challenge_id,
            rand::random::<f64>()
        );
        let text = self.fetch(http, &url, None).await?;
        let question = parse_challenge(&text)?;
        let answer = extract::evaluate(&question)?;
        tracing::debug!(question, answer, "SHT challenge solved");
        Ok(ChallengeAnswer { form, answer })
    }

    async fn submit_sign_in(
        &self,
        http: &HttpClient,
        answer: Option<ChallengeAnswer>,
    ) -> Result<SubmitOutcome> {
        let Some(ChallengeAnswer { form, answer }) = answer else {
            return Err(SiteError::Config("SHT sign-in needs a solved challenge".into()));
        };
        let url = format!(
            "{}/plugin.php?id=dd_sign&mod=sign&signsubmit=yes&handlekey=pc_click_ddsign&signhash={}&inajax=1",
            self.base_url, form.form_id
        );
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("formhash", &form.formhash)
            .append_pair("signtoken", "")
            .append_pair("secqaahash", &form.challenge_id)
            .append_pair("secanswer", &answer.to_string())
            .finish();
        let text = self.fetch(http, &url, Some(RequestBody::Form(body))).await?;
        check_marker(&text, SIGN_OK)?;
        Ok(SubmitOutcome::Accepted(SIGN_OK.to_owned()))
    }
}

/// Classify the sign-in index page.
pub(crate) fn parse_status(html: &str) -> SiteStatus {
    if html.contains(NOT_LOGGED_IN) {
        SiteStatus::NeedsLogin
    } else if html.contains(SIGNED_TODAY) {
        SiteStatus::AlreadyDone
    } else {
        SiteStatus::Pending
    }
}

/// Extract the reply form hash and forum id from a thread page.
pub(crate) fn parse_reply_token(html: &str) -> Result<ReplyToken> {
    let groups = extract::require(REPLY_TOKEN_PATTERN, html, "reply formhash and fid")?;
    Ok(ReplyToken {
        formhash: groups["formhash"].clone(),
        fid: groups["fid"].clone(),
    })
}

/// Extract the dynamic sign form fields from the sign button response.
pub(crate) fn parse_sign_form(text: &str) -> Result<SignForm> {
    let groups = extract::require(SIGN_FORM_PATTERN, text, "sign form")?;
    Ok(SignForm {
        form_id: groups["form_id"].clone(),
        formhash: groups["formhash"].clone(),
        challenge_id: groups["challenge_id"].clone(),
    })
}

/// Extract the arithmetic question, e.g. `"12 + 7"`, from the challenge
/// response.
pub(crate) fn parse_challenge(text: &str) -> Result<String> {
    let groups = extract::require(CHALLENGE_PATTERN, text, "challenge question")?;
    Ok(groups["question"].trim().to_owned())
}

fn reply_body(message: &str, posttime: i64, token: &ReplyToken) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("file", "")
        .append_pair("message", message)
        .append_pair("posttime", &posttime.to_string())
        .append_pair("formhash", &token.formhash)
        .append_pair("usesig", "")
        .append_pair("subject", "  ")
        .finish()
}

fn check_marker(text: &str, marker: &str) -> Result<()> {
    if text.contains(marker) {
        Ok(())
    } else {
        Err(SiteError::Rejected {
            raw: text.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREAD_PAGE: &str = r#"<form method="post" id="fastpostform">
<input type="hidden" name="formhash" value="f00dbabe" />
<input type="hidden" name="usesig" value="" />
</form>
<form id="scbar_form"><input type="hidden" name="srhfid"
    value="103" /></form>"#;

    const SIGN_FORM_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<root><![CDATA[<form method="post" autocomplete="off" id="signform_7c1a9e" action="plugin.php">
<input type="hidden" name="formhash" value="f00dbabe">
<span id="secqaa_qS0Ab1"></span>
</form>]]></root>"#;

    const CHALLENGE_JS: &str = r#"if($('secqaa_qS0Ab1')) {
	var sectplcode = sectpl != '' ? sectpl.split('<sec>') : Array('<br />',': ','<br />','');
	var string = '<input name="secqaahash" type="hidden" value="qS0Ab1" />' + sectplcode[0] + '验证问答' + sectplcode[1] + '<input name="secanswer" id="secqaaverify_qS0Ab1" type="text" class="txt px vm" />' +
		'<span id="checksecqaaverify_qS0Ab1"><img src="static/image/common/none.gif" width="16" height="16" class="vm" /></span>' +
		sectplcode[2] + '44 - 19 = ?' + sectplcode[3];
	evalscript(string);
}"#;

    #[test]
    fn status_not_logged_in() {
        assert_eq!(parse_status("<div>您尚未登录，请先登录</div>"), SiteStatus::NeedsLogin);
    }

    #[test]
    fn status_already_signed() {
        assert_eq!(parse_status("<a>今日已签到</a>"), SiteStatus::AlreadyDone);
    }

    #[test]
    fn status_pending() {
        assert_eq!(parse_status("<a>签到</a>"), SiteStatus::Pending);
    }

    #[test]
    fn reply_token_across_lines() {
        let token = parse_reply_token(THREAD_PAGE).expect("token");
        assert_eq!(token.formhash, "f00dbabe");
        assert_eq!(token.fid, "103");
    }

    #[test]
    fn reply_token_missing_is_extraction_error() {
        let err = parse_reply_token("<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, SiteError::Extraction { .. }));
    }

    #[test]
    fn sign_form_fields() {
        let form = parse_sign_form(SIGN_FORM_XML).expect("form");
        assert_eq!(form.form_id, "7c1a9e");
        assert_eq!(form.formhash, "f00dbabe");
        assert_eq!(form.challenge_id, "qS0Ab1");
    }

    #[test]
    fn sign_form_missing_challenge_is_error() {
        let text = r#"<form id="signform_x"><input name="formhash" value="y"></form>"#;
        assert!(parse_sign_form(text).is_err());
    }

    #[test]
    fn challenge_question_extracted_and_solvable() {
        let question = parse_challenge(CHALLENGE_JS).expect("question");
        assert_eq!(question, "44 - 19");
        assert_eq!(extract::evaluate(&question).expect("answer"), 25);
    }

    #[test]
    fn reply_body_encodes_message() {
        let token = ReplyToken {
            formhash: "abc".into(),
            fid: "103".into(),
        };
        let body = reply_body("thanks a lot", 1_700_000_000, &token);
        assert_eq!(
            body,
            "file=&message=thanks+a+lot&posttime=1700000000&formhash=abc&usesig=&subject=++"
        );
    }

    #[test]
    fn marker_mismatch_keeps_raw_text() {
        let err = check_marker("抱歉，您的请求来路不正确", REPLY_OK).unwrap_err();
        match err {
            SiteError::Rejected { raw } => assert!(raw.contains("来路不正确")),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let site = ShtSite::new("https://forum.example/");
        assert_eq!(site.base_url(), "https://forum.example");
        assert_eq!(
            site.thread_url("42"),
            "https://forum.example/forum.php?mod=viewthread&tid=42"
        );
    }
}
