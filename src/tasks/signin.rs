//! Daily sign-in state machine and the forum auto-reply.
//!
//! [`run_sign_in`] drives any [`SignInStrategy`] through the same steps:
//! status check, the reply prerequisite when the site has one, sign form,
//! challenge, submit. A reply is recorded in the progress store as soon as
//! the site confirms it, before the sign-in continues, so a later failure
//! never causes the same thread to be replied to twice.

use super::{TaskServices, trunc};
use crate::notify::Notification;
use crate::store::{ProgressStore, RepliedThreads};
use dotasks_sites::{HttpClient, SignInSite, SignInStrategy, SiteError, SiteStatus, SubmitOutcome};

/// Successful end states of a sign-in run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// Signed in on this run; carries the site's message.
    Signed(String),
    /// Today's sign-in was already recorded. Nothing was submitted.
    Skipped,
}

/// Terminal failures of a sign-in or reply run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignInFailure {
    /// The session cookie is missing or expired.
    #[error("login required: {login_url}")]
    NeedsLogin { login_url: String },

    /// Every listed thread has been replied to already.
    #[error("no unreplied thread in the listing")]
    NoUnrepliedThread,

    /// The site did not confirm the reply.
    #[error("reply to thread {thread_id} failed: {detail}")]
    ReplyFailed { thread_id: String, detail: String },

    /// The sign form page lacked a token or action.
    #[error("failed to parse sign form: {0}")]
    FormParseFailed(String),

    /// The challenge question could not be found or evaluated.
    #[error("failed to parse challenge: {0}")]
    ChallengeParseFailed(String),

    /// The challenge used an operator outside `+ - * /`.
    #[error("unknown challenge operator '{0}'")]
    UnknownOperator(String),

    /// The site answered the submit with a rejection.
    #[error("sign-in rejected: {0}")]
    SignInFailed(String),

    /// Transport failure or retryable status after retries.
    #[error("network error: {0}")]
    Network(String),

    /// The progress store could not be read or written.
    #[error("failed to record progress: {0}")]
    Progress(String),
}

/// Protocol step an error came from, used to classify it.
#[derive(Debug, Clone, Copy)]
enum Step {
    Status,
    Listing,
    Reply,
    SignForm,
    Challenge,
    Submit,
}

fn classify(step: Step, err: SiteError, thread_id: Option<&str>) -> SignInFailure {
    if err.is_transient() {
        return SignInFailure::Network(err.to_string());
    }
    match (step, err) {
        (_, SiteError::NeedsLogin { login_url }) => SignInFailure::NeedsLogin { login_url },
        (_, SiteError::UnknownOperator(op)) => SignInFailure::UnknownOperator(op),
        (Step::Listing | Step::Reply, e) => SignInFailure::ReplyFailed {
            thread_id: thread_id.unwrap_or("-").to_owned(),
            detail: e.to_string(),
        },
        (Step::SignForm, e) => SignInFailure::FormParseFailed(e.to_string()),
        (Step::Challenge, e) => SignInFailure::ChallengeParseFailed(e.to_string()),
        (Step::Status | Step::Submit, e) => SignInFailure::SignInFailed(e.to_string()),
    }
}

/// Lowest-index thread in `listing` that is not in `replied`.
pub fn select_unreplied<'a>(listing: &'a [String], replied: &RepliedThreads) -> Option<&'a str> {
    listing
        .iter()
        .map(String::as_str)
        .find(|id| !replied.contains(id))
}

/// Reply to the first thread in the site's listing that has not been
/// replied to yet, and record it. Returns the thread id.
///
/// # Errors
///
/// [`SignInFailure::NoUnrepliedThread`] when every listed thread was
/// already replied to; in that case only the listing was fetched.
pub async fn reply_to_next_thread<S: SignInStrategy>(
    site: &S,
    http: &HttpClient,
    store: &ProgressStore,
    message: &str,
) -> Result<String, SignInFailure> {
    let listing = site
        .list_threads(http)
        .await
        .map_err(|e| classify(Step::Listing, e, None))?;
    let replied = store
        .get_or_default::<RepliedThreads>()
        .map_err(|e| SignInFailure::Progress(e.to_string()))?;
    let thread_id = select_unreplied(&listing, &replied.value)
        .ok_or(SignInFailure::NoUnrepliedThread)?
        .to_owned();

    tracing::info!(site = %site.site(), thread_id, "replying to thread");
    site.submit_reply(http, &thread_id, message)
        .await
        .map_err(|e| classify(Step::Reply, e, Some(&thread_id)))?;

    store
        .update::<RepliedThreads, _>(|r| {
            r.insert(&thread_id);
        })
        .map_err(|e| SignInFailure::Progress(e.to_string()))?;
    Ok(thread_id)
}

/// Run the full sign-in protocol once against `site`.
///
/// # Errors
///
/// Returns the terminal [`SignInFailure`] of the first step that failed.
pub async fn run_sign_in<S: SignInStrategy>(
    site: &S,
    http: &HttpClient,
    store: &ProgressStore,
    reply_message: &str,
) -> Result<SignInOutcome, SignInFailure> {
    let tag = site.site().tag();
    match site
        .check_status(http)
        .await
        .map_err(|e| classify(Step::Status, e, None))?
    {
        SiteStatus::NeedsLogin => {
            return Err(SignInFailure::NeedsLogin {
                login_url: site.login_url(),
            });
        }
        SiteStatus::AlreadyDone => {
            tracing::info!("{tag} already signed in today");
            return Ok(SignInOutcome::Skipped);
        }
        SiteStatus::Pending => {}
    }

    if site.requires_reply() {
        let thread_id = reply_to_next_thread(site, http, store, reply_message).await?;
        tracing::info!(thread_id, "{tag} replied before signing in");
    }

    let form = site
        .request_sign_form(http)
        .await
        .map_err(|e| classify(Step::SignForm, e, None))?;
    let answer = match form {
        Some(form) => Some(
            site.fetch_challenge(http, form)
                .await
                .map_err(|e| classify(Step::Challenge, e, None))?,
        ),
        None => None,
    };

    match site
        .submit_sign_in(http, answer)
        .await
        .map_err(|e| classify(Step::Submit, e, None))?
    {
        SubmitOutcome::Accepted(message) => {
            tracing::info!(message = %message, "{tag} signed in");
            Ok(SignInOutcome::Signed(message))
        }
        SubmitOutcome::AlreadyDone(message) => {
            tracing::info!(message = %message, "{tag} sign-in was already recorded");
            Ok(SignInOutcome::Skipped)
        }
    }
}

/// Sign in to one configured site and report failures. A signed-out
/// session is reported as a login prompt rather than a failure.
pub async fn sign_in(
    services: &TaskServices,
    site: SignInSite,
) -> Result<SignInOutcome, SignInFailure> {
    let reply_message = &services.config.sites.sht.sign_reply_message;
    let result = match site {
        SignInSite::Sht => {
            run_sign_in(&services.sht(), &services.http, &services.store, reply_message).await
        }
        SignInSite::Nodeseek => {
            run_sign_in(&services.nodeseek(), &services.http, &services.store, reply_message).await
        }
        SignInSite::HdTime => {
            run_sign_in(&services.hdtime(), &services.http, &services.store, reply_message).await
        }
    };
    if let Err(failure) = &result {
        report(services, site, "签到失败", failure);
    }
    result
}

/// Half-hourly reply on SHT, outside the sign-in.
///
/// Returns the replied thread id.
pub async fn auto_reply(services: &TaskServices) -> Result<String, SignInFailure> {
    let result = reply_to_next_thread(
        &services.sht(),
        &services.http,
        &services.store,
        &services.config.sites.sht.auto_reply_message,
    )
    .await;
    match &result {
        Ok(thread_id) => tracing::info!(thread_id, "[SHT] auto-reply posted"),
        Err(failure) => report(services, SignInSite::Sht, "回帖失败", failure),
    }
    result
}

fn report(services: &TaskServices, site: SignInSite, what: &str, failure: &SignInFailure) {
    if let SignInFailure::NeedsLogin { login_url } = failure {
        tracing::warn!(site = %site, "{failure}");
        services.notify(
            Notification::new(format!("{} 需要登录", site.tag()), "请在浏览器中登录后重试")
                .with_icon(site.id())
                .with_open(login_url.clone()),
        );
        return;
    }
    tracing::warn!(site = %site, "{what}: {failure}");
    services.notify(
        Notification::new(format!("{} {what}", site.tag()), trunc(&failure.to_string(), 200))
            .with_icon(site.id()),
    );
}
