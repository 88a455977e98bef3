//! Strategy traits implemented by each site.
//!
//! A sign-in site implements [`SignInStrategy`]; the generic state machine
//! that drives it (status check, prerequisite reply, form, challenge,
//! submit) lives with the task layer, which also owns persistence. Each
//! step here performs its own requests and returns the parsed result, so
//! the driver never sees raw HTTP.
//!
//! A gallery platform implements [`GallerySource`]; the paginated crawl in
//! [`crate::crawl`] drives it.

use crate::error::{Result, SiteError};
use crate::http::HttpClient;
use crate::types::{
    Album, ChallengeAnswer, GalleryPlatform, SignForm, SignInSite, SiteStatus, SubmitOutcome,
};
use std::future::Future;

/// A site with a daily sign-in.
///
/// Only [`SignInStrategy::check_status`] and
/// [`SignInStrategy::submit_sign_in`] are mandatory. Sites that require a
/// reply before signing in override [`SignInStrategy::requires_reply`]
/// together with the thread methods; sites with a challenge form override
/// [`SignInStrategy::request_sign_form`] and
/// [`SignInStrategy::fetch_challenge`].
pub trait SignInStrategy: Send + Sync {
    /// Which site this strategy represents.
    fn site(&self) -> SignInSite;

    /// Page the user should open to sign in.
    fn login_url(&self) -> String;

    /// Inspect the status page for "not logged in" and "already signed in
    /// today" markers.
    fn check_status(&self, http: &HttpClient)
        -> impl Future<Output = Result<SiteStatus>> + Send;

    /// Whether the site accepts a sign-in only after a reply.
    fn requires_reply(&self) -> bool {
        false
    }

    /// Fetch the thread listing used to pick a thread to reply to. Ids are
    /// in page order, newest first.
    fn list_threads(&self, _http: &HttpClient) -> impl Future<Output = Result<Vec<String>>> + Send {
        async { Ok(Vec::new()) }
    }

    /// Reply to `thread_id` with `message`, verifying the success marker.
    fn submit_reply(
        &self,
        _http: &HttpClient,
        thread_id: &str,
        _message: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        let thread_id = thread_id.to_owned();
        async move {
            Err(SiteError::Config(format!(
                "site does not support replying (thread {thread_id})"
            )))
        }
    }

    /// Request the dynamic sign form. `None` means the site signs in with a
    /// plain request.
    fn request_sign_form(
        &self,
        _http: &HttpClient,
    ) -> impl Future<Output = Result<Option<SignForm>>> + Send {
        async { Ok(None) }
    }

    /// Fetch and solve the challenge tied to `form`.
    fn fetch_challenge(
        &self,
        _http: &HttpClient,
        form: SignForm,
    ) -> impl Future<Output = Result<ChallengeAnswer>> + Send {
        async move {
            Err(SiteError::Config(format!(
                "site has no challenge for form {}",
                form.form_id
            )))
        }
    }

    /// Submit the sign-in, with the solved challenge when the site has one.
    fn submit_sign_in(
        &self,
        http: &HttpClient,
        answer: Option<ChallengeAnswer>,
    ) -> impl Future<Output = Result<SubmitOutcome>> + Send;
}

/// One timeline entry as seen by the crawler.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    /// Entry id, comparable with [`crate::crawl::compare_ids`].
    pub id: String,
    /// The entry's pictures; `None` when it has none.
    pub album: Option<Album>,
}

/// One fetched page of a timeline, newest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GalleryPage {
    /// Entries in page order.
    pub entries: Vec<GalleryEntry>,
    /// Total entry count reported by the remote, if any.
    pub total: Option<u64>,
}

/// A platform with a paginated, newest-first picture timeline.
pub trait GallerySource: Send + Sync {
    /// Which platform this source represents.
    fn platform(&self) -> GalleryPlatform;

    /// Entries per full page. A shorter page is the last one.
    fn page_size(&self) -> usize;

    /// Fetch one page (1-based) of `owner_id`'s timeline.
    ///
    /// Transient problems must be reported with an error for which
    /// [`SiteError::is_transient`] is true so the crawler retries them.
    fn fetch_page(
        &self,
        http: &HttpClient,
        owner_id: &str,
        page: u32,
    ) -> impl Future<Output = Result<GalleryPage>> + Send;
}
