//! Core types shared by site strategies: site identifiers, per-run tokens,
//! status snapshots and crawled albums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sites that support a daily sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignInSite {
    /// Discuz forum with reply prerequisite and arithmetic challenge.
    Sht,
    /// Forum with a JSON attendance API.
    Nodeseek,
    /// Private tracker with an attendance page.
    HdTime,
}

impl SignInSite {
    /// All sign-in sites, in startup order.
    pub const ALL: [SignInSite; 3] = [Self::Nodeseek, Self::Sht, Self::HdTime];

    /// Short lowercase identifier used in config and CLI.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Sht => "sht",
            Self::Nodeseek => "nodeseek",
            Self::HdTime => "hdtime",
        }
    }

    /// Bracketed tag used in logs and notification titles.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Sht => "[SHT]",
            Self::Nodeseek => "[Nodeseek]",
            Self::HdTime => "[HDTime]",
        }
    }
}

impl fmt::Display for SignInSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Live-streaming platforms hosting monitored anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorPlatform {
    /// Douyu room API.
    Douyu,
    /// Huya live page.
    Huya,
    /// Bilibili live status API.
    Bili,
    /// Douyin, through a local helper service.
    Douyin,
}

impl AnchorPlatform {
    /// Lowercase identifier, matching the persisted `plat` field.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Douyu => "douyu",
            Self::Huya => "huya",
            Self::Bili => "bili",
            Self::Douyin => "douyin",
        }
    }
}

impl fmt::Display for AnchorPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// App stores hosting monitored apps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppPlatform {
    /// Apple App Store via the iTunes lookup API.
    AppStore,
    /// Google Play (name only, no price lookup).
    PlayStore,
}

impl AppPlatform {
    /// Lowercase identifier, matching the persisted `plat` field.
    pub fn id(&self) -> &'static str {
        match self {
            Self::AppStore => "appstore",
            Self::PlayStore => "playstore",
        }
    }
}

impl fmt::Display for AppPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Platforms with crawlable picture galleries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GalleryPlatform {
    /// Weibo user timelines.
    Weibo,
}

impl GalleryPlatform {
    /// Lowercase identifier, matching the persisted `plat` field.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Weibo => "weibo",
        }
    }
}

impl fmt::Display for GalleryPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Result of inspecting a site's sign-in status page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteStatus {
    /// The session is not signed in.
    NeedsLogin,
    /// Today's sign-in is already recorded.
    AlreadyDone,
    /// Signed in and not yet checked in today.
    Pending,
}

/// Hidden form fields needed to post a reply to a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyToken {
    /// Session-bound form hash.
    pub formhash: String,
    /// Forum id the thread belongs to.
    pub fid: String,
}

/// Dynamic sign-in form returned by the sign button.
///
/// Valid for exactly one submission; never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignForm {
    /// Dynamic form identifier (`signform_<id>`).
    pub form_id: String,
    /// Session-bound form hash.
    pub formhash: String,
    /// Challenge identifier (`secqaa_<id>`).
    pub challenge_id: String,
}

/// A sign form together with its solved challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeAnswer {
    /// The form the answer belongs to.
    pub form: SignForm,
    /// Evaluated arithmetic answer.
    pub answer: i64,
}

/// Remote verdict on a sign-in submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Sign-in recorded; carries the remote's message.
    Accepted(String),
    /// The remote reports today's sign-in was already done.
    AlreadyDone(String),
}

/// Snapshot of an anchor's live status from the latest check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorStatus {
    /// Anchor or room name.
    pub name: String,
    /// Live room page.
    pub live_url: String,
    /// Whether the anchor is live now.
    pub online: bool,
    /// Room title.
    pub title: Option<String>,
    /// Avatar image URL.
    pub avatar: Option<String>,
}

/// Snapshot of an app's store listing from the latest check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppStatus {
    /// App name.
    pub name: String,
    /// Price in the store's currency; `None` when unknown.
    pub price: Option<f64>,
    /// Price formatted by the store, e.g. `"¥1.00"`.
    pub formatted_price: Option<String>,
    /// Numeric store id.
    pub track_id: Option<u64>,
    /// Bundle identifier.
    pub bundle_id: Option<String>,
    /// Version string.
    pub version: Option<String>,
    /// Store page.
    pub view_url: Option<String>,
    /// Icon URL.
    pub icon: Option<String>,
}

impl AppStatus {
    /// Whether the app is currently free.
    pub fn is_free(&self) -> bool {
        self.price.is_some_and(|p| p == 0.0)
    }
}

/// One crawled gallery post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    /// Platform id (e.g. `"weibo"`).
    pub plat: String,
    /// Owner's user id.
    pub uid: String,
    /// Owner's display name.
    pub name: String,
    /// Post id.
    pub id: String,
    /// Post URL.
    pub url: String,
    /// Post text with whitespace and zero-width characters removed.
    pub caption: String,
    /// Creation time, epoch milliseconds.
    pub created: i64,
    /// Largest-resolution picture URLs.
    pub urls: Vec<String>,
    /// Medium-resolution picture URLs.
    pub urls_m: Vec<String>,
}
