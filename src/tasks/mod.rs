//! Task drivers.
//!
//! Each task reads its progress from the [`ProgressStore`], talks to one or
//! more sites through the shared [`HttpClient`], writes progress back, and
//! reports anything the user should see through the notification sink.
//! Tasks never panic on remote misbehaviour; failures are returned to the
//! caller and, where the user needs to act, notified.

pub mod downloads;
pub mod gallery;
pub mod monitor;
pub mod notices;
pub mod signin;

pub use downloads::{DownloadClient, reset_gallery, reset_replied};
pub use gallery::{GallerySummary, run_gallery};
pub use monitor::{MonitorSummary, apply_observation, monitor_anchors, monitor_apps};
pub use notices::check_notices;
pub use signin::{
    SignInFailure, SignInOutcome, auto_reply, reply_to_next_thread, run_sign_in, select_unreplied,
    sign_in,
};

use crate::config::DoTasksConfig;
use crate::error::Result;
use crate::notify::{Notification, SharedSink};
use crate::store::ProgressStore;
use dotasks_sites::HttpClient;
use dotasks_sites::sites::{HdTimeSite, NodeseekSite, ShtSite, WeiboSource};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a task needs, shared across scheduler ticks.
#[derive(Clone)]
pub struct TaskServices {
    pub config: Arc<DoTasksConfig>,
    pub http: HttpClient,
    pub store: ProgressStore,
    pub sink: SharedSink,
    /// Where crawled album lists are exported.
    pub albums_dir: PathBuf,
}

impl TaskServices {
    /// Build the services described by `config`: the HTTP client with
    /// cookies seeded and the progress store opened at its configured path.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the store cannot be opened.
    pub fn from_config(config: DoTasksConfig, sink: SharedSink) -> Result<Self> {
        let http = config.http_client()?;
        let store = ProgressStore::open(config.state_path())?;
        let albums_dir = config.albums_path();
        Ok(Self {
            config: Arc::new(config),
            http,
            store,
            sink,
            albums_dir,
        })
    }

    pub fn notify(&self, notification: Notification) {
        self.sink.notify(notification);
    }

    pub fn sht(&self) -> ShtSite {
        let sht = &self.config.sites.sht;
        ShtSite::new(self.config.sites.sht_url()).with_forum_id(sht.forum_id)
    }

    pub fn nodeseek(&self) -> NodeseekSite {
        NodeseekSite::new(self.config.sites.nodeseek_url())
    }

    pub fn hdtime(&self) -> HdTimeSite {
        HdTimeSite::new(self.config.sites.hdtime_url())
    }

    pub fn weibo(&self) -> WeiboSource {
        WeiboSource::new(self.config.sites.weibo_url())
    }
}

impl std::fmt::Debug for TaskServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskServices")
            .field("store", &self.store.path())
            .field("albums_dir", &self.albums_dir)
            .finish_non_exhaustive()
    }
}

/// Shorten `s` to at most `max` characters for notification messages.
pub(crate) fn trunc(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}
