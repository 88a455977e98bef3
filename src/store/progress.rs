//! Persisted namespaces and their on-disk shapes.
//!
//! Field names match the JSON layout of existing state files, so values
//! written by earlier versions decode unchanged.

use dotasks_sites::{AnchorPlatform, AppPlatform, GalleryPlatform};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A typed top-level key of the progress store.
pub trait Namespace: Serialize + DeserializeOwned + Default {
    /// Top-level JSON key.
    const KEY: &'static str;
}

fn default_true() -> bool {
    true
}

/// Threads already replied to on SHT (`sht`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepliedThreads {
    #[serde(default)]
    pub ids: Vec<String>,
}

impl RepliedThreads {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    /// Record `id`; returns false when it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id.to_owned());
        true
    }
}

impl Namespace for RepliedThreads {
    const KEY: &'static str = "sht";
}

/// One crawled timeline and its cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryTask {
    pub plat: GalleryPlatform,
    /// Owner id on the platform.
    pub id: String,
    /// Newest post id already crawled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// Gallery crawl tasks (`picTasks`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryTasks {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub list: Vec<GalleryTask>,
}

impl Default for GalleryTasks {
    fn default() -> Self {
        Self {
            enable: true,
            list: Vec::new(),
        }
    }
}

impl GalleryTasks {
    pub fn find_mut(&mut self, plat: GalleryPlatform, id: &str) -> Option<&mut GalleryTask> {
        self.list.iter_mut().find(|t| t.plat == plat && t.id == id)
    }
}

impl Namespace for GalleryTasks {
    const KEY: &'static str = "picTasks";
}

/// A followed live-stream anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorAttention {
    pub plat: AnchorPlatform,
    pub id: String,
    #[serde(default = "default_true")]
    pub enable: bool,
}

impl AnchorAttention {
    /// Key used in [`NotifiedAnchors`].
    pub fn notify_key(&self) -> String {
        format!("{}_{}", self.plat, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorAttentions {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default = "default_true")]
    pub enable_notify: bool,
    #[serde(default)]
    pub list: Vec<AnchorAttention>,
}

impl Default for AnchorAttentions {
    fn default() -> Self {
        Self {
            enable: true,
            enable_notify: true,
            list: Vec::new(),
        }
    }
}

/// A followed app listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppAttention {
    pub plat: AppPlatform,
    /// Numeric store id or package name.
    pub id: String,
    /// Store region, e.g. `CN`.
    #[serde(default = "default_area")]
    pub area: String,
    #[serde(default = "default_true")]
    pub enable: bool,
}

fn default_area() -> String {
    "CN".into()
}

impl AppAttention {
    /// Key used in [`NotifiedApps`].
    pub fn notify_key(&self) -> String {
        format!("{}_{}", self.plat, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppAttentions {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub list: Vec<AppAttention>,
}

impl Default for AppAttentions {
    fn default() -> Self {
        Self {
            enable: true,
            list: Vec::new(),
        }
    }
}

/// Followed anchors and apps (`attentions`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attentions {
    #[serde(default)]
    pub anchors: AnchorAttentions,
    #[serde(default)]
    pub apps: AppAttentions,
}

impl Namespace for Attentions {
    const KEY: &'static str = "attentions";
}

/// `plat_id` keys of anchors already announced for their current session (`anchors_no`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifiedAnchors(pub Vec<String>);

impl Namespace for NotifiedAnchors {
    const KEY: &'static str = "anchors_no";
}

/// `plat_id` keys of apps already announced as free (`apps_no`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifiedApps(pub Vec<String>);

impl Namespace for NotifiedApps {
    const KEY: &'static str = "apps_no";
}

/// Daemon startup time in epoch milliseconds (`sw`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartupRecord {
    #[serde(default)]
    pub startup: i64,
}

impl Namespace for StartupRecord {
    const KEY: &'static str = "sw";
}
