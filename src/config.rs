//! Configuration for dotasks.
//!
//! Loaded from `config.toml` (see [`crate::dotasks_dirs::config_file`]).
//! Every section has defaults, so an empty file is a valid configuration.
//! Sites without a `cookie` are still attempted and report `NeedsLogin`.

use crate::error::{Result, TaskError};
use dotasks_sites::sites::anchors::AnchorEndpoints;
use dotasks_sites::sites::{apps, hdtime, nodeseek, sht, weibo};
use dotasks_sites::{ClientConfig, CrawlConfig, HttpClient, SignInSite};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DoTasksConfig {
    /// Shared HTTP client settings.
    pub http: ClientConfig,
    /// Per-site sessions and switches.
    pub sites: SitesConfig,
    /// Anchor monitor endpoints.
    pub anchors: AnchorsConfig,
    /// App monitor endpoints.
    pub apps: AppsConfig,
    /// Gallery crawl pacing.
    pub crawl: CrawlConfig,
    /// Album download service.
    pub downloads: DownloadsConfig,
    /// Scheduler timing.
    pub scheduler: SchedulerConfig,
    /// Override for the progress store file.
    pub state_file: Option<PathBuf>,
    /// Override for the crawled album export directory.
    pub albums_dir: Option<PathBuf>,
}

/// Session settings for one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Whether scheduled tasks touch this site.
    pub enabled: bool,
    /// Site address. Falls back to the site's public address when unset.
    pub base_url: Option<String>,
    /// `name=value; name2=value2` cookie string from a signed-in browser.
    pub cookie: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            cookie: None,
        }
    }
}

impl SiteConfig {
    /// Configured address, or `default` when none is set.
    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(default)
    }
}

/// SHT forum settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShtConfig {
    /// Session settings.
    #[serde(flatten)]
    pub site: SiteConfig,
    /// Forum whose listing supplies threads to reply to.
    pub forum_id: u32,
    /// Reply posted before the daily sign-in.
    pub sign_reply_message: String,
    /// Reply posted by the half-hourly auto-reply.
    pub auto_reply_message: String,
}

impl Default for ShtConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            forum_id: sht::DEFAULT_FORUM_ID,
            sign_reply_message: "楼主，感谢分享".into(),
            auto_reply_message: "刷分".into(),
        }
    }
}

/// All site sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitesConfig {
    pub sht: ShtConfig,
    pub nodeseek: SiteConfig,
    pub hdtime: SiteConfig,
    pub weibo: SiteConfig,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            sht: ShtConfig::default(),
            nodeseek: SiteConfig::default(),
            // Opt-in: writing a `[sites.hdtime]` table enables it.
            hdtime: SiteConfig {
                enabled: false,
                ..SiteConfig::default()
            },
            weibo: SiteConfig::default(),
        }
    }
}

impl SitesConfig {
    /// Session settings of a sign-in site.
    pub fn sign_in(&self, site: SignInSite) -> &SiteConfig {
        match site {
            SignInSite::Sht => &self.sht.site,
            SignInSite::Nodeseek => &self.nodeseek,
            SignInSite::HdTime => &self.hdtime,
        }
    }

    pub fn sht_url(&self) -> &str {
        self.sht.site.base_url_or(sht::DEFAULT_BASE_URL)
    }

    pub fn nodeseek_url(&self) -> &str {
        self.nodeseek.base_url_or(nodeseek::DEFAULT_BASE_URL)
    }

    pub fn hdtime_url(&self) -> &str {
        self.hdtime.base_url_or(hdtime::DEFAULT_BASE_URL)
    }

    pub fn weibo_url(&self) -> &str {
        self.weibo.base_url_or(weibo::DEFAULT_BASE_URL)
    }

    /// `(name, settings, resolved base URL)` for every site.
    fn all(&self) -> [(&'static str, &SiteConfig, &str); 4] {
        [
            ("sht", &self.sht.site, self.sht_url()),
            ("nodeseek", &self.nodeseek, self.nodeseek_url()),
            ("hdtime", &self.hdtime, self.hdtime_url()),
            ("weibo", &self.weibo, self.weibo_url()),
        ]
    }
}

/// Anchor monitor settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorsConfig {
    /// Status endpoint base addresses.
    pub endpoints: AnchorEndpoints,
}

/// App monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppsConfig {
    /// iTunes lookup service.
    pub lookup_url: String,
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            lookup_url: apps::DEFAULT_LOOKUP_URL.into(),
        }
    }
}

/// Album download service settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Service address, e.g. `https://pics.example.com`. Albums are only
    /// exported to disk when unset.
    pub addr: Option<String>,
    /// Bearer token for the service.
    pub token: Option<String>,
}

/// Scheduler timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds after startup before the auto-reply may run.
    pub startup_guard_secs: u64,
    /// Seconds between scheduler ticks.
    pub tick_secs: u64,
    /// Run records kept in memory.
    pub history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            startup_guard_secs: 180,
            tick_secs: 60,
            history_limit: 400,
        }
    }
}

impl DoTasksConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| TaskError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TaskError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that would otherwise fail later at request time.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Config`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        self.http.validate()?;
        self.crawl.validate()?;
        for (name, _, base_url) in self.sites.all() {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(TaskError::Config(format!(
                    "sites.{name}.base_url must be an http(s) URL, got '{base_url}'"
                )));
            }
        }
        if let Some(addr) = &self.downloads.addr {
            if self.downloads.token.is_none() {
                return Err(TaskError::Config(format!(
                    "downloads.token is required when downloads.addr is set ({addr})"
                )));
            }
        }
        if self.scheduler.tick_secs == 0 {
            return Err(TaskError::Config("scheduler.tick_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Build the shared HTTP client with every configured site cookie
    /// seeded into its jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or a base URL is invalid.
    pub fn http_client(&self) -> Result<HttpClient> {
        let http = HttpClient::new(&self.http)?;
        for (name, site, base_url) in self.sites.all() {
            if let Some(cookie) = site.cookie.as_deref() {
                http.add_cookies(base_url, cookie)?;
                tracing::debug!(site = name, "session cookie loaded");
            }
        }
        Ok(http)
    }

    /// Progress store location.
    pub fn state_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(crate::dotasks_dirs::state_file)
    }

    /// Album export directory.
    pub fn albums_path(&self) -> PathBuf {
        self.albums_dir
            .clone()
            .unwrap_or_else(crate::dotasks_dirs::albums_dir)
    }
}
