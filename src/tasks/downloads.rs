//! Album download service client and progress resets.
//!
//! The service accepts crawled albums as a JSON array and downloads them on
//! its side. Every endpoint answers `{"code": 0}` on success and
//! `{"code": <n>, "msg": "..."}` otherwise.

use crate::config::DownloadsConfig;
use crate::error::{Result, TaskError};
use crate::store::{GalleryTasks, ProgressStore, RepliedThreads};
use dotasks_sites::Album;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ServiceReply {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
}

/// Client for the album download service.
#[derive(Debug, Clone)]
pub struct DownloadClient {
    addr: String,
    token: String,
    client: reqwest::Client,
}

impl DownloadClient {
    pub fn new(addr: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TaskError::Download(format!("failed to build client: {e}")))?;
        Ok(Self {
            addr: addr.into().trim_end_matches('/').to_owned(),
            token: token.into(),
            client,
        })
    }

    /// Client for the configured service; `None` when no address is set.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Config`] when an address is set without a token.
    pub fn from_config(config: &DownloadsConfig, timeout: Duration) -> Result<Option<Self>> {
        let Some(addr) = config.addr.as_deref().filter(|a| !a.trim().is_empty()) else {
            return Ok(None);
        };
        let token = config
            .token
            .as_deref()
            .ok_or_else(|| TaskError::Config("downloads.token is not set".into()))?;
        Self::new(addr, token, timeout).map(Some)
    }

    /// Queue albums for download.
    pub async fn submit(&self, albums: &[Album]) -> Result<()> {
        self.post("/api/pics/dl", albums).await?;
        tracing::info!(count = albums.len(), "albums sent to download service");
        Ok(())
    }

    /// Retry albums the service failed to download earlier.
    pub async fn retry_failed(&self) -> Result<()> {
        self.post("/api/pics/dl/retry", &[]).await?;
        tracing::info!("download service retrying failed albums");
        Ok(())
    }

    /// Drop the service's record of failed albums.
    pub async fn clear_failed(&self) -> Result<()> {
        self.post("/api/pics/dl/clearfail", &[]).await?;
        tracing::info!("download service cleared failed albums");
        Ok(())
    }

    async fn post(&self, endpoint: &str, albums: &[Album]) -> Result<()> {
        let url = format!("{}{endpoint}", self.addr);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(albums)
            .send()
            .await
            .map_err(|e| TaskError::Download(format!("{endpoint}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TaskError::Download(format!("{endpoint} returned {status}: {body}")));
        }
        let reply: ServiceReply = response
            .json()
            .await
            .map_err(|e| TaskError::Download(format!("{endpoint}: invalid reply: {e}")))?;
        if reply.code != 0 {
            return Err(TaskError::Download(format!(
                "{endpoint}: code {}: {}",
                reply.code,
                reply.msg.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

/// Clear every gallery cursor so the next crawl starts from the newest post
/// and re-fetches full timelines. Returns the number of tasks reset.
pub fn reset_gallery(store: &ProgressStore) -> Result<usize> {
    let tasks = store.update::<GalleryTasks, _>(|tasks| {
        for task in &mut tasks.list {
            task.last = None;
        }
    })?;
    tracing::info!(tasks = tasks.list.len(), "gallery cursors reset");
    Ok(tasks.list.len())
}

/// Forget every replied thread. Returns how many were forgotten.
pub fn reset_replied(store: &ProgressStore) -> Result<usize> {
    let before = store.get_or_default::<RepliedThreads>()?.value.ids.len();
    store.set(&RepliedThreads::default())?;
    tracing::info!(threads = before, "replied threads reset");
    Ok(before)
}
