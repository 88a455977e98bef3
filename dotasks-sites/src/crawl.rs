//! Incremental, newest-first crawl of a gallery timeline.
//!
//! Pages are fetched from page 1 until the crawl reaches an entry at or
//! below the stored cursor, a short page, or the end reported by the
//! remote. Each page gets a bounded number of retries for transient
//! failures. A page that still fails aborts the crawl, so the cursor never
//! skips entries that were not read. The one exception is a page that keeps
//! coming back empty inside the reported timeline: the crawl stops there
//! with what it has and reports [`CrawlStatus::Partial`].
//!
//! The newest entry id seen on page 1 becomes the next cursor, but only if
//! at least one new album was collected; an empty crawl never moves the
//! cursor.

use crate::config::CrawlConfig;
use crate::error::{Result, SiteError};
use crate::http::HttpClient;
use crate::site::{GalleryPage, GallerySource};
use crate::types::Album;
use rand::Rng;
use std::cmp::Ordering;
use std::time::Duration;

/// Order two entry ids.
///
/// All-digit ids are compared numerically (without parsing, so ids longer
/// than `u64` still order correctly); anything else compares as strings.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

/// How a crawl ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlStatus {
    /// Reached the cursor or the end of the timeline.
    Complete,
    /// A page kept coming back empty inside the timeline; albums gathered
    /// before it are kept.
    Partial {
        /// The page that failed.
        page: u32,
        /// Display string of the last error.
        reason: String,
    },
}

/// Result of one crawl.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Id of the newest entry on page 1 if it is newer than the cursor.
    pub newest: Option<String>,
    /// New albums, newest first.
    pub albums: Vec<Album>,
    /// Whether every needed page was read.
    pub status: CrawlStatus,
    /// Pages fetched successfully.
    pub pages: u32,
}

impl CrawlOutcome {
    /// Cursor to persist, if it should move.
    pub fn next_cursor(&self) -> Option<&str> {
        if self.albums.is_empty() {
            return None;
        }
        self.newest.as_deref()
    }

    /// Whether the crawl stopped early.
    pub fn is_partial(&self) -> bool {
        matches!(self.status, CrawlStatus::Partial { .. })
    }
}

/// Crawl `owner_id`'s timeline for entries newer than `last`.
///
/// # Errors
///
/// Returns the page error when any page still fails after its retries,
/// including [`SiteError::NeedsLogin`]. Nothing gathered before the failure
/// is returned. A persistent [`SiteError::EmptyPage`] is the exception and
/// produces a [`CrawlStatus::Partial`] outcome instead.
pub async fn crawl<S: GallerySource>(
    source: &S,
    http: &HttpClient,
    owner_id: &str,
    last: Option<&str>,
    config: &CrawlConfig,
) -> Result<CrawlOutcome> {
    config.validate()?;
    validate_owner_id(owner_id)?;
    let platform = source.platform();
    let page_size = source.page_size();

    let mut outcome = CrawlOutcome {
        newest: None,
        albums: Vec::new(),
        status: CrawlStatus::Complete,
        pages: 0,
    };
    let mut page_no: u32 = 1;

    loop {
        let page = match fetch_with_retry(source, http, owner_id, page_no, config).await {
            Ok(page) => page,
            Err(e @ SiteError::EmptyPage { .. }) => {
                tracing::warn!(%platform, owner_id, page = page_no, "crawl stopped early: {e}");
                outcome.status = CrawlStatus::Partial {
                    page: page_no,
                    reason: e.to_string(),
                };
                break;
            }
            Err(e) => {
                tracing::warn!(%platform, owner_id, page = page_no, "crawl aborted: {e}");
                return Err(e);
            }
        };
        outcome.pages += 1;

        let count = page.entries.len();
        let mut reached_cursor = false;
        for (index, entry) in page.entries.into_iter().enumerate() {
            if last.is_some_and(|last| compare_ids(&entry.id, last) != Ordering::Greater) {
                reached_cursor = true;
                break;
            }
            if page_no == 1 && index == 0 {
                outcome.newest = Some(entry.id.clone());
            }
            if let Some(album) = entry.album {
                outcome.albums.push(album);
            }
        }

        tracing::debug!(
            %platform,
            owner_id,
            page = page_no,
            entries = count,
            albums = outcome.albums.len(),
            "crawled page"
        );

        let past_total = page
            .total
            .is_some_and(|total| u64::from(page_no) * page_size as u64 >= total);
        if reached_cursor || count < page_size || past_total {
            break;
        }

        page_no += 1;
        politeness_delay(config).await;
    }

    tracing::info!(
        %platform,
        owner_id,
        albums = outcome.albums.len(),
        partial = outcome.is_partial(),
        "crawl finished"
    );
    Ok(outcome)
}

async fn fetch_with_retry<S: GallerySource>(
    source: &S,
    http: &HttpClient,
    owner_id: &str,
    page: u32,
    config: &CrawlConfig,
) -> Result<GalleryPage> {
    let mut attempt = 0;
    loop {
        match source.fetch_page(http, owner_id, page).await {
            Ok(fetched) => return Ok(fetched),
            Err(e) if e.is_transient() && attempt < config.max_page_retries => {
                attempt += 1;
                tracing::debug!(owner_id, page, attempt, "retrying page: {e}");
                politeness_delay(config).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn politeness_delay(config: &CrawlConfig) {
    let (min, max) = config.page_delay_ms;
    if max == 0 {
        return;
    }
    let ms = rand::thread_rng().gen_range(min..=max);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Reject an unusable owner id before any request is made.
pub fn validate_owner_id(owner_id: &str) -> Result<()> {
    if owner_id.trim().is_empty() {
        return Err(SiteError::Config("gallery owner id is empty".into()));
    }
    Ok(())
}
