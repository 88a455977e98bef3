//! Gallery crawl run over every configured timeline.
//!
//! Each task is crawled from its cursor. New albums from all tasks are
//! exported to one JSON file, handed to the download service when one is
//! configured, and only then are the cursors advanced. A platform that
//! turns out to need a login is skipped for the rest of the run.

use super::TaskServices;
use super::downloads::DownloadClient;
use crate::error::{Result, TaskError};
use crate::notify::Notification;
use crate::store::{GalleryTask, GalleryTasks};
use dotasks_sites::{Album, CrawlOutcome, GalleryPlatform, SiteError, compare_ids, crawl};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What one gallery run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GallerySummary {
    /// Tasks crawled, successfully or partially.
    pub crawled: usize,
    /// Tasks whose crawl failed.
    pub failed: usize,
    /// Tasks skipped because their platform failed earlier in the run.
    pub skipped: usize,
    /// New albums across all tasks.
    pub albums: usize,
    /// Export file, when there were new albums.
    pub export: Option<PathBuf>,
    /// Whether the download service accepted the albums.
    pub submitted: bool,
    /// Cursors advanced.
    pub cursors_moved: usize,
}

async fn crawl_task(services: &TaskServices, task: &GalleryTask) -> dotasks_sites::Result<CrawlOutcome> {
    match task.plat {
        GalleryPlatform::Weibo => {
            crawl(
                &services.weibo(),
                &services.http,
                &task.id,
                task.last.as_deref(),
                &services.config.crawl,
            )
            .await
        }
    }
}

fn profile_url(services: &TaskServices, task: &GalleryTask) -> String {
    match task.plat {
        GalleryPlatform::Weibo => services.weibo().profile_url(&task.id),
    }
}

/// Crawl every gallery task once.
///
/// # Errors
///
/// Store and export failures are returned; cursors are left untouched in
/// that case. Per-task crawl failures are notified and counted.
pub async fn run_gallery(services: &TaskServices) -> Result<GallerySummary> {
    let tasks = services.store.get_or_default::<GalleryTasks>()?.value;
    let mut summary = GallerySummary::default();
    if !tasks.enable || tasks.list.is_empty() {
        tracing::info!("no gallery tasks to run");
        return Ok(summary);
    }

    let mut failed_plats: HashSet<GalleryPlatform> = HashSet::new();
    let mut cursors: Vec<(GalleryPlatform, String, String)> = Vec::new();
    let mut albums: Vec<Album> = Vec::new();

    for task in &tasks.list {
        let tag = format!("[{}][{}]", task.plat, task.id);
        if failed_plats.contains(&task.plat) {
            tracing::info!("{tag} skipped, platform failed earlier in this run");
            summary.skipped += 1;
            continue;
        }

        let outcome = match crawl_task(services, task).await {
            Ok(outcome) => outcome,
            Err(e) => {
                summary.failed += 1;
                tracing::warn!("{tag} crawl failed: {e}");
                let open = match &e {
                    SiteError::NeedsLogin { login_url } => {
                        failed_plats.insert(task.plat);
                        login_url.clone()
                    }
                    _ => profile_url(services, task),
                };
                services.notify(
                    Notification::new(format!("[{}] 获取图集失败", task.plat), format!("{}: {e}", task.id))
                        .with_icon(task.plat.id())
                        .with_open(open),
                );
                continue;
            }
        };
        summary.crawled += 1;

        if let dotasks_sites::CrawlStatus::Partial { page, reason } = &outcome.status {
            services.notify(
                Notification::new(
                    format!("[{}] 图集获取不完整", task.plat),
                    format!("{}: 第 {page} 页失败：{reason}", task.id),
                )
                .with_icon(task.plat.id()),
            );
        }

        match outcome.next_cursor() {
            Some(cursor) => {
                tracing::info!(albums = outcome.albums.len(), pages = outcome.pages, "{tag} crawled");
                cursors.push((task.plat, task.id.clone(), cursor.to_owned()));
            }
            None => tracing::info!("{tag} no new albums"),
        }
        albums.extend(outcome.albums);
    }

    summary.albums = albums.len();
    if albums.is_empty() {
        tracing::info!("gallery run found no new albums");
        return Ok(summary);
    }

    let export = export_albums(&services.albums_dir, &albums)?;
    tracing::info!(path = %export.display(), albums = albums.len(), "albums exported");
    summary.export = Some(export);

    let timeout = Duration::from_secs(services.config.http.timeout_seconds);
    match DownloadClient::from_config(&services.config.downloads, timeout) {
        Ok(Some(client)) => match client.submit(&albums).await {
            Ok(()) => summary.submitted = true,
            Err(e) => {
                tracing::warn!("download request failed: {e}");
                services.notify(
                    Notification::new("[图集] 发送下载请求失败", e.to_string()).with_icon("gallery"),
                );
            }
        },
        Ok(None) => tracing::debug!("no download service configured"),
        Err(e) => tracing::warn!("download service misconfigured: {e}"),
    }

    summary.cursors_moved = advance_cursors(services, &cursors)?;
    Ok(summary)
}

/// Store new cursors. A cursor only ever moves forward.
fn advance_cursors(
    services: &TaskServices,
    cursors: &[(GalleryPlatform, String, String)],
) -> Result<usize> {
    let mut moved = 0;
    services.store.update::<GalleryTasks, _>(|tasks| {
        moved = 0;
        for (plat, id, cursor) in cursors {
            let Some(task) = tasks.find_mut(*plat, id) else {
                tracing::warn!("[{plat}][{id}] task removed during crawl, cursor dropped");
                continue;
            };
            let newer = task
                .last
                .as_deref()
                .is_none_or(|last| compare_ids(cursor, last) == Ordering::Greater);
            if newer {
                task.last = Some(cursor.clone());
                moved += 1;
            }
        }
    })?;
    Ok(moved)
}

/// Write albums to `<dir>/pics_tasks_<epoch ms>.json`.
fn export_albums(dir: &Path, albums: &[Album]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "pics_tasks_{}.json",
        chrono::Utc::now().timestamp_millis()
    ));
    let json = serde_json::to_vec_pretty(albums)
        .map_err(|e| TaskError::Store(format!("failed to serialize albums: {e}")))?;
    std::fs::write(&path, json)?;
    Ok(path)
}
