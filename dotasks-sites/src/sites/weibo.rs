//! Weibo user timelines as a picture gallery.
//!
//! The `ajax/statuses/mymblog` endpoint returns 20 posts per page, newest
//! first, together with the total post count. It is flaky: it sometimes
//! answers with an nginx error page or an empty list in the middle of the
//! timeline, both of which are reported as transient so the crawler
//! retries the page. A visitor-system page means the session cookie is
//! missing or expired.

use crate::error::{Result, SiteError};
use crate::http::HttpClient;
use crate::site::{GalleryEntry, GalleryPage, GallerySource};
use crate::types::{Album, GalleryPlatform};
use chrono::DateTime;
use serde::Deserialize;
use std::collections::HashMap;

/// Default site address.
pub const DEFAULT_BASE_URL: &str = "https://weibo.com";

/// Posts per full page.
pub const PAGE_SIZE: usize = 20;

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Deserialize)]
struct MyBlog {
    data: MyBlogData,
}

#[derive(Debug, Deserialize)]
struct MyBlogData {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    list: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    idstr: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    text_raw: String,
    #[serde(default)]
    pic_ids: Option<Vec<String>>,
    #[serde(default)]
    pic_infos: Option<HashMap<String, PicInfos>>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    retweeted_status: Option<Box<Post>>,
}

#[derive(Debug, Deserialize)]
struct PicInfos {
    #[serde(default)]
    largest: Option<PicInfo>,
    #[serde(default)]
    original: Option<PicInfo>,
}

#[derive(Debug, Deserialize)]
struct PicInfo {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct User {
    id: u64,
    #[serde(default)]
    screen_name: String,
}

/// Weibo timeline source.
#[derive(Debug, Clone)]
pub struct WeiboSource {
    base_url: String,
}

impl Default for WeiboSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl WeiboSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    /// Profile page of `owner_id`.
    pub fn profile_url(&self, owner_id: &str) -> String {
        format!("{}/u/{owner_id}", self.base_url)
    }
}

impl GallerySource for WeiboSource {
    fn platform(&self) -> GalleryPlatform {
        GalleryPlatform::Weibo
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    async fn fetch_page(&self, http: &HttpClient, owner_id: &str, page: u32) -> Result<GalleryPage> {
        let url = format!(
            "{}/ajax/statuses/mymblog?uid={owner_id}&page={page}&feature=0",
            self.base_url
        );
        let text = http.get(&url).await?.ensure_success().await?.text().await?;
        parse_page(&text, owner_id, page, &self.base_url)
    }
}

/// Parse one `mymblog` page into gallery entries.
pub(crate) fn parse_page(text: &str, owner_id: &str, page: u32, login_url: &str) -> Result<GalleryPage> {
    if text.contains("Sina Visitor System") {
        return Err(SiteError::NeedsLogin {
            login_url: login_url.to_owned(),
        });
    }
    if text.contains("400 Bad Request") || text.contains("Internal Server Error") {
        return Err(SiteError::Decode(format!(
            "weibo page {page} of {owner_id}: server error page"
        )));
    }

    let blog: MyBlog = serde_json::from_str(text)
        .map_err(|e| SiteError::Decode(format!("weibo page {page} of {owner_id}: {e}")))?;

    let pages = blog.data.total.div_ceil(PAGE_SIZE as u64);
    if blog.data.list.is_empty() && u64::from(page) < pages {
        return Err(SiteError::EmptyPage {
            owner: owner_id.to_owned(),
            page,
            pages,
        });
    }

    let entries = blog
        .data
        .list
        .into_iter()
        .map(|post| GalleryEntry {
            id: post.idstr.clone(),
            album: into_album(post, owner_id),
        })
        .collect();

    Ok(GalleryPage {
        entries,
        total: Some(blog.data.total),
    })
}

/// Build the album of a post. A repost with pictures of its own original
/// contributes the original's pictures and id.
fn into_album(mut post: Post, owner_id: &str) -> Option<Album> {
    let post = match post.retweeted_status.take() {
        Some(original) if original.pic_ids.is_some() => *original,
        _ => post,
    };

    let pic_ids = post.pic_ids.filter(|ids| !ids.is_empty())?;
    let infos = post.pic_infos.unwrap_or_default();

    let mut urls = Vec::with_capacity(pic_ids.len());
    let mut urls_m = Vec::with_capacity(pic_ids.len());
    for pid in &pic_ids {
        let Some(info) = infos.get(pid) else { continue };
        let Some(largest) = info.largest.as_ref().filter(|p| !p.url.is_empty()) else {
            continue;
        };
        urls.push(largest.url.clone());
        urls_m.push(info.original.as_ref().map(|p| p.url.clone()).unwrap_or_default());
    }
    if urls.is_empty() {
        return None;
    }

    let created = DateTime::parse_from_str(&post.created_at, CREATED_AT_FORMAT)
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|e| {
            tracing::warn!(id = %post.idstr, created_at = %post.created_at, "unparsable post time: {e}");
            0
        });
    let (user_id, name) = post
        .user
        .map(|u| (u.id.to_string(), u.screen_name))
        .unwrap_or_else(|| (owner_id.to_owned(), String::new()));

    Some(Album {
        plat: GalleryPlatform::Weibo.id().to_owned(),
        uid: owner_id.to_owned(),
        name,
        url: format!("https://weibo.com/{user_id}/{}", post.idstr),
        id: post.idstr,
        caption: clean_caption(&post.text_raw),
        created,
        urls,
        urls_m,
    })
}

/// Strip whitespace and zero-width characters.
pub(crate) fn clean_caption(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}'))
        .collect()
}
