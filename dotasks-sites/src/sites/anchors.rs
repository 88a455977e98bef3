//! Live status of anchors on the supported streaming platforms.
//!
//! Each platform is checked differently:
//!
//! | Platform | Source |
//! |----------|--------|
//! | douyu    | open room API (JSON, or the bare string `"Not Found"`) |
//! | huya     | live page; `<body>` class carries `liveStatus-on` |
//! | bili     | `get_status_info_by_uids`, POST JSON, no cookies |
//! | douyin   | local helper service (the web page cannot be fetched directly) |
//!
//! An anchor the platform does not know is reported offline with a
//! placeholder name rather than as an error, so the monitor keeps going.

use crate::error::{Result, SiteError};
use crate::http::{HttpClient, RequestBody, RequestOptions};
use crate::types::{AnchorPlatform, AnchorStatus};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Display name used for anchors the platform does not know.
pub const MISSING_ANCHOR: &str = "不存在主播";

/// Base addresses of the status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorEndpoints {
    /// Douyu open API.
    pub douyu_api: String,
    /// Huya web site.
    pub huya: String,
    /// Bilibili live API.
    pub bili_api: String,
    /// Local helper service resolving douyin live status.
    pub douyin_helper: String,
}

impl Default for AnchorEndpoints {
    fn default() -> Self {
        Self {
            douyu_api: "https://open.douyucdn.cn".into(),
            huya: "https://www.huya.com".into(),
            bili_api: "https://api.live.bilibili.com".into(),
            douyin_helper: "http://127.0.0.1:8800".into(),
        }
    }
}

/// Check one anchor's live status.
///
/// # Errors
///
/// Network and decoding failures are returned; the caller isolates them per
/// anchor.
pub async fn check_anchor(
    http: &HttpClient,
    endpoints: &AnchorEndpoints,
    platform: AnchorPlatform,
    id: &str,
) -> Result<AnchorStatus> {
    tracing::debug!(%platform, id, "checking anchor");
    match platform {
        AnchorPlatform::Douyu => {
            let url = format!(
                "{}/api/RoomApi/room/{id}",
                endpoints.douyu_api.trim_end_matches('/')
            );
            let body: Value = http.get(&url).await?.json().await?;
            parse_douyu(&body, id)
        }
        AnchorPlatform::Huya => {
            let url = format!("{}/{id}", endpoints.huya.trim_end_matches('/'));
            let html = http.get(&url).await?.ensure_success().await?.text().await?;
            parse_huya(&html, id)
        }
        AnchorPlatform::Bili => {
            let url = format!(
                "{}/room/v1/Room/get_status_info_by_uids",
                endpoints.bili_api.trim_end_matches('/')
            );
            // The API wants numeric uids.
            let uid = id.parse::<u64>().map_or_else(|_| Value::from(id), Value::from);
            let payload = serde_json::json!({ "uids": [uid] });
            let body: Value = http
                .request(
                    &url,
                    Some(RequestBody::Json(payload)),
                    &RequestOptions::new().omit_credentials(),
                )
                .await?
                .ensure_success()
                .await?
                .json()
                .await?;
            parse_bili(&body, id)
        }
        AnchorPlatform::Douyin => {
            let url = format!(
                "{}/api/lives/douyin/live?sec_uid={id}",
                endpoints.douyin_helper.trim_end_matches('/')
            );
            let body: DouyinResponse = http.get(&url).await?.ensure_success().await?.json().await?;
            Ok(douyin_status(body, id))
        }
    }
}

fn missing(platform: AnchorPlatform, id: &str, live_url: String) -> AnchorStatus {
    AnchorStatus {
        name: MISSING_ANCHOR.to_owned(),
        live_url,
        online: false,
        title: Some(format!("{platform} {id}")),
        avatar: None,
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// `room_status` is `"1"` while live and `"2"` while offline.
pub(crate) fn parse_douyu(body: &Value, id: &str) -> Result<AnchorStatus> {
    let live_url = format!("https://www.douyu.com/{id}");
    if body.as_str() == Some("Not Found") {
        return Ok(missing(AnchorPlatform::Douyu, id, live_url));
    }
    match body.get("error").and_then(Value::as_i64) {
        Some(0) | None => {}
        Some(code) => return Err(SiteError::Api(format!("douyu room {id}: error {code}"))),
    }
    let data = body
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| SiteError::Decode(format!("douyu room {id}: missing data")))?;

    Ok(AnchorStatus {
        name: str_field(data, "owner_name").unwrap_or_default(),
        live_url,
        online: data.get("room_status").and_then(Value::as_str) == Some("1"),
        title: str_field(data, "room_name"),
        avatar: str_field(data, "avatar"),
    })
}

pub(crate) fn parse_huya(html: &str, id: &str) -> Result<AnchorStatus> {
    let live_url = format!("https://www.huya.com/{id}");
    if html.contains("找不到这个主播") {
        return Ok(missing(AnchorPlatform::Huya, id, live_url));
    }

    let document = Html::parse_document(html);
    let selector = |css: &str| {
        Selector::parse(css).map_err(|e| SiteError::Config(format!("invalid selector {css}: {e:?}")))
    };
    let text_of = |sel: &Selector| {
        document
            .select(sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_owned())
    };

    let name = text_of(&selector(".host-name")?).unwrap_or_default();
    let title = text_of(&selector(".host-title")?).filter(|t| !t.is_empty());
    let avatar = document
        .select(&selector(".host-pic #avatar-img")?)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(str::to_owned);
    let online = document
        .select(&selector("body")?)
        .next()
        .and_then(|el| el.value().attr("class"))
        .is_some_and(|class| class.contains("liveStatus-on"));

    Ok(AnchorStatus {
        name,
        live_url,
        online,
        title,
        avatar,
    })
}

/// `data` is an object keyed by uid; an unknown uid yields an empty array.
pub(crate) fn parse_bili(body: &Value, id: &str) -> Result<AnchorStatus> {
    match body.get("code").and_then(Value::as_i64) {
        Some(0) | None => {}
        Some(code) => {
            let msg = str_field(body, "message").unwrap_or_default();
            return Err(SiteError::Api(format!("bili uid {id}: {code} {msg}")));
        }
    }
    let Some(info) = body.get("data").and_then(|d| d.get(id)) else {
        return Ok(missing(
            AnchorPlatform::Bili,
            id,
            format!("https://space.bilibili.com/{id}/"),
        ));
    };

    let room_id = info
        .get("room_id")
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();

    Ok(AnchorStatus {
        name: str_field(info, "uname").unwrap_or_default(),
        live_url: format!("https://live.bilibili.com/{room_id}"),
        // 0 offline, 1 live, 2 replaying
        online: info.get("live_status").and_then(Value::as_i64) == Some(1),
        title: str_field(info, "title"),
        avatar: str_field(info, "face"),
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct DouyinResponse {
    #[serde(default)]
    data: Option<DouyinLive>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DouyinLive {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    online: bool,
    #[serde(default)]
    live_url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

pub(crate) fn douyin_status(body: DouyinResponse, id: &str) -> AnchorStatus {
    let user_url = format!("https://www.douyin.com/user/{id}");
    let Some(live) = body.data else {
        return AnchorStatus {
            name: "主播数据为空".to_owned(),
            live_url: user_url,
            online: false,
            title: Some(format!("{} {id}", AnchorPlatform::Douyin)),
            avatar: None,
        };
    };

    let live_url = match live.live_url {
        Some(url) if live.online && !url.is_empty() => url,
        _ => user_url,
    };
    AnchorStatus {
        name: live
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "[缺少数据]".to_owned()),
        live_url,
        online: live.online,
        title: live.title,
        avatar: live.avatar,
    }
}
