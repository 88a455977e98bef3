//! Store listings of monitored apps.

use crate::error::{Result, SiteError};
use crate::http::HttpClient;
use crate::types::{AppPlatform, AppStatus};
use serde::Deserialize;

/// Default iTunes lookup service.
pub const DEFAULT_LOOKUP_URL: &str = "https://itunes.apple.com/lookup";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LookupResponse {
    result_count: u64,
    #[serde(default)]
    results: Vec<LookupEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupEntry {
    track_name: String,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    formatted_price: Option<String>,
    #[serde(default)]
    track_id: Option<u64>,
    #[serde(default)]
    bundle_id: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    track_view_url: Option<String>,
    #[serde(default)]
    artwork_url100: Option<String>,
}

/// Look up one app.
///
/// `area` is the two-letter store region (e.g. `CN`, `US`). Play Store apps
/// are reported by id only and never count as free.
///
/// # Errors
///
/// Network and decoding failures are returned; the caller isolates them per
/// app.
pub async fn check_app(
    http: &HttpClient,
    lookup_url: &str,
    platform: AppPlatform,
    id: &str,
    area: &str,
) -> Result<AppStatus> {
    match platform {
        AppPlatform::AppStore => {
            let url = format!("{lookup_url}?country={area}&id={id}");
            let resp: LookupResponse = http.get(&url).await?.ensure_success().await?.json().await?;
            appstore_status(resp, id, area)
        }
        AppPlatform::PlayStore => Ok(AppStatus {
            name: id.to_owned(),
            ..AppStatus::default()
        }),
    }
}

pub(crate) fn appstore_status(resp: LookupResponse, id: &str, area: &str) -> Result<AppStatus> {
    if resp.result_count == 0 {
        return Ok(AppStatus {
            name: format!("未知的ID：{id}"),
            view_url: Some(format!(
                "https://apps.apple.com/{}/app/id{id}",
                area.to_lowercase()
            )),
            ..AppStatus::default()
        });
    }
    let entry = resp
        .results
        .into_iter()
        .next()
        .ok_or_else(|| SiteError::Decode(format!("app {id}: resultCount set but no results")))?;

    Ok(AppStatus {
        name: entry.track_name,
        price: entry.price,
        formatted_price: entry.formatted_price,
        track_id: entry.track_id,
        bundle_id: entry.bundle_id,
        version: entry.version,
        view_url: entry.track_view_url,
        icon: entry.artwork_url100,
    })
}
