//! Anchor live-status and app price monitors.
//!
//! Both monitors check every enabled entry in turn, isolate failures per
//! entry, and announce an entry once per "session": an anchor when it goes
//! live, an app when it becomes free. The set of already-announced keys is
//! persisted (`anchors_no`, `apps_no`) and an entry leaves it when it is
//! next observed offline or paid, so the following session is announced
//! again.

use super::{TaskServices, trunc};
use crate::error::Result;
use crate::notify::Notification;
use crate::store::{Attentions, Namespace, NotifiedAnchors, NotifiedApps};
use dotasks_sites::sites::{check_anchor, check_app};

/// Counts from one monitor run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    /// Entries checked successfully.
    pub checked: usize,
    /// Entries whose check failed.
    pub failed: usize,
    /// Entries online (anchors) or free (apps).
    pub active: usize,
    /// Notifications sent.
    pub notified: usize,
}

/// Fold one observation into the announced set.
///
/// Returns true when `key` just became active and was not announced yet;
/// the key is then added. An inactive observation removes the key.
pub fn apply_observation(announced: &mut Vec<String>, key: &str, active: bool) -> bool {
    let present = announced.iter().position(|k| k == key);
    match (active, present) {
        (true, None) => {
            announced.push(key.to_owned());
            true
        }
        (true, Some(_)) => false,
        (false, Some(index)) => {
            announced.remove(index);
            false
        }
        (false, None) => false,
    }
}

struct Observation {
    key: String,
    active: bool,
    /// Announcement to send if this observation is a fresh activation.
    notification: Option<Notification>,
}

/// Mutable access to the keys of an announced set.
trait AnnouncedSet: Namespace {
    fn keys(&mut self) -> &mut Vec<String>;
}

impl AnnouncedSet for NotifiedAnchors {
    fn keys(&mut self) -> &mut Vec<String> {
        &mut self.0
    }
}

impl AnnouncedSet for NotifiedApps {
    fn keys(&mut self) -> &mut Vec<String> {
        &mut self.0
    }
}

/// Persist observations and return the notifications they trigger.
fn settle<T: AnnouncedSet>(
    services: &TaskServices,
    observations: &[Observation],
) -> Result<Vec<Notification>> {
    let mut fresh = Vec::new();
    services.store.update::<T, _>(|set| {
        fresh.clear();
        for obs in observations {
            if apply_observation(set.keys(), &obs.key, obs.active) {
                if let Some(n) = &obs.notification {
                    fresh.push(n.clone());
                }
            }
        }
    })?;
    Ok(fresh)
}

/// Check every enabled anchor once.
///
/// # Errors
///
/// Only store failures are returned; per-anchor check failures are logged
/// and counted.
pub async fn monitor_anchors(services: &TaskServices) -> Result<MonitorSummary> {
    let attentions = services.store.get_or_default::<Attentions>()?.value;
    let anchors = attentions.anchors;
    let mut summary = MonitorSummary::default();
    if !anchors.enable {
        tracing::debug!("anchor monitor disabled");
        return Ok(summary);
    }

    let endpoints = &services.config.anchors.endpoints;
    let mut observations = Vec::new();
    for anchor in anchors.list.iter().filter(|a| a.enable) {
        let status = match check_anchor(&services.http, endpoints, anchor.plat, &anchor.id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(plat = %anchor.plat, id = %anchor.id, "anchor check failed: {e}");
                summary.failed += 1;
                continue;
            }
        };
        summary.checked += 1;
        if status.online {
            summary.active += 1;
            tracing::info!(plat = %anchor.plat, id = %anchor.id, "anchor '{}' is live", status.name);
            // With notifications off, live anchors are not marked as announced.
            if !anchors.enable_notify {
                continue;
            }
        } else {
            tracing::debug!(plat = %anchor.plat, id = %anchor.id, "anchor '{}' is offline", status.name);
        }
        let notification = status.online.then(|| {
            Notification::new(
                "关注的主播已开播",
                format!("{}({})", status.name, trunc(&anchor.id, 20)),
            )
            .with_icon(anchor.plat.id())
            .with_open(status.live_url.clone())
        });
        observations.push(Observation {
            key: anchor.notify_key(),
            active: status.online,
            notification,
        });
    }

    for n in settle::<NotifiedAnchors>(services, &observations)? {
        services.notify(n);
        summary.notified += 1;
    }
    tracing::info!(
        online = summary.active,
        checked = summary.checked,
        failed = summary.failed,
        "anchor monitor finished"
    );
    Ok(summary)
}

/// Check every enabled app once.
///
/// # Errors
///
/// Only store failures are returned; per-app check failures are logged and
/// counted.
pub async fn monitor_apps(services: &TaskServices) -> Result<MonitorSummary> {
    let apps = services.store.get_or_default::<Attentions>()?.value.apps;
    let mut summary = MonitorSummary::default();
    if !apps.enable {
        tracing::debug!("app monitor disabled");
        return Ok(summary);
    }

    let lookup_url = &services.config.apps.lookup_url;
    let mut observations = Vec::new();
    for app in apps.list.iter().filter(|a| a.enable) {
        let status = match check_app(&services.http, lookup_url, app.plat, &app.id, &app.area).await
        {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(plat = %app.plat, id = %app.id, "app check failed: {e}");
                summary.failed += 1;
                continue;
            }
        };
        summary.checked += 1;
        let free = status.is_free();
        if free {
            summary.active += 1;
            tracing::info!(plat = %app.plat, id = %app.id, "app '{}' is free", status.name);
        } else {
            tracing::debug!(
                plat = %app.plat,
                id = %app.id,
                price = status.formatted_price.as_deref().unwrap_or("-"),
                "app '{}' is not free",
                status.name
            );
        }
        let notification = free.then(|| {
            let n = Notification::new(
                "关注的应用已免费",
                format!("{}({})", status.name, trunc(&app.id, 20)),
            )
            .with_icon(app.plat.id());
            match &status.view_url {
                Some(url) => n.with_open(url.clone()),
                None => n,
            }
        });
        observations.push(Observation {
            key: app.notify_key(),
            active: free,
            notification,
        });
    }

    for n in settle::<NotifiedApps>(services, &observations)? {
        services.notify(n);
        summary.notified += 1;
    }
    tracing::info!(
        free = summary.active,
        checked = summary.checked,
        failed = summary.failed,
        "app monitor finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::store::{AnchorAttention, AppAttention};
    use crate::tasks::test_support::services;
    use dotasks_sites::{AnchorPlatform, AppPlatform};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn observation_sequence_announces_each_session_once() {
        let mut announced = Vec::new();
        let sequence = [true, true, false, true];
        let fired: Vec<bool> = sequence
            .iter()
            .map(|online| apply_observation(&mut announced, "douyu_1", *online))
            .collect();
        assert_eq!(fired, vec![true, false, false, true]);
        assert_eq!(announced, vec!["douyu_1"]);
    }

    #[test]
    fn offline_observation_of_unknown_key_is_noop() {
        let mut announced = vec!["huya_2".to_owned()];
        assert!(!apply_observation(&mut announced, "bili_3", false));
        assert_eq!(announced, vec!["huya_2"]);
    }

    fn douyu(status: &str, name: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": 0,
            "data": {"owner_name": name, "room_status": status, "room_name": "t", "avatar": "a"}
        }))
    }

    #[tokio::test]
    async fn failing_anchor_does_not_stop_siblings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/RoomApi/room/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/RoomApi/room/2"))
            .respond_with(douyu("1", "second"))
            .mount(&server)
            .await;
        let (services, sink) = services(&server.uri());
        let mut attentions = Attentions::default();
        for id in ["1", "2", "3"] {
            attentions.anchors.list.push(AnchorAttention {
                plat: AnchorPlatform::Douyu,
                id: id.into(),
                enable: id != "3",
            });
        }
        services.store.set(&attentions).unwrap();

        let summary = monitor_anchors(&services).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.notified, 1);
        let seen = sink.notifications();
        assert_eq!(seen[0].message, "second(2)");
        assert_eq!(seen[0].open_url(), Some("https://www.douyu.com/2"));
        let announced = services.store.get::<NotifiedAnchors>().unwrap().unwrap();
        assert_eq!(announced.value.0, vec!["douyu_2"]);
    }

    #[tokio::test]
    async fn notify_switch_off_keeps_set_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(douyu("1", "live"))
            .mount(&server)
            .await;
        let (services, sink) = services(&server.uri());
        let mut attentions = Attentions::default();
        attentions.anchors.enable_notify = false;
        attentions.anchors.list.push(AnchorAttention {
            plat: AnchorPlatform::Douyu,
            id: "7".into(),
            enable: true,
        });
        services.store.set(&attentions).unwrap();

        let summary = monitor_anchors(&services).await.unwrap();
        assert_eq!(summary.active, 1);
        assert!(sink.is_empty());
        let announced = services.store.get_or_default::<NotifiedAnchors>().unwrap();
        assert!(announced.value.0.is_empty());
    }

    #[tokio::test]
    async fn free_app_announced_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lookup"))
            .and(query_param("id", "414478124"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultCount": 1,
                "results": [{
                    "trackName": "WeChat",
                    "price": 0.0,
                    "formattedPrice": "免费",
                    "trackId": 414478124,
                    "trackViewUrl": "https://apps.apple.com/cn/app/id414478124"
                }]
            })))
            .mount(&server)
            .await;
        let (services, sink) = services(&server.uri());
        let mut attentions = Attentions::default();
        attentions.apps.list.push(AppAttention {
            plat: AppPlatform::AppStore,
            id: "414478124".into(),
            area: "CN".into(),
            enable: true,
        });
        attentions.apps.list.push(AppAttention {
            plat: AppPlatform::PlayStore,
            id: "com.example".into(),
            area: "US".into(),
            enable: true,
        });
        services.store.set(&attentions).unwrap();

        let first = monitor_apps(&services).await.unwrap();
        let second = monitor_apps(&services).await.unwrap();
        assert_eq!(first.notified, 1);
        assert_eq!(first.checked, 2);
        assert_eq!(second.notified, 0);
        let seen = sink.notifications();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].title, "关注的应用已免费");
        assert_eq!(seen[0].message, "WeChat(414478124)");
    }

    #[tokio::test]
    async fn disabled_monitor_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let (services, _sink) = services(&server.uri());
        let mut attentions = Attentions::default();
        attentions.anchors.enable = false;
        attentions.apps.enable = false;
        attentions.anchors.list.push(AnchorAttention {
            plat: AnchorPlatform::Huya,
            id: "1".into(),
            enable: true,
        });
        services.store.set(&attentions).unwrap();

        assert_eq!(monitor_anchors(&services).await.unwrap(), MonitorSummary::default());
        assert_eq!(monitor_apps(&services).await.unwrap(), MonitorSummary::default());
    }
}
