//! Anchor monitor across ticks: each live session is announced once, and
//! the announced set survives a restart.

use crate::helpers::{config_for, reopen, services_from};
use dotasks::store::{AnchorAttention, Attentions, NotifiedAnchors};
use dotasks::tasks;
use dotasks_sites::AnchorPlatform;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UID: &str = "8739477";

fn bili(live_status: i64) -> ResponseTemplate {
    let mut data = serde_json::Map::new();
    data.insert(
        UID.to_owned(),
        serde_json::json!({"uname": "主播", "live_status": live_status, "room_id": 21452505}),
    );
    ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 0, "data": data}))
}

async fn mount_bili(server: &MockServer, live_status: i64, times: u64) {
    Mock::given(method("POST"))
        .and(path("/room/v1/Room/get_status_info_by_uids"))
        .respond_with(bili(live_status))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn online_online_offline_online_announces_twice() {
    let server = MockServer::start().await;
    mount_bili(&server, 1, 2).await;
    mount_bili(&server, 0, 1).await;
    mount_bili(&server, 1, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let (services, sink) = services_from(config_for(&server.uri(), &dir));
    let mut attentions = Attentions::default();
    attentions.anchors.list.push(AnchorAttention {
        plat: AnchorPlatform::Bili,
        id: UID.into(),
        enable: true,
    });
    services.store.set(&attentions).unwrap();

    let mut notified = Vec::new();
    for _ in 0..4 {
        notified.push(tasks::monitor_anchors(&services).await.unwrap().notified);
    }
    assert_eq!(notified, vec![1, 0, 0, 1]);

    let seen = sink.notifications();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].title, "关注的主播已开播");
    assert_eq!(seen[0].message, format!("主播({UID})"));
    assert_eq!(seen[0].open_url(), Some("https://live.bilibili.com/21452505"));

    let announced = reopen(&services).get::<NotifiedAnchors>().unwrap().unwrap().value;
    assert_eq!(announced.0, vec![format!("bili_{UID}")]);
}

#[tokio::test]
async fn restart_does_not_reannounce_live_anchor() {
    let server = MockServer::start().await;
    mount_bili(&server, 1, 10).await;
    let dir = tempfile::tempdir().unwrap();

    let (services, first_sink) = services_from(config_for(&server.uri(), &dir));
    let mut attentions = Attentions::default();
    attentions.anchors.list.push(AnchorAttention {
        plat: AnchorPlatform::Bili,
        id: UID.into(),
        enable: true,
    });
    services.store.set(&attentions).unwrap();
    tasks::monitor_anchors(&services).await.unwrap();
    assert_eq!(first_sink.len(), 1);

    let (restarted, second_sink) = services_from(config_for(&server.uri(), &dir));
    let summary = tasks::monitor_anchors(&restarted).await.unwrap();
    assert_eq!(summary.active, 1);
    assert_eq!(summary.notified, 0);
    assert!(second_sink.is_empty());
}
