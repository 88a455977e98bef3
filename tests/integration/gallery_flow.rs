//! Gallery crawl end to end: export, download-service hand-off and cursor
//! idempotence across runs.

use crate::helpers::{config_for, reopen, services_from};
use dotasks::store::{GalleryTask, GalleryTasks};
use dotasks::tasks;
use dotasks_sites::{Album, GalleryPlatform};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn post(id: u64) -> serde_json::Value {
    serde_json::json!({
        "idstr": id.to_string(),
        "created_at": "Sat Jan 15 20:00:00 +0800 2022",
        "text_raw": format!("album {id}"),
        "pic_ids": [format!("p{id}a"), format!("p{id}b")],
        "pic_infos": {
            format!("p{id}a"): {
                "largest": {"url": format!("https://img.example/large/{id}a.jpg")},
                "original": {"url": format!("https://img.example/mw/{id}a.jpg")}
            },
            format!("p{id}b"): {
                "largest": {"url": format!("https://img.example/large/{id}b.jpg")},
                "original": {"url": format!("https://img.example/mw/{id}b.jpg")}
            }
        },
        "user": {"id": 1669879400, "screen_name": "相册"}
    })
}

async fn mount_timeline(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ajax/statuses/mymblog"))
        .and(query_param("uid", "1669879400"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": 1,
            "data": {"total": 4, "list": [post(104), post(103), post(102), post(101)]}
        })))
        .mount(server)
        .await;
}

fn seed(services: &dotasks::TaskServices, last: &str) {
    services
        .store
        .set(&GalleryTasks {
            enable: true,
            list: vec![GalleryTask {
                plat: GalleryPlatform::Weibo,
                id: "1669879400".into(),
                last: Some(last.into()),
            }],
        })
        .unwrap();
}

#[tokio::test]
async fn second_run_finds_nothing_new() {
    let server = MockServer::start().await;
    mount_timeline(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/pics/dl"))
        .and(header("Authorization", "Bearer pics-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&server.uri(), &dir);
    config.downloads.addr = Some(server.uri());
    config.downloads.token = Some("pics-token".into());
    let (services, sink) = services_from(config);
    seed(&services, "102");

    let first = tasks::run_gallery(&services).await.unwrap();
    assert_eq!(first.albums, 2);
    assert!(first.submitted);
    assert_eq!(first.cursors_moved, 1);
    let export = first.export.unwrap();
    assert!(export.starts_with(dir.path().join("albums")));
    let albums: Vec<Album> = serde_json::from_slice(&std::fs::read(&export).unwrap()).unwrap();
    let ids: Vec<&str> = albums.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["104", "103"]);
    assert_eq!(albums[0].urls.len(), 2);

    let second = tasks::run_gallery(&services).await.unwrap();
    assert_eq!(second.albums, 0);
    assert_eq!(second.cursors_moved, 0);
    assert!(second.export.is_none());
    assert!(sink.is_empty());

    let tasks = reopen(&services).get::<GalleryTasks>().unwrap().unwrap().value;
    assert_eq!(tasks.list[0].last.as_deref(), Some("104"));
}

#[tokio::test]
async fn rejected_download_still_advances_cursor() {
    let server = MockServer::start().await;
    mount_timeline(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/pics/dl"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 401, "msg": "bad token"})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&server.uri(), &dir);
    config.downloads.addr = Some(server.uri());
    config.downloads.token = Some("wrong".into());
    let (services, sink) = services_from(config);
    seed(&services, "103");

    let summary = tasks::run_gallery(&services).await.unwrap();
    assert_eq!(summary.albums, 1);
    assert!(!summary.submitted);
    assert!(summary.export.is_some());
    assert_eq!(sink.notifications()[0].title, "[图集] 发送下载请求失败");

    let tasks = services.store.get::<GalleryTasks>().unwrap().unwrap().value;
    assert_eq!(tasks.list[0].last.as_deref(), Some("104"));
}

#[test]
fn reset_gallery_clears_cursor_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (services, _sink) = services_from(config_for("http://127.0.0.1:9", &dir));
    seed(&services, "104");

    assert_eq!(tasks::reset_gallery(&services.store).unwrap(), 1);
    let tasks = reopen(&services).get::<GalleryTasks>().unwrap().unwrap().value;
    assert!(tasks.list[0].last.is_none());
}

fn timeline_page(ids: std::ops::RangeInclusive<u64>, total: u64) -> ResponseTemplate {
    let list: Vec<_> = ids.rev().map(post).collect();
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "ok": 1,
        "data": {"total": total, "list": list}
    }))
}

#[tokio::test]
async fn failing_later_page_leaves_cursor_in_place() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ajax/statuses/mymblog"))
        .and(query_param("page", "1"))
        .respond_with(timeline_page(81..=100, 100))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ajax/statuses/mymblog"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (services, sink) = services_from(config_for(&server.uri(), &dir));
    seed(&services, "60");

    let summary = tasks::run_gallery(&services).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.albums, 0);
    assert!(summary.export.is_none());
    assert_eq!(sink.notifications()[0].title, "[weibo] 获取图集失败");

    let tasks = reopen(&services).get::<GalleryTasks>().unwrap().unwrap().value;
    assert_eq!(tasks.list[0].last.as_deref(), Some("60"));
}

#[tokio::test]
async fn empty_mid_timeline_page_keeps_what_was_read() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ajax/statuses/mymblog"))
        .and(query_param("page", "1"))
        .respond_with(timeline_page(81..=100, 100))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ajax/statuses/mymblog"))
        .and(query_param("page", "2"))
        .respond_with(timeline_page(1..=0, 100))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (services, sink) = services_from(config_for(&server.uri(), &dir));
    seed(&services, "60");

    let summary = tasks::run_gallery(&services).await.unwrap();
    assert_eq!(summary.albums, 20);
    assert_eq!(summary.cursors_moved, 1);
    assert_eq!(sink.notifications()[0].title, "[weibo] 图集获取不完整");
}
