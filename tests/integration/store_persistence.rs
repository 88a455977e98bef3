//! On-disk layout of the progress store.

use dotasks::ProgressStore;
use dotasks::store::{
    AnchorAttention, Attentions, GalleryTask, GalleryTasks, NotifiedAnchors, RepliedThreads,
    StartupRecord,
};
use dotasks_sites::{AnchorPlatform, GalleryPlatform};

#[test]
fn namespaces_use_the_persisted_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store = ProgressStore::open(&path).unwrap();

    store
        .set(&RepliedThreads {
            ids: vec!["2000".into()],
        })
        .unwrap();
    store
        .set(&GalleryTasks {
            enable: true,
            list: vec![GalleryTask {
                plat: GalleryPlatform::Weibo,
                id: "1".into(),
                last: None,
            }],
        })
        .unwrap();
    let mut attentions = Attentions::default();
    attentions.anchors.list.push(AnchorAttention {
        plat: AnchorPlatform::Huya,
        id: "660000".into(),
        enable: true,
    });
    store.set(&attentions).unwrap();
    store.set(&NotifiedAnchors(vec!["huya_660000".into()])).unwrap();
    store.set(&StartupRecord { startup: 1_700_000_000_000 }).unwrap();

    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["sht"]["ids"], serde_json::json!(["2000"]));
    assert_eq!(raw["picTasks"]["list"][0], serde_json::json!({"plat": "weibo", "id": "1"}));
    assert_eq!(raw["attentions"]["anchors"]["enableNotify"], serde_json::json!(true));
    assert_eq!(raw["attentions"]["anchors"]["list"][0]["plat"], serde_json::json!("huya"));
    assert_eq!(raw["anchors_no"], serde_json::json!(["huya_660000"]));
    assert_eq!(raw["sw"]["startup"], serde_json::json!(1_700_000_000_000_i64));
}

#[test]
fn state_written_by_hand_is_read_and_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(
        &path,
        r#"{"sht":{"ids":["7"]},"picTasks":{"list":[{"plat":"weibo","id":"9","last":"4800000000000000"}]},"theme":"dark"}"#,
    )
    .unwrap();

    let store = ProgressStore::open(&path).unwrap();
    let tasks = store.get::<GalleryTasks>().unwrap().unwrap().value;
    assert!(tasks.enable);
    assert_eq!(tasks.list[0].last.as_deref(), Some("4800000000000000"));

    store
        .update::<RepliedThreads, _>(|r| {
            r.insert("8");
        })
        .unwrap();
    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["sht"]["ids"], serde_json::json!(["7", "8"]));
    assert_eq!(raw["theme"], serde_json::json!("dark"));
}
