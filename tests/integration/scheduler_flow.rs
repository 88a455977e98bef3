//! Scheduler dispatch over the built-in job table.

use crate::helpers::{config_for, html, reopen, services_from};
use dotasks::Scheduler;
use dotasks::scheduler::{TaskRunOutcome, TaskRunRecord, Trigger};
use dotasks::store::StartupRecord;
use std::collections::HashMap;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn collect(rx: &mut mpsc::UnboundedReceiver<TaskRunRecord>, n: usize) -> HashMap<String, TaskRunRecord> {
    let mut records = HashMap::new();
    for _ in 0..n {
        let record = rx.recv().await.expect("record");
        records.insert(record.task_id.clone(), record);
    }
    records
}

#[tokio::test]
async fn startup_signs_in_and_guards_auto_reply() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugin.php"))
        .respond_with(html("今日已签到"))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&server.uri(), &dir);
    config.sites.nodeseek.enabled = false;
    let (services, sink) = services_from(config);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(services.clone(), tx).with_builtin_jobs();

    scheduler.fire(Trigger::Startup);
    let records = collect(&mut rx, 3).await;
    assert_eq!(records["sign_in:sht"].outcome, TaskRunOutcome::Skipped);
    assert_eq!(records["sign_in:sht"].summary, "already signed in");
    assert_eq!(records["sign_in:nodeseek"].summary, "disabled in config");
    assert_eq!(records["sign_in:hdtime"].summary, "disabled in config");

    let startup = reopen(&services).get::<StartupRecord>().unwrap().unwrap().value;
    assert!(startup.startup > 0);

    // The startup guard holds the half-hourly reply back.
    assert_eq!(scheduler.fire(Trigger::HalfHour), 0);
    let reply = rx.recv().await.unwrap();
    assert_eq!(reply.task_id, "auto_reply");
    assert_eq!(reply.outcome, TaskRunOutcome::Skipped);
    assert!(sink.is_empty());
    assert_eq!(scheduler.snapshot().history.len(), 4);
}

#[tokio::test]
async fn monitor_store_failure_is_notified_by_scheduler() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server.uri(), &dir);
    std::fs::write(dir.path().join("state.json"), r#"{"attentions": "not an object"}"#).unwrap();
    let (services, sink) = services_from(config);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(services, tx).with_builtin_jobs();

    assert_eq!(scheduler.fire(Trigger::ThreeMinutes), 2);
    let records = collect(&mut rx, 2).await;
    assert_eq!(records["monitor:anchors"].outcome, TaskRunOutcome::Failed);
    assert_eq!(records["monitor:apps"].outcome, TaskRunOutcome::Failed);
    let titles: Vec<String> = sink.notifications().into_iter().map(|n| n.title).collect();
    assert!(titles.contains(&"[dotasks] monitor:anchors 执行失败".to_owned()));
    assert_eq!(titles.len(), 2);
}
