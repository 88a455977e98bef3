//! Shared helpers for integration tests.

use dotasks::config::DoTasksConfig;
use dotasks::notify::MemorySink;
use dotasks::{ProgressStore, TaskServices};
use dotasks_sites::sites::AnchorEndpoints;
use std::sync::Arc;
use wiremock::ResponseTemplate;

/// Config pointing every site at `base`, with state and albums under `dir`.
pub(crate) fn config_for(base: &str, dir: &tempfile::TempDir) -> DoTasksConfig {
    let mut config = DoTasksConfig::default();
    config.sites.sht.site.base_url = Some(base.to_owned());
    config.sites.nodeseek.base_url = Some(base.to_owned());
    config.sites.hdtime.base_url = Some(base.to_owned());
    config.sites.weibo.base_url = Some(base.to_owned());
    config.anchors.endpoints = AnchorEndpoints {
        douyu_api: base.to_owned(),
        huya: base.to_owned(),
        bili_api: base.to_owned(),
        douyin_helper: base.to_owned(),
    };
    config.apps.lookup_url = format!("{base}/lookup");
    config.crawl.page_delay_ms = (0, 0);
    config.http.timeout_seconds = 5;
    config.state_file = Some(dir.path().join("state.json"));
    config.albums_dir = Some(dir.path().join("albums"));
    config
}

/// Services built the way the binary builds them, with a recording sink.
pub(crate) fn services_from(config: DoTasksConfig) -> (TaskServices, MemorySink) {
    let sink = MemorySink::new();
    let services = TaskServices::from_config(config, Arc::new(sink.clone())).expect("services");
    (services, sink)
}

/// Reopen the on-disk store of `services`.
pub(crate) fn reopen(services: &TaskServices) -> ProgressStore {
    let path = services.store.path().expect("file-backed store");
    ProgressStore::open(path).expect("reopen store")
}

pub(crate) fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(body.to_owned())
}
