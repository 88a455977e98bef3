//! Sign-in and auto-reply flows through the task layer, with a file-backed
//! progress store.

use crate::helpers::{config_for, html, reopen, services_from};
use dotasks::store::RepliedThreads;
use dotasks::tasks::{self, SignInFailure, SignInOutcome};
use dotasks_sites::SignInSite;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer};

const LISTING: &str = r#"<table id="threadlisttableid">
<tbody id="stickthread_9"><tr><td>置顶</td></tr></tbody>
<tbody id="normalthread_2002"><tr><td>newest</td></tr></tbody>
<tbody id="normalthread_2001"><tr><td>newer</td></tr></tbody>
<tbody id="normalthread_2000"><tr><td>older</td></tr></tbody>
</table>"#;

const THREAD_PAGE: &str = r#"<form method="post" id="fastpostform">
<input type="hidden" name="formhash" value="abad1dea" />
</form>
<form id="scbar_form"><input type="hidden" name="srhfid" value="103" /></form>"#;

const SIGN_FORM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<root><![CDATA[<form method="post" id="signform_5e5e5e" action="plugin.php">
<input type="hidden" name="formhash" value="abad1dea">
<span id="secqaa_zZ9"></span></form>]]></root>"#;

const CHALLENGE: &str = r#"if($('secqaa_zZ9')) {
	var string = '<input name="secanswer" id="secqaaverify_zZ9" type="text" class="txt px vm" />' +
		'<span><img src="static/image/common/none.gif" class="vm" /></span>' +
		sectplcode[2] + '50 - 8 = ?' + sectplcode[3];
}"#;

async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/forum.php"))
        .and(query_param("mod", "forumdisplay"))
        .and(query_param("fid", "103"))
        .respond_with(html(LISTING))
        .mount(server)
        .await;
}

async fn mount_thread(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/forum.php"))
        .and(query_param("mod", "viewthread"))
        .respond_with(html(THREAD_PAGE))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forum.php"))
        .and(query_param("mod", "ajax"))
        .respond_with(html("<root></root>"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn already_signed_in_makes_only_the_status_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugin.php"))
        .respond_with(html("<div>今日已签到</div>"))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let (services, sink) = services_from(config_for(&server.uri(), &dir));

    let outcome = tasks::sign_in(&services, SignInSite::Sht).await.unwrap();
    assert_eq!(outcome, SignInOutcome::Skipped);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn sign_in_replies_to_lowest_index_unreplied_thread() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugin.php"))
        .and(query_param("id", "dd_sign:index"))
        .respond_with(html("<a>点击签到</a>"))
        .mount(&server)
        .await;
    mount_listing(&server).await;
    mount_thread(&server).await;
    Mock::given(method("POST"))
        .and(path("/forum.php"))
        .and(query_param("mod", "post"))
        .and(query_param("tid", "2001"))
        .respond_with(html("<root>非常感谢，回复发布成功</root>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/plugin.php"))
        .and(query_param("signsubmit", "yes"))
        .and(body_string_contains("secanswer=42"))
        .respond_with(html("<root>签到成功，获得 2 金钱</root>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/plugin.php"))
        .and(query_param("infloat", "yes"))
        .respond_with(html(SIGN_FORM))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/misc.php"))
        .and(query_param("idhash", "zZ9"))
        .respond_with(html(CHALLENGE))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (services, sink) = services_from(config_for(&server.uri(), &dir));
    services
        .store
        .set(&RepliedThreads {
            ids: vec!["2002".into()],
        })
        .unwrap();

    let outcome = tasks::sign_in(&services, SignInSite::Sht).await.unwrap();
    assert!(matches!(outcome, SignInOutcome::Signed(msg) if msg.contains("签到成功")));
    assert!(sink.is_empty());

    let replied = reopen(&services).get::<RepliedThreads>().unwrap().unwrap().value;
    assert_eq!(replied.ids, vec!["2002", "2001"]);
}

#[tokio::test]
async fn exhausted_listing_fetches_nothing_else() {
    let server = MockServer::start().await;
    mount_listing(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let (services, sink) = services_from(config_for(&server.uri(), &dir));
    services
        .store
        .set(&RepliedThreads {
            ids: vec!["2000".into(), "2001".into(), "2002".into()],
        })
        .unwrap();

    let failure = tasks::auto_reply(&services).await.unwrap_err();
    assert_eq!(failure, SignInFailure::NoUnrepliedThread);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert_eq!(sink.notifications()[0].title, "[SHT] 回帖失败");
}

#[tokio::test]
async fn reply_survives_store_reopen_and_is_not_repeated() {
    let server = MockServer::start().await;
    mount_listing(&server).await;
    mount_thread(&server).await;
    Mock::given(method("POST"))
        .and(path("/forum.php"))
        .and(query_param("mod", "post"))
        .respond_with(html("<root>非常感谢，回复发布成功</root>"))
        .expect(2)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let (services, _sink) = services_from(config_for(&server.uri(), &dir));

    assert_eq!(tasks::auto_reply(&services).await.unwrap(), "2002");

    // A second daemon over the same state file picks the next thread.
    let (restarted, _sink) = services_from(config_for(&server.uri(), &dir));
    assert_eq!(tasks::auto_reply(&restarted).await.unwrap(), "2001");
}
