//! End-to-end pipeline tests against an in-memory origin.
//!
//! Covers detection → dispatch → parse → render → cache, including the
//! rule that nothing is cached unless resolution and rendering succeed.

mod common;

use std::sync::Arc;

use common::{tweet_body, xhs_page, FakeOrigin, RecordingRenderer, XHS_EXPLORE_STATE};
use linkparse::{Config, Content, ParseError, Pipeline, PipelineError, Platform};

const FX: &str = "https://api.fxtwitter.com";

fn pipeline(origin: &Arc<FakeOrigin>, config: &Config) -> Pipeline {
    Pipeline::with_client(config, origin.clone()).expect("built-in patterns compile")
}

// ─── End-to-end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn short_link_in_chat_text_resolves() {
    let explore = "https://www.xiaohongshu.com/explore/abc?xsec_token=T&xsec_source=app_share";
    let origin = Arc::new(
        FakeOrigin::new()
            .redirect("https://xhslink.com/abcd123", explore)
            .page(explore, 200, &xhs_page(XHS_EXPLORE_STATE)),
    );
    let p = pipeline(&origin, &Config::default());

    let found = p
        .find_link("check this out https://xhslink.com/abcd123 nice")
        .unwrap();
    assert_eq!(found.keyword(), "xhslink.com");
    assert_eq!(found.matched(), "https://xhslink.com/abcd123");
    assert_eq!(
        p.dispatch(found.keyword()).unwrap().platform(),
        Platform::Xiaohongshu
    );

    let renderer = RecordingRenderer::default();
    let result = p.handle(&found, &renderer).await.unwrap();

    assert_eq!(result.title, "Weekend bakery");
    assert!(!result.contents.is_empty());
    assert_eq!(
        result.contents,
        vec![
            Content::image("https://img/1.jpg"),
            Content::image("https://img/2.jpg"),
        ]
    );
    assert_eq!(
        origin.requests(),
        vec!["https://xhslink.com/abcd123".to_string(), explore.to_string()]
    );
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn handle_text_without_link_is_none() {
    let origin = Arc::new(FakeOrigin::new());
    let p = pipeline(&origin, &Config::default());
    let renderer = RecordingRenderer::default();

    let out = p.handle_text("just chatting", &renderer).await.unwrap();

    assert!(out.is_none());
    assert_eq!(renderer.calls(), 0);
    assert_eq!(origin.request_count(), 0);
}

// ─── Caching ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cached_link_is_served_without_refetch() {
    let origin = Arc::new(FakeOrigin::new().page(
        &format!("{FX}/u/status/1"),
        200,
        &tweet_body("1", "hello"),
    ));
    let p = pipeline(&origin, &Config::default());
    let renderer = RecordingRenderer::default();
    let found = p.find_link("https://x.com/u/status/1").unwrap();

    let first = p.handle(&found, &renderer).await.unwrap();
    let second = p.handle(&found, &renderer).await.unwrap();

    assert_eq!(origin.request_count(), 1);
    assert_eq!(renderer.calls(), 2);
    assert_eq!(first, second);
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn failed_resolution_is_not_cached() {
    // No route for the status: the fake origin fails the request.
    let origin = Arc::new(FakeOrigin::new());
    let p = pipeline(&origin, &Config::default());
    let renderer = RecordingRenderer::default();
    let found = p.find_link("https://x.com/u/status/404").unwrap();

    let err = p.handle(&found, &renderer).await.unwrap_err();

    assert!(matches!(err, PipelineError::Parse(ParseError::Timeout(_))));
    assert!(p.cache().get(found.matched()).is_none());
    assert_eq!(renderer.calls(), 0);

    // A retry goes back to the network.
    let _ = p.handle(&found, &renderer).await;
    assert_eq!(origin.request_count(), 2);
}

#[tokio::test]
async fn failed_render_is_not_cached() {
    let origin = Arc::new(FakeOrigin::new().page(
        &format!("{FX}/u/status/2"),
        200,
        &tweet_body("2", "hi"),
    ));
    let p = pipeline(&origin, &Config::default());
    let found = p.find_link("https://x.com/u/status/2").unwrap();

    let err = p
        .handle(&found, &RecordingRenderer::failing())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Render(_)));
    assert!(p.cache().get(found.matched()).is_none());

    p.handle(&found, &RecordingRenderer::default()).await.unwrap();
    assert!(p.cache().get(found.matched()).is_some());
    assert_eq!(origin.request_count(), 2);
}

#[tokio::test]
async fn resolve_alone_never_caches() {
    let origin = Arc::new(FakeOrigin::new().page(
        &format!("{FX}/u/status/3"),
        200,
        &tweet_body("3", "x"),
    ));
    let p = pipeline(&origin, &Config::default());
    let found = p.find_link("https://x.com/u/status/3").unwrap();

    p.resolve(&found).await.unwrap();

    assert!(p.cache().is_empty());
}

#[tokio::test]
async fn cache_evicts_oldest_link() {
    let mut origin = FakeOrigin::new();
    for id in ["1", "2", "3"] {
        origin = origin.page(&format!("{FX}/u/status/{id}"), 200, &tweet_body(id, id));
    }
    let origin = Arc::new(origin);
    let config = Config::from_toml("cache_capacity = 2").unwrap();
    let p = pipeline(&origin, &config);
    let renderer = RecordingRenderer::default();

    for id in ["1", "2", "3"] {
        p.handle_text(&format!("https://x.com/u/status/{id}"), &renderer)
            .await
            .unwrap();
    }

    assert_eq!(p.cache().len(), 2);
    assert!(p.cache().get("https://x.com/u/status/1").is_none());
    assert_eq!(p.cache().get("https://x.com/u/status/2").unwrap().text, "2");
    assert_eq!(p.cache().get("https://x.com/u/status/3").unwrap().text, "3");
}

#[tokio::test]
async fn clear_cache_forces_refetch() {
    let origin = Arc::new(FakeOrigin::new().page(
        &format!("{FX}/u/status/5"),
        200,
        &tweet_body("5", "again"),
    ));
    let p = pipeline(&origin, &Config::default());
    let renderer = RecordingRenderer::default();
    let found = p.find_link("https://x.com/u/status/5").unwrap();

    p.handle(&found, &renderer).await.unwrap();
    p.clear_cache();
    assert!(p.cache().is_empty());
    p.handle(&found, &renderer).await.unwrap();

    assert_eq!(origin.request_count(), 2);
}

#[tokio::test]
async fn concurrent_identical_links_are_not_coalesced() {
    // The gate only opens once both requests are in flight, proving each
    // handler ran its own parser.
    let origin = Arc::new(
        FakeOrigin::new()
            .page(&format!("{FX}/u/status/7"), 200, &tweet_body("7", "race"))
            .gated(2),
    );
    let p = pipeline(&origin, &Config::default());
    let renderer = RecordingRenderer::default();
    let found = p.find_link("https://x.com/u/status/7").unwrap();

    let (a, b) = tokio::join!(p.handle(&found, &renderer), p.handle(&found, &renderer));

    assert_eq!(a.unwrap().text, "race");
    assert_eq!(b.unwrap().text, "race");
    assert_eq!(origin.request_count(), 2);
    assert_eq!(p.cache().len(), 1);
}

// ─── Detection & dispatch ────────────────────────────────────────────────────

#[tokio::test]
async fn registration_order_decides_between_two_links() {
    let origin = Arc::new(FakeOrigin::new());
    let p = pipeline(&origin, &Config::default());

    let found = p
        .find_link("https://x.com/u/status/1 vs https://xhslink.com/zz")
        .unwrap();

    assert_eq!(found.keyword(), "xhslink.com");
}

#[tokio::test]
async fn disabled_platform_links_are_ignored() {
    let origin = Arc::new(FakeOrigin::new());
    let config = Config::from_toml(r#"disabled_platforms = ["xiaohongshu"]"#).unwrap();
    let p = pipeline(&origin, &config);

    let found = p
        .find_link("https://xhslink.com/zz and https://x.com/u/status/1")
        .unwrap();

    assert_eq!(found.keyword(), "x.com");
    assert_eq!(p.enabled_platforms(), &[Platform::Twitter]);
}
