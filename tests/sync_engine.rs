//! Engine scenarios against a scripted in-memory transport.
//!
//! Each test builds its own context; responses are queued per URL and
//! optionally held back until the test releases them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use tidings::app::{DecodeError, FailureReason, SyncContext, TransportError};
use tidings::config::Config;
use tidings::domain::{Cursor, RefreshStatus};
use tidings::sync::RefreshOutcome;
use tidings::transport::Transport;

const BASE: &str = "http://feeds.test";

enum Reply {
    Ready(Result<Vec<u8>, TransportError>),
    Held {
        started: oneshot::Sender<()>,
        release: oneshot::Receiver<()>,
        reply: Result<Vec<u8>, TransportError>,
    },
    Panic {
        started: oneshot::Sender<()>,
        release: oneshot::Receiver<()>,
    },
}

#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn reply(&self, url: String, body: &str) {
        self.push(url, Reply::Ready(Ok(body.as_bytes().to_vec())));
    }

    fn fail(&self, url: String, err: TransportError) {
        self.push(url, Reply::Ready(Err(err)));
    }

    /// Queue a reply that waits for the returned sender. The receiver fires
    /// once the fetch is underway.
    fn hold(&self, url: String, body: &str) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.push(
            url,
            Reply::Held {
                started: started_tx,
                release: release_rx,
                reply: Ok(body.as_bytes().to_vec()),
            },
        );
        (started_rx, release_tx)
    }

    /// Like `hold`, but the fetch panics once released.
    fn hold_panic(&self, url: String) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.push(
            url,
            Reply::Panic {
                started: started_tx,
                release: release_rx,
            },
        );
        (started_rx, release_tx)
    }

    fn push(&self, url: String, reply: Reply) {
        self.replies.lock().unwrap().entry(url).or_default().push_back(reply);
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front());

        match next {
            Some(Reply::Ready(reply)) => reply,
            Some(Reply::Held {
                started,
                release,
                reply,
            }) => {
                let _ = started.send(());
                let _ = release.await;
                reply
            }
            Some(Reply::Panic { started, release }) => {
                let _ = started.send(());
                let _ = release.await;
                panic!("transport crashed mid-fetch");
            }
            None => Err(TransportError::HttpStatus(404)),
        }
    }
}

fn url(section: &str, cursor: Option<&str>) -> String {
    let mut url = format!("{BASE}/api/news?category={section}&limit=10");
    if let Some(cursor) = cursor {
        url.push_str(&format!("&cursor={cursor}"));
    }
    url
}

fn body(section: &str, ids: &[(&str, u64)], cursor: Option<&str>) -> String {
    let items: Vec<String> = ids
        .iter()
        .map(|(id, position)| {
            format!(r#"{{"id": "{id}", "title": "Story {id}", "category": "{section}", "position": {position}}}"#)
        })
        .collect();
    let cursor = cursor.map_or("null".to_string(), |c| format!("\"{c}\""));
    format!(r#"{{"items": [{}], "nextCursor": {cursor}}}"#, items.join(","))
}

fn setup() -> (SyncContext, Arc<ScriptedTransport>) {
    setup_with(Config::default())
}

fn setup_with(mut config: Config) -> (SyncContext, Arc<ScriptedTransport>) {
    config.endpoint.base_url = BASE.to_string();
    let transport = Arc::new(ScriptedTransport::default());
    let ctx = SyncContext::with_transport(config, transport.clone()).unwrap();
    (ctx, transport)
}

fn ids(ctx: &SyncContext, section: &str) -> Vec<String> {
    ctx.engine
        .snapshot(section)
        .articles
        .iter()
        .map(|a| a.id.clone())
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_refresh_into_empty_section() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0), ("a2", 1)], Some("c1")));

    let outcome = ctx.engine.refresh("tech").await;

    assert!(outcome.is_updated());
    assert_eq!(outcome.merge().unwrap().added, 2);
    let state = ctx.engine.snapshot("tech");
    assert_eq!(ids(&ctx, "tech"), ["a1", "a2"]);
    assert_eq!(state.version, 1);
    assert_eq!(state.cursor, Some(Cursor::new("c1")));
    assert_eq!(ctx.engine.status("tech"), RefreshStatus::Idle);
}

#[tokio::test]
async fn test_load_more_until_end_of_feed() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0), ("a2", 1)], Some("c1")));
    transport.reply(url("tech", Some("c1")), &body("tech", &[("a3", 2)], None));

    ctx.engine.refresh("tech").await;
    let outcome = ctx.engine.load_more("tech").await;

    assert!(outcome.is_updated());
    assert_eq!(ids(&ctx, "tech"), ["a1", "a2", "a3"]);
    assert!(ctx.engine.snapshot("tech").is_exhausted());

    assert_eq!(ctx.engine.load_more("tech").await, RefreshOutcome::AlreadyAtEnd);
    assert_eq!(transport.total_calls(), 2);
    assert_eq!(ctx.engine.status("tech"), RefreshStatus::Idle);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_articles() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0), ("a2", 1)], Some("c1")));
    transport.fail(url("tech", None), TransportError::Timeout);

    ctx.engine.refresh("tech").await;
    let before = ctx.engine.snapshot("tech");

    let outcome = ctx.engine.refresh("tech").await;

    let reason = FailureReason::Transport(TransportError::Timeout);
    assert_eq!(outcome, RefreshOutcome::Failed(reason.clone()));
    assert_eq!(*ctx.engine.snapshot("tech"), *before);
    assert_eq!(ctx.engine.status("tech"), RefreshStatus::Failed(reason));
}

#[tokio::test]
async fn test_refresh_discards_pagination_in_flight() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0), ("a2", 1)], Some("c1")));
    transport.reply(url("tech", None), &body("tech", &[("n1", 0), ("a1", 1)], Some("c1b")));
    let (started, release) = transport.hold(url("tech", Some("c1")), &body("tech", &[("a3", 2)], None));

    ctx.engine.refresh("tech").await;

    let engine = ctx.engine.clone();
    let paging = tokio::spawn(async move { engine.load_more("tech").await });
    started.await.unwrap();
    assert_eq!(ctx.engine.status("tech"), RefreshStatus::LoadingMore);

    let refreshed = ctx.engine.refresh("tech").await;
    assert!(refreshed.is_updated());
    let after_refresh = ctx.engine.snapshot("tech");

    let _ = release.send(());
    assert_eq!(paging.await.unwrap(), RefreshOutcome::Superseded);

    assert_eq!(ids(&ctx, "tech"), ["n1", "a1"]);
    assert_eq!(*ctx.engine.snapshot("tech"), *after_refresh);
    assert_eq!(ctx.engine.status("tech"), RefreshStatus::Idle);
}

// ============================================================================
// Coalescing and admission
// ============================================================================

#[tokio::test]
async fn test_concurrent_load_more_fetches_once() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));
    let (started, release) = transport.hold(url("tech", Some("c1")), &body("tech", &[("a2", 1)], Some("c2")));

    ctx.engine.refresh("tech").await;

    let engine = ctx.engine.clone();
    let first = tokio::spawn(async move { engine.load_more("tech").await });
    started.await.unwrap();

    let (second, _) = tokio::join!(ctx.engine.load_more("tech"), async {
        let _ = release.send(());
    });
    let first = first.await.unwrap();

    assert!(first.is_updated());
    assert_eq!(first, second);
    assert_eq!(transport.calls_to(&url("tech", Some("c1"))), 1);
    assert_eq!(ids(&ctx, "tech"), ["a1", "a2"]);
}

#[tokio::test]
async fn test_concurrent_refreshes_fetch_once() {
    let (ctx, transport) = setup();
    let (started, release) = transport.hold(url("tech", None), &body("tech", &[("a1", 0)], None));

    let engine = ctx.engine.clone();
    let first = tokio::spawn(async move { engine.refresh("tech").await });
    started.await.unwrap();

    let (second, _) = tokio::join!(ctx.engine.refresh("tech"), async {
        let _ = release.send(());
    });

    assert_eq!(first.await.unwrap(), second);
    assert_eq!(transport.total_calls(), 1);
    assert_eq!(ctx.engine.snapshot("tech").version, 1);
}

#[tokio::test]
async fn test_load_more_while_refreshing_is_rejected() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));
    let (started, release) = transport.hold(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));

    ctx.engine.refresh("tech").await;

    let engine = ctx.engine.clone();
    let refreshing = tokio::spawn(async move { engine.refresh("tech").await });
    started.await.unwrap();

    assert_eq!(ctx.engine.load_more("tech").await, RefreshOutcome::AlreadyInFlight);

    let _ = release.send(());
    assert!(refreshing.await.unwrap().is_updated());
    assert_eq!(transport.calls_to(&url("tech", Some("c1"))), 0);
}

#[tokio::test]
async fn test_reload_during_refresh_runs_after_it() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));
    transport.reply(url("tech", Some("c1")), &body("tech", &[("a2", 1)], Some("c2")));
    let (started, release) = transport.hold(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));
    transport.reply(url("tech", None), &body("tech", &[("n1", 0)], Some("c1")));

    ctx.engine.refresh("tech").await;
    ctx.engine.load_more("tech").await;

    let engine = ctx.engine.clone();
    let refreshing = tokio::spawn(async move { engine.refresh("tech").await });
    started.await.unwrap();

    let engine = ctx.engine.clone();
    let reloading = tokio::spawn(async move { engine.reload("tech").await });
    tokio::task::yield_now().await;

    let _ = release.send(());
    assert!(refreshing.await.unwrap().is_updated());
    assert!(reloading.await.unwrap().is_updated());

    assert_eq!(transport.calls_to(&url("tech", None)), 3);
    assert_eq!(ids(&ctx, "tech"), ["n1"]);
    assert_eq!(ctx.engine.status("tech"), RefreshStatus::Idle);
}

#[tokio::test]
async fn test_crashed_fetch_settles_status_without_callers() {
    let (ctx, transport) = setup();
    let (started, release) = transport.hold_panic(url("tech", None));
    let mut status = ctx.engine.watch("tech").status;

    let engine = ctx.engine.clone();
    let caller = tokio::spawn(async move { engine.refresh("tech").await });
    started.await.unwrap();
    caller.abort();
    let _ = caller.await;
    assert_eq!(ctx.engine.status("tech"), RefreshStatus::Refreshing);

    let _ = release.send(());
    let settled = tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.failure().is_some()),
    )
    .await
    .map(|changed| changed.is_ok());

    assert!(matches!(settled, Ok(true)));
    assert!(matches!(
        ctx.engine.status("tech"),
        RefreshStatus::Failed(FailureReason::Interrupted(_))
    ));
    assert!(ctx.engine.snapshot("tech").is_empty());
}

#[tokio::test]
async fn test_load_more_before_any_refresh_is_at_end() {
    let (ctx, transport) = setup();

    assert_eq!(ctx.engine.load_more("tech").await, RefreshOutcome::AlreadyAtEnd);
    assert_eq!(transport.total_calls(), 0);
    assert_eq!(ctx.engine.snapshot("tech").version, 0);
}

#[tokio::test]
async fn test_load_more_after_failure_is_rejected_until_refresh() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));
    transport.fail(url("tech", Some("c1")), TransportError::Network("reset".into()));
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));

    ctx.engine.refresh("tech").await;
    assert!(ctx.engine.load_more("tech").await.failure().is_some());
    assert_eq!(ctx.engine.load_more("tech").await, RefreshOutcome::AlreadyInFlight);

    assert!(ctx.engine.refresh("tech").await.is_updated());
    assert!(ctx.engine.status("tech").can_load_more());
}

// ============================================================================
// Failures, reload and multi-section refresh
// ============================================================================

#[tokio::test]
async fn test_decode_failure_is_reported() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), r#"{"items": [{"id": "a1"}]}"#);

    let outcome = ctx.engine.refresh("tech").await;

    assert!(matches!(
        outcome.failure(),
        Some(FailureReason::Decode(DecodeError::SchemaMismatch(_)))
    ));
    assert!(ctx.engine.snapshot("tech").is_empty());
    assert!(ctx.engine.status("tech").failure().is_some());
}

#[tokio::test]
async fn test_http_status_is_reported() {
    let (ctx, transport) = setup();
    transport.fail(url("tech", None), TransportError::HttpStatus(503));

    let outcome = ctx.engine.refresh("tech").await;

    assert_eq!(
        outcome,
        RefreshOutcome::Failed(FailureReason::Transport(TransportError::HttpStatus(503)))
    );
}

#[tokio::test]
async fn test_reload_drops_loaded_pages() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));
    transport.reply(url("tech", Some("c1")), &body("tech", &[("a2", 1), ("a3", 2)], Some("c2")));
    transport.reply(url("tech", None), &body("tech", &[("n1", 0)], Some("c1")));

    ctx.engine.refresh("tech").await;
    ctx.engine.load_more("tech").await;
    let outcome = ctx.engine.reload("tech").await;

    assert!(outcome.is_updated());
    assert_eq!(ids(&ctx, "tech"), ["n1"]);
    assert_eq!(ctx.engine.snapshot("tech").version, 3);
}

#[tokio::test]
async fn test_refresh_keeps_loaded_pages_beyond_window() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));
    transport.reply(url("tech", Some("c1")), &body("tech", &[("a2", 1)], Some("c2")));
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));

    ctx.engine.refresh("tech").await;
    ctx.engine.load_more("tech").await;
    ctx.engine.refresh("tech").await;

    assert_eq!(ids(&ctx, "tech"), ["a1", "a2"]);
}

#[tokio::test]
async fn test_refresh_many_reports_each_section() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("t1", 0)], None));
    transport.fail(url("sports", None), TransportError::Timeout);
    transport.reply(url("food", None), &body("food", &[("f1", 0), ("f2", 1)], Some("fc")));

    let outcomes = ctx.engine.refresh_many(&["tech", "sports", "food"]).await;

    let sections: Vec<&str> = outcomes.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(sections, ["tech", "sports", "food"]);
    assert!(outcomes[0].1.is_updated());
    assert!(outcomes[1].1.failure().is_some());
    assert!(outcomes[2].1.is_updated());

    assert_eq!(ctx.cache.combined(&["tech", "sports", "food"]).len(), 3);
    assert!(ctx.engine.snapshot("sports").is_empty());
}

#[tokio::test]
async fn test_watchers_see_state_and_status() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));
    let mut watch = ctx.engine.watch("tech");
    assert_eq!(watch.feed.borrow_and_update().version, 0);

    ctx.engine.refresh("tech").await;

    assert!(watch.feed.has_changed().unwrap());
    assert_eq!(watch.feed.borrow_and_update().len(), 1);
    assert_eq!(*watch.status.borrow_and_update(), RefreshStatus::Idle);
}

#[tokio::test]
async fn test_large_bodies_decode_off_the_runtime() {
    let mut config = Config::default();
    config.sync.decode_offload_bytes = 0;
    let (ctx, transport) = setup_with(config);
    transport.reply(url("tech", None), &body("tech", &[("a1", 0), ("a2", 1)], None));

    let outcome = ctx.engine.refresh("tech").await;

    assert!(outcome.is_updated());
    assert_eq!(ids(&ctx, "tech"), ["a1", "a2"]);
}

#[tokio::test]
async fn test_versions_never_decrease() {
    let (ctx, transport) = setup();
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));
    transport.reply(url("tech", Some("c1")), &body("tech", &[("a2", 1)], Some("c2")));
    transport.fail(url("tech", Some("c2")), TransportError::Timeout);
    transport.reply(url("tech", None), &body("tech", &[("a1", 0)], Some("c1")));
    transport.reply(url("tech", Some("c1")), &body("tech", &[("a2", 1)], Some("c2")));

    let mut last = 0;
    for step in 0..5 {
        match step {
            0 | 3 => ctx.engine.refresh("tech").await,
            _ => ctx.engine.load_more("tech").await,
        };
        let version = ctx.engine.snapshot("tech").version;
        assert!(version >= last, "version went from {last} to {version}");
        last = version;
    }
}
