//! End-to-end correlation behaviour under sequential and concurrent delivery.

use std::sync::Arc;
use std::time::Duration;

use session_correlator::correlator::BodySource;
use session_correlator::observer::{ObserverBridge, ObserverDispatcher, ObserverEvent, SessionList};
use session_correlator::session::{SessionHandle, SessionRecord, SessionState, SessionStore};
use session_correlator::{EventCorrelator, Shutdown};

mod common;

use common::{connect, data, gated_body, request, response, Harness};

#[tokio::test]
async fn test_request_then_response_scenario() {
    let mut h = Harness::new();

    h.correlator
        .on_before_request(request(1, "GET", "http://x/", &[("Host", "x")]))
        .await;

    assert_eq!(h.added_count(), 1);
    let record = h.store.lookup(SessionHandle(1)).unwrap();
    assert_eq!(record.method(), Some("GET"));
    assert!(record.request_body().is_none());

    h.correlator
        .on_before_response(response(1, 200, &[("Content-Type", "text/plain")], Some("hi")))
        .await;

    assert_eq!(record.status_code(), Some(200));
    assert_eq!(record.response_body(), Some(&b"hi"[..]));
    assert_eq!(record.state(), SessionState::ResponseCaptured);
    assert_eq!(
        record.response().unwrap().headers.get("content-type"),
        Some("text/plain")
    );
    assert_eq!(record.response_body_preview(1024), "68 69");
}

#[tokio::test]
async fn test_data_for_unknown_handle_creates_nothing() {
    let mut h = Harness::new();

    for _ in 0..10 {
        h.correlator.on_data_received(data(2, 500));
        assert!(h.store.lookup(SessionHandle(2)).is_none());
    }

    assert!(h.store.is_empty());
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn test_counters_sum_all_increments() {
    let mut h = Harness::new();

    h.correlator.on_tunnel_connect_request(connect(3, "example.com:443"));
    h.correlator
        .on_before_response(response(3, 200, &[], None))
        .await;

    let sent = [10u64, 20, 30];
    let received = [1u64, 2, 3, 4];
    for n in sent {
        h.correlator.on_data_sent(data(3, n));
    }
    for n in received {
        h.correlator.on_data_received(data(3, n));
    }

    let record = h.store.lookup(SessionHandle(3)).unwrap();
    assert_eq!(record.sent_bytes(), 60);
    assert_eq!(record.received_bytes(), 10);
    assert_eq!(record.method(), Some("CONNECT"));
    assert!(record.response().is_some());
    assert_eq!(h.added_count(), 1);
}

#[tokio::test]
async fn test_removed_handle_is_not_resurrected() {
    let mut h = Harness::new();

    h.correlator
        .on_before_request(request(4, "GET", "http://x/", &[]))
        .await;
    assert!(h.list.remove(SessionHandle(4)));
    h.drain();

    h.correlator
        .on_before_response(response(4, 200, &[], Some("late")))
        .await;
    h.correlator.on_data_sent(data(4, 100));
    h.correlator.on_data_received(data(4, 100));

    assert!(h.store.lookup(SessionHandle(4)).is_none());
    assert!(h.store.is_empty());
    assert!(h.drain().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_data_events_lose_no_updates() {
    const N: u64 = 1_000;
    const K: u64 = 37;

    let h = Harness::new();
    h.correlator.on_tunnel_connect_request(connect(5, "example.com:443"));

    let tasks: Vec<_> = (0..N)
        .map(|_| {
            let correlator = h.correlator.clone();
            tokio::spawn(async move { correlator.on_data_received(data(5, K)) })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let record = h.store.lookup(SessionHandle(5)).unwrap();
    assert_eq!(record.received_bytes(), N * K);
}

#[tokio::test]
async fn test_body_discarded_when_removed_mid_fetch() {
    let mut h = Harness::new();
    let (body, release) = gated_body();

    let mut event = request(6, "POST", "http://x/upload", &[]);
    event.body = Some(body);

    let correlator = h.correlator.clone();
    let pending = tokio::spawn(async move { correlator.on_before_request(event).await });

    // Wait until the session is announced, then delete it before the body arrives.
    let record = loop {
        if let Some(record) = h.store.lookup(SessionHandle(6)) {
            break record;
        }
        tokio::task::yield_now().await;
    };
    h.list.remove(SessionHandle(6));

    release.send(b"payload".to_vec()).unwrap();
    pending.await.unwrap();

    assert!(record.request_body().is_none());
    assert!(h.store.lookup(SessionHandle(6)).is_none());
    // Only the add; the discarded body produces no change notification.
    let events = h.drain();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ObserverEvent::Added(_)));
}

#[tokio::test]
async fn test_other_handles_progress_during_body_fetch() {
    let h = Harness::new();
    let (body, release) = gated_body();

    let mut slow = request(7, "POST", "http://x/slow", &[]);
    slow.body = Some(body);
    let correlator = h.correlator.clone();
    let pending = tokio::spawn(async move { correlator.on_before_request(slow).await });

    h.correlator
        .on_before_request(request(8, "GET", "http://x/fast", &[]))
        .await;
    h.correlator
        .on_before_response(response(8, 204, &[], None))
        .await;
    assert_eq!(h.store.lookup(SessionHandle(8)).unwrap().status_code(), Some(204));

    release.send(b"slow body".to_vec()).unwrap();
    pending.await.unwrap();
    let slow = h.store.lookup(SessionHandle(7)).unwrap();
    assert_eq!(slow.request_body(), Some(&b"slow body"[..]));
}

#[tokio::test]
async fn test_request_body_fetched_after_announce() {
    let mut h = Harness::new();
    let mut event = request(9, "PUT", "http://x/item", &[("Content-Length", "3")]);
    event.body = Some(BodySource::ready(b"abc".to_vec()));

    h.correlator.on_before_request(event).await;

    let events = h.drain();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], ObserverEvent::Added(_)));
    assert!(matches!(events[1], ObserverEvent::Changed(_)));

    let record = events[1].record();
    assert_eq!(record.request_body(), Some(&b"abc"[..]));
    assert_eq!(record.request_body_preview(2), "61 62");
    assert_eq!(
        record.request_header_text(),
        "PUT http://x/item HTTP/1.1\r\nContent-Length: 3\r\n\r\n"
    );
}

struct CountingObserver {
    list: SessionList,
    changes: std::sync::atomic::AtomicUsize,
}

impl ObserverBridge for CountingObserver {
    fn session_added(&self, record: Arc<SessionRecord>) {
        self.list.session_added(record);
    }

    fn session_changed(&self, record: Arc<SessionRecord>) {
        self.changes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.list.session_changed(record);
    }
}

#[tokio::test]
async fn test_dispatcher_delivers_to_session_list() {
    let shutdown = Shutdown::new();
    let (notifier, rx) = session_correlator::ObserverSender::channel();
    let store = SessionStore::new(notifier);
    let observer = Arc::new(CountingObserver {
        list: SessionList::new(store.clone()),
        changes: Default::default(),
    });
    let dispatcher =
        tokio::spawn(ObserverDispatcher::new(rx, observer.clone()).run(shutdown.subscribe()));

    let correlator = EventCorrelator::new(store.clone(), Default::default());
    let flush = correlator.spawn_counter_flush(Duration::from_millis(10), shutdown.subscribe());

    correlator.on_tunnel_connect_request(connect(1, "a.example:443"));
    correlator
        .on_before_request(request(2, "GET", "http://b.example/", &[]))
        .await;
    for _ in 0..50 {
        correlator.on_data_sent(data(1, 10));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown.trigger();
    flush.await.unwrap();
    dispatcher.await.unwrap();

    let handles: Vec<_> = observer.list.sessions().iter().map(|r| r.handle()).collect();
    assert_eq!(handles, vec![SessionHandle(1), SessionHandle(2)]);
    // Fifty byte events coalesce into far fewer notifications.
    let changes = observer.changes.load(std::sync::atomic::Ordering::SeqCst);
    assert!(changes >= 1 && changes < 50, "got {} change notifications", changes);
    assert_eq!(observer.list.get(SessionHandle(1)).unwrap().sent_bytes(), 500);
}
