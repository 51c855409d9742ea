//! Shared utilities for correlator integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use session_correlator::config::CaptureConfig;
use session_correlator::correlator::{
    BeforeRequest, BeforeResponse, BodyFetchError, BodySource, DataTransfer, RequestHead,
    ResponseHead, TunnelConnectRequest,
};
use session_correlator::observer::{ObserverEvent, ObserverSender, SessionList};
use session_correlator::session::{HeaderSet, SessionHandle, SessionStore};
use session_correlator::EventCorrelator;

/// Correlator wired to a session list, with the raw observer channel exposed.
pub struct Harness {
    pub correlator: EventCorrelator,
    pub store: SessionStore,
    pub list: Arc<SessionList>,
    pub rx: mpsc::UnboundedReceiver<ObserverEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_capture(CaptureConfig::default())
    }

    pub fn with_capture(capture: CaptureConfig) -> Self {
        let (notifier, rx) = ObserverSender::channel();
        let store = SessionStore::new(notifier);
        let list = Arc::new(SessionList::new(store.clone()));
        let correlator = EventCorrelator::new(store.clone(), capture);
        Self {
            correlator,
            store,
            list,
            rx,
        }
    }

    /// Take every notification queued so far.
    pub fn drain(&mut self) -> Vec<ObserverEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn added_count(&mut self) -> usize {
        self.drain()
            .iter()
            .filter(|e| matches!(e, ObserverEvent::Added(_)))
            .count()
    }
}

pub fn request(handle: u64, method: &str, uri: &str, headers: &[(&str, &str)]) -> BeforeRequest {
    BeforeRequest {
        handle: SessionHandle(handle),
        head: RequestHead::new(method, uri, "HTTP/1.1")
            .with_headers(headers.iter().copied().collect::<HeaderSet>()),
        body: None,
    }
}

pub fn response(
    handle: u64,
    status: u16,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> BeforeResponse {
    BeforeResponse {
        handle: SessionHandle(handle),
        head: ResponseHead::new(status, "OK", "HTTP/1.1")
            .with_headers(headers.iter().copied().collect::<HeaderSet>()),
        body: body.map(|b| BodySource::ready(b.as_bytes().to_vec())),
    }
}

pub fn connect(handle: u64, authority: &str) -> TunnelConnectRequest {
    TunnelConnectRequest {
        handle: SessionHandle(handle),
        head: RequestHead::new("CONNECT", authority, "HTTP/1.1"),
    }
}

pub fn data(handle: u64, count: u64) -> DataTransfer {
    DataTransfer {
        handle: SessionHandle(handle),
        count,
    }
}

/// A body whose fetch completes only when the returned sender fires.
pub fn gated_body() -> (BodySource, oneshot::Sender<Vec<u8>>) {
    let (tx, rx) = oneshot::channel();
    let source = BodySource::new(async move { rx.await.map_err(|_| BodyFetchError::Aborted) });
    (source, tx)
}
