//! Proxy event correlation.
//!
//! # Data Flow
//! ```text
//! proxy engine (one task per connection)
//!     → EventCorrelator::on_* (reentrant, never returns an error)
//!     → SessionStore create / lookup by handle
//!     → SessionRecord capture
//!     → ObserverSender (added / changed)
//!     → [before-request / before-response only]
//!         BodySource fetch (suspend point, no locks held)
//!         → lookup again → write body if session still registered
//! ```
//!
//! # Per-handle states
//! ```text
//! Announced → RequestCaptured → ResponseCaptured
//! Announced → TunnelEstablished
//! any → Removed (observer deletion)
//! ```
//!
//! # Design Decisions
//! - Unknown handles on response / tunnel-response / data events are an
//!   expected race with observer deletion: trace log, metric, no error
//! - A body fetched for a session removed mid-fetch is discarded
//! - Byte-counter events only mark the record dirty; a periodic flush sends
//!   one coalesced change notification per dirty record

pub mod events;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::CaptureConfig;
use crate::observability::metrics;
use crate::session::{HeaderSet, SessionError, SessionHandle, SessionRecord, SessionStore};

pub use events::{
    BeforeRequest, BeforeResponse, BodyFetchError, BodySource, DataTransfer, ProxyEvent,
    RequestHead, ResponseHead, TunnelConnectRequest, TunnelConnectResponse,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyDirection {
    Request,
    Response,
}

impl BodyDirection {
    fn label(self) -> &'static str {
        match self {
            BodyDirection::Request => "request",
            BodyDirection::Response => "response",
        }
    }
}

/// Turns proxy lifecycle events into session records.
///
/// Cheap to clone; clones share the same store.
#[derive(Debug, Clone)]
pub struct EventCorrelator {
    store: SessionStore,
    capture: CaptureConfig,
}

impl EventCorrelator {
    pub fn new(store: SessionStore, capture: CaptureConfig) -> Self {
        Self { store, capture }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Route an event to its handler.
    pub async fn dispatch(&self, event: ProxyEvent) {
        match event {
            ProxyEvent::TunnelConnectRequest(e) => self.on_tunnel_connect_request(e),
            ProxyEvent::TunnelConnectResponse(e) => self.on_tunnel_connect_response(e),
            ProxyEvent::BeforeRequest(e) => self.on_before_request(e).await,
            ProxyEvent::BeforeResponse(e) => self.on_before_response(e).await,
            ProxyEvent::DataSent(e) => self.on_data_sent(e),
            ProxyEvent::DataReceived(e) => self.on_data_received(e),
        }
    }

    /// A CONNECT tunnel was requested.
    pub fn on_tunnel_connect_request(&self, event: TunnelConnectRequest) {
        metrics::record_event("tunnel_connect_request");
        let Some((record, is_new)) = self.announce(event.handle) else {
            return;
        };

        let head = event.head;
        self.capture_request(&record, head.method, head.uri, head.version, head.headers);
        record.mark_tunnel();
        self.publish(&record, is_new);
    }

    /// The CONNECT tunnel was answered; refresh the observer's view.
    pub fn on_tunnel_connect_response(&self, event: TunnelConnectResponse) {
        metrics::record_event("tunnel_connect_response");
        if let Some(record) = self.lookup(event.handle, "tunnel_connect_response") {
            record.notify_changed();
        }
    }

    /// A request is about to go upstream.
    ///
    /// Returns once the request body (if any) has been fetched or skipped.
    pub async fn on_before_request(&self, event: BeforeRequest) {
        metrics::record_event("before_request");
        let handle = event.handle;
        let Some((record, is_new)) = self.announce(handle) else {
            return;
        };

        let head = event.head;
        self.capture_request(&record, head.method, head.uri, head.version, head.headers);
        // Visible before the body is available.
        self.publish(&record, is_new);

        if let Some(body) = event.body {
            self.capture_body(handle, record, body, BodyDirection::Request)
                .await;
        }
    }

    /// A response is about to go back to the client.
    pub async fn on_before_response(&self, event: BeforeResponse) {
        metrics::record_event("before_response");
        let handle = event.handle;
        let Some(record) = self.lookup(handle, "before_response") else {
            return;
        };

        let head = event.head;
        if let Err(e) = record.capture_response_metadata(
            head.status_code,
            head.status_text,
            head.version,
            head.headers,
        ) {
            Self::report_invalid_state(handle, &e);
            return;
        }
        record.notify_changed();

        if let Some(body) = event.body {
            self.capture_body(handle, record, body, BodyDirection::Response)
                .await;
        }
    }

    /// Client-to-server tunnel bytes.
    pub fn on_data_sent(&self, event: DataTransfer) {
        if let Some(record) = self.lookup(event.handle, "data_sent") {
            record.add_sent_bytes(event.count);
            metrics::record_tunnel_bytes("sent", event.count);
        }
    }

    /// Server-to-client tunnel bytes.
    pub fn on_data_received(&self, event: DataTransfer) {
        if let Some(record) = self.lookup(event.handle, "data_received") {
            record.add_received_bytes(event.count);
            metrics::record_tunnel_bytes("received", event.count);
        }
    }

    /// Send one change notification per record whose byte counters moved.
    pub fn flush_counters(&self) -> usize {
        let dirty = self.store.take_dirty_counters();
        for record in &dirty {
            record.notify_changed();
        }
        dirty.len()
    }

    /// Periodically flush coalesced byte-counter notifications until shutdown.
    pub async fn run_counter_flush(
        self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Counter flush starting");
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_counters();
                }
                _ = shutdown.recv() => {
                    self.flush_counters();
                    tracing::debug!("Counter flush received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub fn spawn_counter_flush(
        &self,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.clone().run_counter_flush(interval, shutdown))
    }

    // --- Internals ---

    /// Find or create the record for an earliest-hook event.
    ///
    /// Returns the record and whether it was created by this call.
    fn announce(&self, handle: SessionHandle) -> Option<(Arc<SessionRecord>, bool)> {
        if let Some(record) = self.store.lookup(handle) {
            return Some((record, false));
        }
        match self.store.create_and_register(handle) {
            Ok(record) => Some((record, true)),
            Err(e) => {
                tracing::error!(
                    handle = %handle,
                    error = %e,
                    "Concurrent registration for one handle"
                );
                if cfg!(debug_assertions) {
                    panic!("correlator sequencing bug: {e}");
                }
                // Keep the record that won; it may already be gone again.
                self.store.lookup(handle).map(|record| (record, false))
            }
        }
    }

    fn lookup(&self, handle: SessionHandle, event: &'static str) -> Option<Arc<SessionRecord>> {
        let record = self.store.lookup(handle);
        if record.is_none() {
            metrics::record_unknown_handle(event);
            tracing::trace!(handle = %handle, event, "Event for unknown handle ignored");
        }
        record
    }

    fn capture_request(
        &self,
        record: &SessionRecord,
        method: String,
        uri: String,
        version: String,
        headers: HeaderSet,
    ) {
        if let Err(e) = record.capture_request_metadata(method, uri, version, headers) {
            Self::report_invalid_state(record.handle(), &e);
        }
    }

    fn publish(&self, record: &Arc<SessionRecord>, is_new: bool) {
        if is_new {
            self.store.notifier().session_added(Arc::clone(record));
        } else {
            record.notify_changed();
        }
    }

    fn report_invalid_state(handle: SessionHandle, error: &SessionError) {
        metrics::record_invalid_state();
        tracing::error!(handle = %handle, error = %error, "Session capture rejected");
    }

    /// Fetch a body and write it back if the session is still registered.
    ///
    /// No store or record lock is held across the fetch.
    async fn capture_body(
        &self,
        handle: SessionHandle,
        record: Arc<SessionRecord>,
        body: BodySource,
        direction: BodyDirection,
    ) {
        let enabled = match direction {
            BodyDirection::Request => self.capture.request_bodies,
            BodyDirection::Response => self.capture.response_bodies,
        };
        if !enabled {
            metrics::record_body_fetch(direction.label(), "skipped");
            tracing::debug!(
                handle = %handle,
                direction = direction.label(),
                "Body capture disabled, fetch skipped"
            );
            return;
        }

        let timeout_ms = self.capture.body_fetch_timeout_ms;
        let result = match time::timeout(Duration::from_millis(timeout_ms), body.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(BodyFetchError::Timeout(timeout_ms)),
        };

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                metrics::record_body_fetch(direction.label(), "failed");
                tracing::warn!(
                    handle = %handle,
                    direction = direction.label(),
                    error = %e,
                    "Body fetch failed"
                );
                return;
            }
        };

        let current = self
            .store
            .lookup(handle)
            .filter(|current| Arc::ptr_eq(current, &record));
        let Some(record) = current else {
            metrics::record_body_fetch(direction.label(), "discarded");
            tracing::debug!(
                handle = %handle,
                direction = direction.label(),
                len = bytes.len(),
                "Session removed during body fetch, body discarded"
            );
            return;
        };

        let written = match direction {
            BodyDirection::Request => record.set_request_body(bytes),
            BodyDirection::Response => record.set_response_body(bytes),
        };
        match written {
            Ok(()) => {
                metrics::record_body_fetch(direction.label(), "captured");
                record.notify_changed();
            }
            Err(e) => Self::report_invalid_state(handle, &e),
        }
    }
}
