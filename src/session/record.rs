//! Per-session record.
//!
//! # Responsibilities
//! - Hold request/response metadata captured from proxy events
//! - Hold lazily fetched bodies
//! - Accumulate tunnel byte counters from the data-transfer stream
//! - Signal the observer when externally visible state changes
//!
//! # Design Decisions
//! - Write-once fields are `OnceLock`s: each has a single writer event type,
//!   so no record-level lock is needed
//! - Byte counters are atomics; the data-transfer path never locks
//! - The record keeps its handle only for store lookups; it does not own the
//!   proxy engine's event source

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::observer::ObserverSender;
use crate::session::headers::HeaderSet;
use crate::session::types::{SessionError, SessionHandle, SessionId, SessionResult, SessionState};

/// Default number of body bytes shown in a hex preview.
pub const DEFAULT_PREVIEW_BYTES: usize = 1024;

/// Request line and headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: HeaderSet,
}

/// Status line and headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub status_code: u16,
    pub status_text: String,
    pub version: String,
    pub headers: HeaderSet,
}

/// One proxied transaction or tunnel.
#[derive(Debug)]
pub struct SessionRecord {
    id: SessionId,
    handle: SessionHandle,
    request: OnceLock<RequestMetadata>,
    response: OnceLock<ResponseMetadata>,
    request_body: OnceLock<Vec<u8>>,
    response_body: OnceLock<Vec<u8>>,
    sent_bytes: AtomicU64,
    received_bytes: AtomicU64,
    tunnel: AtomicBool,
    removed: AtomicBool,
    /// Set by byte-counter updates, cleared when a coalesced notification is sent.
    counters_dirty: AtomicBool,
    notifier: ObserverSender,
}

impl SessionRecord {
    pub(crate) fn new(id: SessionId, handle: SessionHandle, notifier: ObserverSender) -> Self {
        Self {
            id,
            handle,
            request: OnceLock::new(),
            response: OnceLock::new(),
            request_body: OnceLock::new(),
            response_body: OnceLock::new(),
            sent_bytes: AtomicU64::new(0),
            received_bytes: AtomicU64::new(0),
            tunnel: AtomicBool::new(false),
            removed: AtomicBool::new(false),
            counters_dirty: AtomicBool::new(false),
            notifier,
        }
    }

    // --- Capture ---

    /// Capture the request line and headers. Fails if already captured.
    pub fn capture_request_metadata(
        &self,
        method: impl Into<String>,
        uri: impl Into<String>,
        version: impl Into<String>,
        headers: HeaderSet,
    ) -> SessionResult<()> {
        let metadata = RequestMetadata {
            method: method.into(),
            uri: uri.into(),
            version: version.into(),
            headers,
        };
        self.request
            .set(metadata)
            .map_err(|_| self.invalid_state("request metadata"))
    }

    /// Capture the status line and headers. Fails if already captured.
    pub fn capture_response_metadata(
        &self,
        status_code: u16,
        status_text: impl Into<String>,
        version: impl Into<String>,
        headers: HeaderSet,
    ) -> SessionResult<()> {
        let metadata = ResponseMetadata {
            status_code,
            status_text: status_text.into(),
            version: version.into(),
            headers,
        };
        self.response
            .set(metadata)
            .map_err(|_| self.invalid_state("response metadata"))
    }

    pub fn set_request_body(&self, body: Vec<u8>) -> SessionResult<()> {
        self.request_body
            .set(body)
            .map_err(|_| self.invalid_state("request body"))
    }

    pub fn set_response_body(&self, body: Vec<u8>) -> SessionResult<()> {
        self.response_body
            .set(body)
            .map_err(|_| self.invalid_state("response body"))
    }

    /// Add to the client-to-server byte counter.
    pub fn add_sent_bytes(&self, n: u64) {
        self.sent_bytes.fetch_add(n, Ordering::Relaxed);
        self.counters_dirty.store(true, Ordering::Release);
    }

    /// Add to the server-to-client byte counter.
    pub fn add_received_bytes(&self, n: u64) {
        self.received_bytes.fetch_add(n, Ordering::Relaxed);
        self.counters_dirty.store(true, Ordering::Release);
    }

    pub(crate) fn mark_tunnel(&self) {
        self.tunnel.store(true, Ordering::Release);
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    /// Clear the dirty flag, returning whether counters changed since the last call.
    pub(crate) fn take_counters_dirty(&self) -> bool {
        self.counters_dirty.swap(false, Ordering::AcqRel)
    }

    /// Push an update signal for this record to the observer.
    pub fn notify_changed(self: &Arc<Self>) {
        self.notifier.session_changed(Arc::clone(self));
    }

    fn invalid_state(&self, field: &'static str) -> SessionError {
        SessionError::InvalidState { id: self.id, field }
    }

    // --- Accessors ---

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn request(&self) -> Option<&RequestMetadata> {
        self.request.get()
    }

    pub fn response(&self) -> Option<&ResponseMetadata> {
        self.response.get()
    }

    pub fn method(&self) -> Option<&str> {
        self.request().map(|r| r.method.as_str())
    }

    pub fn uri(&self) -> Option<&str> {
        self.request().map(|r| r.uri.as_str())
    }

    pub fn status_code(&self) -> Option<u16> {
        self.response().map(|r| r.status_code)
    }

    pub fn request_body(&self) -> Option<&[u8]> {
        self.request_body.get().map(Vec::as_slice)
    }

    pub fn response_body(&self) -> Option<&[u8]> {
        self.response_body.get().map(Vec::as_slice)
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes.load(Ordering::Relaxed)
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes.load(Ordering::Relaxed)
    }

    pub fn is_tunnel(&self) -> bool {
        self.tunnel.load(Ordering::Acquire)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Current lifecycle state, derived from what has been captured.
    pub fn state(&self) -> SessionState {
        if self.is_removed() {
            SessionState::Removed
        } else if self.response.get().is_some() {
            SessionState::ResponseCaptured
        } else if self.is_tunnel() {
            SessionState::TunnelEstablished
        } else if self.request.get().is_some() {
            SessionState::RequestCaptured
        } else {
            SessionState::Announced
        }
    }

    // --- Display helpers ---

    /// Request line followed by the header block, CRLF-terminated.
    pub fn request_header_text(&self) -> String {
        match self.request() {
            Some(r) => header_block(format!("{} {} {}", r.method, r.uri, r.version), &r.headers),
            None => String::new(),
        }
    }

    /// Status line followed by the header block, CRLF-terminated.
    pub fn response_header_text(&self) -> String {
        match self.response() {
            Some(r) => header_block(
                format!("{} {} {}", r.version, r.status_code, r.status_text),
                &r.headers,
            ),
            None => String::new(),
        }
    }

    pub fn request_body_preview(&self, limit: usize) -> String {
        hex_preview(self.request_body().unwrap_or_default(), limit)
    }

    pub fn response_body_preview(&self, limit: usize) -> String {
        hex_preview(self.response_body().unwrap_or_default(), limit)
    }

    /// Point-in-time copy for logging and serialization.
    pub fn snapshot(&self, preview_limit: usize) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            handle: self.handle,
            state: self.state(),
            tunnel: self.is_tunnel(),
            request: self.request().cloned(),
            response: self.response().cloned(),
            request_body_len: self.request_body().map(<[u8]>::len),
            response_body_len: self.response_body().map(<[u8]>::len),
            request_body_preview: self.request_body_preview(preview_limit),
            response_body_preview: self.response_body_preview(preview_limit),
            sent_bytes: self.sent_bytes(),
            received_bytes: self.received_bytes(),
        }
    }
}

/// Serializable view of a [`SessionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub handle: SessionHandle,
    pub state: SessionState,
    pub tunnel: bool,
    pub request: Option<RequestMetadata>,
    pub response: Option<ResponseMetadata>,
    pub request_body_len: Option<usize>,
    pub response_body_len: Option<usize>,
    pub request_body_preview: String,
    pub response_body_preview: String,
    pub sent_bytes: u64,
    pub received_bytes: u64,
}

fn header_block(start_line: String, headers: &HeaderSet) -> String {
    let mut text = start_line;
    text.push_str("\r\n");
    for line in headers.render() {
        text.push_str(&line);
        text.push_str("\r\n");
    }
    text.push_str("\r\n");
    text
}

/// Upper-case, space-separated hex of at most `limit` leading bytes.
pub fn hex_preview(bytes: &[u8], limit: usize) -> String {
    bytes
        .iter()
        .take(limit)
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
