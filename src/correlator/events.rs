//! Proxy lifecycle events consumed by the correlator.
//!
//! The proxy engine constructs these and hands them to
//! [`EventCorrelator`](crate::correlator::EventCorrelator). Body bytes are not
//! part of the event: a [`BodySource`] is an asynchronous accessor the
//! correlator pulls from after the session is already visible.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::session::{HeaderSet, SessionHandle};

/// Failure reported by the proxy engine (or raised locally) while fetching a body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BodyFetchError {
    #[error("body read failed: {0}")]
    Io(String),

    #[error("body truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: u64, received: u64 },

    #[error("body read aborted by the proxy engine")]
    Aborted,

    #[error("body fetch timed out after {0} ms")]
    Timeout(u64),
}

type BodyFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, BodyFetchError>> + Send + 'static>>;

/// Deferred body retrieval. Its presence on an event is the "has body" flag.
pub struct BodySource {
    fetch: BodyFuture,
}

impl BodySource {
    pub fn new<F>(fetch: F) -> Self
    where
        F: Future<Output = Result<Vec<u8>, BodyFetchError>> + Send + 'static,
    {
        Self {
            fetch: Box::pin(fetch),
        }
    }

    /// A body that is already buffered.
    pub fn ready(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self::new(async move { Ok(bytes) })
    }

    /// A fetch that fails immediately.
    pub fn failed(error: BodyFetchError) -> Self {
        Self::new(async move { Err(error) })
    }

    /// Drive the fetch to completion.
    pub async fn fetch(self) -> Result<Vec<u8>, BodyFetchError> {
        self.fetch.await
    }
}

impl fmt::Debug for BodySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodySource").finish_non_exhaustive()
    }
}

/// Request line and headers as reported by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: HeaderSet,
}

impl RequestHead {
    pub fn new(
        method: impl Into<String>,
        uri: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            version: version.into(),
            headers: HeaderSet::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderSet) -> Self {
        self.headers = headers;
        self
    }
}

/// Status line and headers as reported by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status_code: u16,
    pub status_text: String,
    pub version: String,
    pub headers: HeaderSet,
}

impl ResponseHead {
    pub fn new(
        status_code: u16,
        status_text: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            version: version.into(),
            headers: HeaderSet::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderSet) -> Self {
        self.headers = headers;
        self
    }
}

/// A CONNECT request opened a tunnel.
#[derive(Debug)]
pub struct TunnelConnectRequest {
    pub handle: SessionHandle,
    pub head: RequestHead,
}

/// The upstream answered a CONNECT request.
#[derive(Debug)]
pub struct TunnelConnectResponse {
    pub handle: SessionHandle,
}

/// A request is about to be forwarded upstream.
#[derive(Debug)]
pub struct BeforeRequest {
    pub handle: SessionHandle,
    pub head: RequestHead,
    pub body: Option<BodySource>,
}

/// A response is about to be returned to the client.
#[derive(Debug)]
pub struct BeforeResponse {
    pub handle: SessionHandle,
    pub head: ResponseHead,
    pub body: Option<BodySource>,
}

/// Tunnel traffic in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTransfer {
    pub handle: SessionHandle,
    pub count: u64,
}

/// Any lifecycle event, for callers that route events generically.
#[derive(Debug)]
pub enum ProxyEvent {
    TunnelConnectRequest(TunnelConnectRequest),
    TunnelConnectResponse(TunnelConnectResponse),
    BeforeRequest(BeforeRequest),
    BeforeResponse(BeforeResponse),
    DataSent(DataTransfer),
    DataReceived(DataTransfer),
}

impl ProxyEvent {
    pub fn handle(&self) -> SessionHandle {
        match self {
            ProxyEvent::TunnelConnectRequest(e) => e.handle,
            ProxyEvent::TunnelConnectResponse(e) => e.handle,
            ProxyEvent::BeforeRequest(e) => e.handle,
            ProxyEvent::BeforeResponse(e) => e.handle,
            ProxyEvent::DataSent(e) | ProxyEvent::DataReceived(e) => e.handle,
        }
    }

    /// Metric/log label for the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            ProxyEvent::TunnelConnectRequest(_) => "tunnel_connect_request",
            ProxyEvent::TunnelConnectResponse(_) => "tunnel_connect_response",
            ProxyEvent::BeforeRequest(_) => "before_request",
            ProxyEvent::BeforeResponse(_) => "before_response",
            ProxyEvent::DataSent(_) => "data_sent",
            ProxyEvent::DataReceived(_) => "data_received",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_body_source_variants() {
        assert_eq!(BodySource::ready("hi").fetch().await.unwrap(), b"hi".to_vec());

        let err = BodySource::failed(BodyFetchError::Aborted).fetch().await.unwrap_err();
        assert_eq!(err, BodyFetchError::Aborted);
    }

    #[test]
    fn test_error_display() {
        let err = BodyFetchError::Truncated {
            expected: 100,
            received: 40,
        };
        assert_eq!(err.to_string(), "body truncated: expected 100 bytes, received 40");
    }

    #[test]
    fn test_event_handle_and_name() {
        let event = ProxyEvent::DataReceived(DataTransfer {
            handle: SessionHandle(2),
            count: 500,
        });
        assert_eq!(event.handle(), SessionHandle(2));
        assert_eq!(event.name(), "data_received");
    }
}
