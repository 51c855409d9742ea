//! Session identity types and error definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque token the proxy engine attaches to every event of one logical session.
///
/// Equal handles mean the same session; the engine never reuses a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(pub u64);

impl From<u64> for SessionHandle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Process-local sequence number assigned by the store when a record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised by session records and the session store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A write-once field was written a second time.
    #[error("session {id}: {field} already captured")]
    InvalidState { id: SessionId, field: &'static str },

    /// The handle is already registered in the store.
    #[error("handle {0} is already registered")]
    DuplicateHandle(SessionHandle),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Position of a session in its event lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Registered, no metadata yet.
    Announced,
    /// Request line and headers captured.
    RequestCaptured,
    /// Response status and headers captured.
    ResponseCaptured,
    /// CONNECT tunnel announced.
    TunnelEstablished,
    /// Deleted by the observer.
    Removed,
}
