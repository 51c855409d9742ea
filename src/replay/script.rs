//! JSON event-script format.

use serde::{Deserialize, Serialize};

use crate::session::{HeaderSet, SessionHandle};

/// A recorded sequence of proxy events and observer actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

fn default_version() -> String {
    "HTTP/1.1".to_string()
}

/// Simulated body payload attached to a request or response step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodySpec {
    /// UTF-8 body text. Absent means the message has no body.
    pub body: Option<String>,

    /// Delay before the body fetch completes, in milliseconds.
    pub body_delay_ms: u64,

    /// If set, the body fetch fails with this message instead.
    pub body_error: Option<String>,
}

/// One line of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    TunnelConnectRequest {
        handle: SessionHandle,
        uri: String,
        #[serde(default = "default_version")]
        version: String,
        #[serde(default)]
        headers: HeaderSet,
    },
    TunnelConnectResponse {
        handle: SessionHandle,
    },
    BeforeRequest {
        handle: SessionHandle,
        method: String,
        uri: String,
        #[serde(default = "default_version")]
        version: String,
        #[serde(default)]
        headers: HeaderSet,
        #[serde(flatten)]
        body: BodySpec,
    },
    BeforeResponse {
        handle: SessionHandle,
        status_code: u16,
        #[serde(default)]
        status_text: String,
        #[serde(default = "default_version")]
        version: String,
        #[serde(default)]
        headers: HeaderSet,
        #[serde(flatten)]
        body: BodySpec,
    },
    DataSent {
        handle: SessionHandle,
        count: u64,
    },
    DataReceived {
        handle: SessionHandle,
        count: u64,
    },
    /// Observer deletes the session.
    Remove {
        handle: SessionHandle,
    },
    /// Pause before the next step.
    Wait {
        ms: u64,
    },
}
