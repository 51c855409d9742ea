//! Event-script replay.
//!
//! # Responsibilities
//! - Load a JSON script of recorded proxy events and observer actions
//! - Feed it through the correlator the way a proxy engine would
//! - Report what the observer ended up seeing
//!
//! # Design Decisions
//! - Each handle gets its own worker task, like a proxy connection task:
//!   events for one handle are delivered in script order, events for
//!   different handles interleave freely
//! - Observer steps (`remove`, `wait`) run on the driver, so they race with
//!   in-flight events; scripts use `wait` to order them
//! - All workers are drained before the replay returns

pub mod script;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::correlator::{
    BeforeRequest, BeforeResponse, BodyFetchError, BodySource, DataTransfer, EventCorrelator,
    ProxyEvent, RequestHead, ResponseHead, TunnelConnectRequest, TunnelConnectResponse,
};
use crate::observer::SessionList;
use crate::session::SessionHandle;

pub use script::{BodySpec, Script, Step};

/// Error type for script loading.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid script: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read a script from a JSON file.
pub fn load_script(path: &Path) -> Result<Script, ReplayError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Counts of what a replay did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub removals: usize,
}

/// Drives a script through a correlator and its observer list.
pub struct Replay {
    correlator: EventCorrelator,
    list: Arc<SessionList>,
}

impl Replay {
    pub fn new(correlator: EventCorrelator, list: Arc<SessionList>) -> Self {
        Self { correlator, list }
    }

    pub async fn run(&self, script: Script) -> ReplaySummary {
        let mut summary = ReplaySummary::default();
        let mut connections: HashMap<SessionHandle, mpsc::UnboundedSender<ProxyEvent>> =
            HashMap::new();
        let mut workers = JoinSet::new();

        for step in script.steps {
            match step {
                Step::Remove { handle } => {
                    self.list.remove(handle);
                    summary.removals += 1;
                }
                Step::Wait { ms } => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                step => {
                    let Some(event) = into_event(step) else {
                        continue;
                    };
                    summary.events += 1;
                    let tx = connections.entry(event.handle()).or_insert_with(|| {
                        let (tx, rx) = mpsc::unbounded_channel();
                        workers.spawn(connection_worker(self.correlator.clone(), rx));
                        tx
                    });
                    if tx.send(event).is_err() {
                        tracing::error!("Replay connection worker exited early");
                    }
                }
            }
        }

        drop(connections);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Replay connection worker failed");
            }
        }
        tracing::info!(events = summary.events, removals = summary.removals, "Replay finished");
        summary
    }
}

/// Delivers one handle's events in order, like a proxy connection task.
async fn connection_worker(
    correlator: EventCorrelator,
    mut rx: mpsc::UnboundedReceiver<ProxyEvent>,
) {
    while let Some(event) = rx.recv().await {
        correlator.dispatch(event).await;
    }
}

fn body_source(spec: BodySpec) -> Option<BodySource> {
    let delay = Duration::from_millis(spec.body_delay_ms);
    if let Some(message) = spec.body_error {
        return Some(BodySource::new(async move {
            tokio::time::sleep(delay).await;
            Err(BodyFetchError::Io(message))
        }));
    }
    spec.body.map(|text| {
        BodySource::new(async move {
            tokio::time::sleep(delay).await;
            Ok(text.into_bytes())
        })
    })
}

/// Convert a proxy-event step; observer steps return `None`.
fn into_event(step: Step) -> Option<ProxyEvent> {
    let event = match step {
        Step::TunnelConnectRequest {
            handle,
            uri,
            version,
            headers,
        } => ProxyEvent::TunnelConnectRequest(TunnelConnectRequest {
            handle,
            head: RequestHead::new("CONNECT", uri, version).with_headers(headers),
        }),
        Step::TunnelConnectResponse { handle } => {
            ProxyEvent::TunnelConnectResponse(TunnelConnectResponse { handle })
        }
        Step::BeforeRequest {
            handle,
            method,
            uri,
            version,
            headers,
            body,
        } => ProxyEvent::BeforeRequest(BeforeRequest {
            handle,
            head: RequestHead::new(method, uri, version).with_headers(headers),
            body: body_source(body),
        }),
        Step::BeforeResponse {
            handle,
            status_code,
            status_text,
            version,
            headers,
            body,
        } => ProxyEvent::BeforeResponse(BeforeResponse {
            handle,
            head: ResponseHead::new(status_code, status_text, version).with_headers(headers),
            body: body_source(body),
        }),
        Step::DataSent { handle, count } => ProxyEvent::DataSent(DataTransfer { handle, count }),
        Step::DataReceived { handle, count } => {
            ProxyEvent::DataReceived(DataTransfer { handle, count })
        }
        Step::Remove { .. } | Step::Wait { .. } => return None,
    };
    Some(event)
}
