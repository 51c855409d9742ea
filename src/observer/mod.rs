//! Observer notification subsystem.
//!
//! # Data Flow
//! ```text
//! correlator / record.notify_changed()
//!     → ObserverSender (unbounded mpsc, never blocks the proxy task)
//!     → dispatcher.rs (single task, serializes delivery)
//!     → ObserverBridge impl (e.g. list.rs SessionList)
//!
//! Deletion:
//!     observer → SessionList::remove(handle)
//!         → drop from visible list
//!         → SessionStore::remove(handle)
//! ```
//!
//! # Design Decisions
//! - Only two notifications: added and changed
//! - Observer code never runs inline on the proxy engine's event task
//! - A closed channel is not an error; the proxy must keep running

pub mod dispatcher;
pub mod list;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::session::record::SessionRecord;

pub use dispatcher::ObserverDispatcher;
pub use list::SessionList;

/// Presentation-side receiver of session notifications.
pub trait ObserverBridge: Send + Sync {
    /// A session became visible.
    fn session_added(&self, record: Arc<SessionRecord>);

    /// A visible session's state changed.
    fn session_changed(&self, record: Arc<SessionRecord>);
}

/// A notification in flight to the observer.
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    Added(Arc<SessionRecord>),
    Changed(Arc<SessionRecord>),
}

impl ObserverEvent {
    pub fn record(&self) -> &Arc<SessionRecord> {
        match self {
            ObserverEvent::Added(r) | ObserverEvent::Changed(r) => r,
        }
    }
}

/// Sending half of the observer channel, cloned into the store and every record.
#[derive(Debug, Clone)]
pub struct ObserverSender {
    tx: mpsc::UnboundedSender<ObserverEvent>,
}

impl ObserverSender {
    /// Create a sender and the receiver the presentation side drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ObserverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn session_added(&self, record: Arc<SessionRecord>) {
        self.send(ObserverEvent::Added(record));
    }

    pub fn session_changed(&self, record: Arc<SessionRecord>) {
        self.send(ObserverEvent::Changed(record));
    }

    fn send(&self, event: ObserverEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(session = %e.0.record().id(), "Observer channel closed, notification dropped");
        }
    }
}
