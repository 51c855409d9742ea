//! Observer-side session list.
//!
//! # Responsibilities
//! - Maintain the visible, ordered collection of sessions
//! - Track which sessions changed since the presentation layer last looked
//! - Provide the observer-driven delete path
//!
//! # Design Decisions
//! - Deletion removes from the visible list first, then from the store, all
//!   under the list lock; an `added` delivered concurrently either lands
//!   before the delete (and is retained away) or sees the removed flag
//! - An `added` notification for an already-removed record is ignored, so a
//!   late notification cannot resurrect a deleted session

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::observer::ObserverBridge;
use crate::session::{SessionHandle, SessionId, SessionRecord, SessionSnapshot, SessionStore};

#[derive(Default)]
struct ListState {
    visible: Vec<Arc<SessionRecord>>,
    changed: BTreeSet<SessionId>,
}

/// The presentation layer's view of all sessions.
pub struct SessionList {
    store: SessionStore,
    state: Mutex<ListState>,
}

impl SessionList {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            state: Mutex::new(ListState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().expect("session list mutex poisoned")
    }

    /// Delete a session from the view and from the store.
    ///
    /// Returns true if the session was visible. Safe to call for unknown handles.
    pub fn remove(&self, handle: SessionHandle) -> bool {
        // Lock order: list, then store shard. The store never takes the list lock.
        let mut state = self.state();
        let before = state.visible.len();
        state.visible.retain(|r| r.handle() != handle);
        let was_visible = state.visible.len() != before;

        if let Some(record) = self.store.remove(handle) {
            state.changed.remove(&record.id());
        }
        drop(state);
        tracing::debug!(handle = %handle, was_visible, "Session deleted by observer");
        was_visible
    }

    /// Visible sessions in creation order.
    pub fn sessions(&self) -> Vec<Arc<SessionRecord>> {
        self.state().visible.clone()
    }

    pub fn get(&self, handle: SessionHandle) -> Option<Arc<SessionRecord>> {
        self.state()
            .visible
            .iter()
            .find(|r| r.handle() == handle)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state().visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().visible.is_empty()
    }

    /// Ids of sessions changed since the previous call.
    pub fn take_changed(&self) -> Vec<SessionId> {
        std::mem::take(&mut self.state().changed).into_iter().collect()
    }

    pub fn snapshots(&self, preview_limit: usize) -> Vec<SessionSnapshot> {
        self.sessions()
            .iter()
            .map(|r| r.snapshot(preview_limit))
            .collect()
    }
}

impl ObserverBridge for SessionList {
    fn session_added(&self, record: Arc<SessionRecord>) {
        if record.is_removed() {
            tracing::trace!(session = %record.id(), "Ignoring add for removed session");
            return;
        }
        let mut state = self.state();
        if state.visible.iter().any(|r| r.id() == record.id()) {
            return;
        }
        // Notifications for different handles can interleave; keep id order.
        let pos = state.visible.partition_point(|r| r.id() < record.id());
        state.changed.insert(record.id());
        state.visible.insert(pos, record);
    }

    fn session_changed(&self, record: Arc<SessionRecord>) {
        if record.is_removed() {
            return;
        }
        self.state().changed.insert(record.id());
    }
}
