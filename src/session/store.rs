//! Handle-keyed session registry.
//!
//! # Responsibilities
//! - Correlate proxy event handles with session records
//! - Assign monotonic session ids
//! - Deregister sessions on observer request
//!
//! # Design Decisions
//! - DashMap provides the single mutual-exclusion discipline (sharded locks);
//!   no operation holds a shard lock across an await point
//! - A lookup miss is a normal outcome, not an error
//! - Registration is atomic per handle via the entry API, so two racing
//!   registrations cannot both insert

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::observability::metrics;
use crate::observer::ObserverSender;
use crate::session::record::SessionRecord;
use crate::session::types::{SessionError, SessionHandle, SessionId, SessionResult};

/// Concurrent registry of live sessions.
#[derive(Clone, Debug)]
pub struct SessionStore {
    sessions: Arc<DashMap<SessionHandle, Arc<SessionRecord>>>,
    next_id: Arc<AtomicU64>,
    notifier: ObserverSender,
}

impl SessionStore {
    /// Create an empty store whose records notify through `notifier`.
    pub fn new(notifier: ObserverSender) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            notifier,
        }
    }

    /// Allocate a record with the next id and register it under `handle`.
    ///
    /// Fails with [`SessionError::DuplicateHandle`] if `handle` is already
    /// registered; the existing record is left untouched.
    pub fn create_and_register(&self, handle: SessionHandle) -> SessionResult<Arc<SessionRecord>> {
        let record = match self.sessions.entry(handle) {
            Entry::Occupied(_) => return Err(SessionError::DuplicateHandle(handle)),
            Entry::Vacant(slot) => {
                let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
                let record = Arc::new(SessionRecord::new(id, handle, self.notifier.clone()));
                slot.insert(Arc::clone(&record));
                record
            }
        };

        // Shard lock released; len() takes every shard's read lock.
        metrics::record_session_created(self.sessions.len());
        tracing::debug!(handle = %handle, session = %record.id(), "Session registered");
        Ok(record)
    }

    /// Find the record registered under `handle`.
    pub fn lookup(&self, handle: SessionHandle) -> Option<Arc<SessionRecord>> {
        self.sessions.get(&handle).map(|r| Arc::clone(r.value()))
    }

    /// Deregister `handle`. No-op if it is not registered.
    pub fn remove(&self, handle: SessionHandle) -> Option<Arc<SessionRecord>> {
        let (_, record) = self.sessions.remove(&handle)?;
        record.mark_removed();

        metrics::record_live_sessions(self.sessions.len());
        tracing::debug!(handle = %handle, session = %record.id(), "Session removed");
        Some(record)
    }

    /// Sender used by this store's records.
    pub fn notifier(&self) -> &ObserverSender {
        &self.notifier
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Live records whose byte counters moved since the last call, clearing
    /// their dirty flags. Unordered.
    pub(crate) fn take_dirty_counters(&self) -> Vec<Arc<SessionRecord>> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().take_counters_dirty())
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// All live records, ordered by session id.
    pub fn records(&self) -> Vec<Arc<SessionRecord>> {
        let mut records: Vec<_> = self
            .sessions
            .iter()
            .map(|r| Arc::clone(r.value()))
            .collect();
        records.sort_by_key(|r| r.id());
        records
    }
}
