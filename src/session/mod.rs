//! Session data model.
//!
//! # Data Flow
//! ```text
//! proxy event (handle)
//!     → store.rs (create / lookup by handle)
//!     → record.rs (capture metadata, bodies, byte counters)
//!     → headers.rs (one HeaderSet per direction)
//!     → observer notified with Arc<SessionRecord>
//! ```
//!
//! # Design Decisions
//! - Records are shared as `Arc<SessionRecord>`; the store, the correlator
//!   and the observer all see the same instance
//! - Records never lock: write-once fields plus atomic counters
//! - Removal is observer-driven only; nothing expires automatically

pub mod headers;
pub mod record;
pub mod store;
pub mod types;

pub use headers::{Header, HeaderSet};
pub use record::{RequestMetadata, ResponseMetadata, SessionRecord, SessionSnapshot};
pub use store::SessionStore;
pub use types::{SessionError, SessionHandle, SessionId, SessionResult, SessionState};
