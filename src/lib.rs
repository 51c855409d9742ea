//! Live session correlation for an intercepting HTTP(S) proxy.
//!
//! The proxy engine reports lifecycle events per connection; this crate
//! correlates them into per-session records, fetches bodies without blocking
//! event delivery, and pushes updates to an observer.

pub mod config;
pub mod correlator;
pub mod lifecycle;
pub mod observability;
pub mod observer;
pub mod replay;
pub mod session;

pub use config::CorrelatorConfig;
pub use correlator::EventCorrelator;
pub use lifecycle::Shutdown;
pub use observer::{ObserverBridge, ObserverDispatcher, ObserverSender, SessionList};
pub use session::{HeaderSet, SessionHandle, SessionRecord, SessionStore};
