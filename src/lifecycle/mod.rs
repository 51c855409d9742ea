//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → broadcast to background tasks
//!         → counter flush loop exits
//!         → observer dispatcher drains queued events and exits
//!
//! Signals (signals.rs):
//!     SIGINT / Ctrl-C → Shutdown::trigger()
//! ```
//!
//! # Design Decisions
//! - One broadcast channel shared by every background task
//! - Tasks drain what is already queued before exiting; in-flight body
//!   fetches are not cancelled

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_on_ctrl_c;
