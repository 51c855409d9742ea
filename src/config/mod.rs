//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CorrelatorConfig (validated, immutable)
//!     → sections handed to the correlator, observer and observability setup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::CaptureConfig;
pub use schema::CorrelatorConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::ObserverConfig;
