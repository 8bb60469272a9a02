//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AuthServerConfig (validated, immutable)
//!     → handed to startup, which builds the server from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthServerConfig, DispatchConfig, Execution, LimitsConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, ShutdownConfig,
};
pub use validation::{validate_config, ValidationError};
