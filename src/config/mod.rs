//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! environment (<NAME>_SERVICE_URL, ...)   or   config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → owned by ClientRegistry, one DestinationConfig per destination
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a registry is built
//! - Everything but the base URL has a default, so minimal configs work
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{from_env, from_lookup, load_config, ConfigError};
pub use schema::{ClientConfig, DestinationConfig};
pub use validation::{validate_config, ValidationError};
