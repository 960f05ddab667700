//! Resilient service-to-service HTTP clients.
//!
//! Every outbound call to a destination service goes through the same pipeline:
//!
//! ```text
//! ClientRegistry::client_for(destination)
//!     → ServiceClient::{get,post,put,delete}(path, body, RequestContext)
//!     → CircuitBreaker::execute(
//!           RetryExecutor::run(
//!               TimeoutGuard::bound(transport)))
//!     → classify every failure
//!     → response value, or ServiceError carrying the service name and trace ID
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod resilience;

pub use client::{ClientRegistry, RequestContext, ServiceClient};
pub use config::{ClientConfig, DestinationConfig};
pub use error::{RegistryError, ServiceError};
pub use resilience::{CircuitBreaker, CircuitState, FailureKind};
