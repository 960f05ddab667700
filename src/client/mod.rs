//! Client subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → registry.rs (ClientRegistry::client_for(destination))
//!     → service.rs (ServiceClient::get/post/put/delete with a RequestContext)
//!         → context.rs (trace and auth headers)
//!         → resilience (breaker, retries, timeouts)
//!         → transport.rs (HTTP send)
//!     → response value or ServiceError
//! ```
//!
//! # Design Decisions
//! - One client and one breaker per destination, owned by the registry
//! - Transport is a trait object so tests and embedders can swap the HTTP stack

pub mod context;
pub mod registry;
pub mod service;
pub mod transport;

pub use context::{RequestContext, TRACE_ID_HEADER};
pub use registry::ClientRegistry;
pub use service::ServiceClient;
pub use transport::{
    InboundResponse, OutboundRequest, ReqwestTransport, Transport, TransportError,
    TransportErrorKind,
};
