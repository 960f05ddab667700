//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Client and resilience layers produce:
//!     → logging.rs (structured log events, trace ID on every call span)
//!     → metrics.rs (counters, gauges, histograms through the `metrics` facade)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON or pretty)
//!     → Whatever recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace ID is a span field, so every event inside a call carries it
//! - The library never installs a metrics recorder; without one, updates are no-ops

pub mod logging;
pub mod metrics;
