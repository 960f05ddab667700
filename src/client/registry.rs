//! Per-destination client registry.
//!
//! # Responsibilities
//! - Own exactly one `ServiceClient` (and so one `CircuitBreaker`) per destination
//! - Construct clients lazily on first lookup
//! - Expose breaker snapshots for health and admin views
//!
//! # Design Decisions
//! - No process-wide singleton; callers hold the registry and tests build isolated ones
//! - DashMap entry API gives construct-once-per-key under concurrent lookups
//! - All destinations share one pooled transport

use std::sync::Arc;

use dashmap::DashMap;

use crate::client::service::ServiceClient;
use crate::client::transport::{ReqwestTransport, Transport};
use crate::config::loader::{self, ConfigError};
use crate::config::schema::ClientConfig;
use crate::config::validation::validate_config;
use crate::error::RegistryError;
use crate::resilience::circuit_breaker::BreakerSnapshot;

#[derive(Debug)]
pub struct ClientRegistry {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    clients: DashMap<String, Arc<ServiceClient>>,
}

impl ClientRegistry {
    /// Validate `config` and build a registry over the default HTTP transport.
    pub fn new(config: ClientConfig) -> Result<Self, RegistryError> {
        let transport = ReqwestTransport::new()?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Validate `config` and build a registry over a caller-supplied transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RegistryError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        tracing::info!(
            destinations = config.destinations.len(),
            "client registry initialized"
        );

        Ok(Self {
            config,
            transport,
            clients: DashMap::new(),
        })
    }

    /// Build from `<NAME>_SERVICE_URL` style environment variables.
    pub fn from_env<I, S>(names: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(loader::from_env(names)?)
    }

    /// Client for `name`, constructed on first use.
    pub fn client_for(&self, name: &str) -> Result<Arc<ServiceClient>, RegistryError> {
        if let Some(client) = self.clients.get(name) {
            return Ok(Arc::clone(client.value()));
        }

        let destination = self
            .config
            .destination(name)
            .ok_or_else(|| RegistryError::UnknownDestination(name.to_string()))?;

        let client = self.clients.entry(name.to_string()).or_try_insert_with(|| {
            tracing::debug!(service = %name, base_url = %destination.base_url, "constructing client");
            ServiceClient::new(name, destination, Arc::clone(&self.transport)).map(Arc::new)
        })?;

        Ok(Arc::clone(client.value()))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Configured destination names, in order.
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.config.destinations.keys().map(String::as_str)
    }

    /// Breaker state of every client constructed so far, sorted by name.
    pub fn snapshots(&self) -> Vec<(String, BreakerSnapshot)> {
        let mut snapshots: Vec<_> = self
            .clients
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().breaker().snapshot()))
            .collect();
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }
}
