//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate base URLs (absolute, http or https)
//! - Validate value ranges (timeouts > 0, threshold > 0, backoff cap >= base)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into a registry

use url::Url;

use crate::config::schema::{ClientConfig, DestinationConfig};

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("required environment variable {0} is not set")]
    MissingVariable(String),

    #[error("environment variable {key} is invalid: {reason}")]
    InvalidVariable { key: String, reason: String },

    #[error("destination '{destination}': {reason}")]
    InvalidDestination { destination: String, reason: String },
}

impl ValidationError {
    fn destination(name: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidDestination {
            destination: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Check every destination and collect all problems.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (name, destination) in &config.destinations {
        validate_destination(name, destination, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_destination(name: &str, dest: &DestinationConfig, errors: &mut Vec<ValidationError>) {
    if name.trim().is_empty() {
        errors.push(ValidationError::destination(name, "name must not be empty"));
    }

    if let Err(reason) = check_base_url(&dest.base_url) {
        errors.push(ValidationError::destination(name, reason));
    }

    if dest.attempt_timeout_ms == 0 {
        errors.push(ValidationError::destination(name, "attempt_timeout_ms must be greater than 0"));
    }

    if dest.failure_threshold == 0 {
        errors.push(ValidationError::destination(name, "failure_threshold must be greater than 0"));
    }

    if dest.reset_timeout_ms == 0 {
        errors.push(ValidationError::destination(name, "reset_timeout_ms must be greater than 0"));
    }

    if dest.backoff_base_ms == 0 {
        errors.push(ValidationError::destination(name, "backoff_base_ms must be greater than 0"));
    }

    if dest.backoff_max_ms < dest.backoff_base_ms {
        errors.push(ValidationError::destination(
            name,
            format!(
                "backoff_max_ms ({}) must not be below backoff_base_ms ({})",
                dest.backoff_max_ms, dest.backoff_base_ms
            ),
        ));
    }
}

/// Parse a destination base URL, rejecting anything that is not absolute http(s).
pub fn check_base_url(raw: &str) -> Result<Url, String> {
    if raw.trim().is_empty() {
        return Err("base_url must not be empty".to_string());
    }

    let url = Url::parse(raw.trim()).map_err(|e| format!("base_url '{raw}' is not a valid URL: {e}"))?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        "http" | "https" => Err(format!("base_url '{raw}' has no host")),
        other => Err(format!("base_url '{raw}' uses unsupported scheme '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config_passes() {
        let config = ClientConfig::default()
            .with_destination("students", DestinationConfig::new("http://students:8080/api"));
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut broken = DestinationConfig::new("ftp://files");
        broken.attempt_timeout_ms = 0;
        broken.failure_threshold = 0;
        broken.backoff_base_ms = 2_000;
        broken.backoff_max_ms = 1_000;

        let config = ClientConfig::default()
            .with_destination("files", broken)
            .with_destination("empty", DestinationConfig::new(""));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.iter().any(|e| e.to_string().contains("unsupported scheme 'ftp'")));
        assert!(errors.iter().any(|e| e.to_string().contains("'empty': base_url must not be empty")));
    }

    #[test]
    fn test_base_url_checks() {
        assert!(check_base_url("https://api.example.com/v1").is_ok());
        assert!(check_base_url("not a url").is_err());
        assert!(check_base_url("students:8080").is_err());
    }
}
