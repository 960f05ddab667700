//! Configuration loading from disk and from the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::{ClientConfig, DestinationConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ClientConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Environment variable prefix for a destination name.
///
/// `course-service` → `COURSE_SERVICE`, `billing` → `BILLING_SERVICE`.
pub fn env_prefix(name: &str) -> String {
    let upper: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();

    if upper.ends_with("_SERVICE") || upper == "SERVICE" {
        upper
    } else {
        format!("{upper}_SERVICE")
    }
}

/// Build configuration for `names` from the process environment.
pub fn from_env<I, S>(names: I) -> Result<ClientConfig, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    from_lookup(names, |key| std::env::var(key).ok())
}

/// Build configuration for `names` from an arbitrary variable lookup.
///
/// `<PREFIX>_URL` is required for every name; the other settings fall back to
/// their defaults. All missing or malformed variables are reported together.
pub fn from_lookup<I, S, F>(names: I, lookup: F) -> Result<ClientConfig, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(&str) -> Option<String>,
{
    let mut config = ClientConfig::default();
    let mut errors = Vec::new();

    for name in names {
        let name = name.as_ref();
        let prefix = env_prefix(name);
        let url_key = format!("{prefix}_URL");

        let Some(base_url) = lookup(&url_key).filter(|url| !url.trim().is_empty()) else {
            errors.push(ValidationError::MissingVariable(url_key));
            continue;
        };

        let mut dest = DestinationConfig::new(base_url.trim());
        let mut env = EnvReader {
            prefix: &prefix,
            lookup: &lookup,
            errors: &mut errors,
        };
        env.read("TIMEOUT_MS", &mut dest.attempt_timeout_ms);
        env.read("MAX_RETRIES", &mut dest.max_retries);
        env.read("BACKOFF_STRATEGY", &mut dest.backoff_strategy);
        env.read("BACKOFF_BASE_MS", &mut dest.backoff_base_ms);
        env.read("BACKOFF_MAX_MS", &mut dest.backoff_max_ms);
        env.read("FAILURE_THRESHOLD", &mut dest.failure_threshold);
        env.read("RESET_TIMEOUT_MS", &mut dest.reset_timeout_ms);

        config.destinations.insert(name.to_string(), dest);
    }

    if let Err(invalid) = validate_config(&config) {
        errors.extend(invalid);
    }

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Validation(errors))
    }
}

struct EnvReader<'a, F> {
    prefix: &'a str,
    lookup: &'a F,
    errors: &'a mut Vec<ValidationError>,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Overwrite `slot` when the variable is set; record an error if it does not parse.
    fn read<T>(&mut self, suffix: &str, slot: &mut T)
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let key = format!("{}_{suffix}", self.prefix);
        let Some(raw) = (self.lookup)(&key) else {
            return;
        };

        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(e) => self.errors.push(ValidationError::InvalidVariable {
                key,
                reason: format!("'{raw}': {e}"),
            }),
        }
    }
}
