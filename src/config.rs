//! Layered configuration for the coordination core and its binaries.
//!
//! Grounded on the original system's `Settings` (`pydantic-settings`, env-file
//! plus env-var overrides) and on the `config` crate usage in the `ry-ht-ryht`
//! example workspace. Load order is defaults, then an optional `config.toml`,
//! then `APP_`-prefixed environment variables, each layer overriding the last.
//!
//! Settings split into two groups per the original `Settings` schema: fields the
//! core itself reads (`a2a_timeout`, `a2a_max_retries`, `max_retrieval_results`,
//! `similarity_threshold`), and ambient fields that exist only to wire up the
//! binary (`http_bind_address`, `database_path`, `log_directive`). Collaborator
//! settings (LLM credentials, graph-database URIs) are out of scope for the core
//! and are not modeled here.

use serde::Deserialize;

use crate::error::ConfigError;

/// Fully resolved application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default inter-agent timeout, in seconds. Recognised by the core per §6.
    pub a2a_timeout: u64,
    /// Maximum retry attempts a collaborator may perform. Recognised by the core.
    pub a2a_max_retries: u32,
    /// Default `max_results` for an assistant request when the caller omits one.
    pub max_retrieval_results: usize,
    /// Similarity threshold collaborators use to admit a retrieval candidate.
    pub similarity_threshold: f64,
    /// Address the API Boundary Adapter binds to.
    pub http_bind_address: String,
    /// Filesystem path to the trace store's SQLite database.
    pub database_path: String,
    /// `tracing_subscriber` env-filter directive used when `RUST_LOG` is unset.
    pub log_directive: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            a2a_timeout: 30,
            a2a_max_retries: 3,
            max_retrieval_results: 10,
            similarity_threshold: 0.7,
            http_bind_address: "127.0.0.1:8080".to_string(),
            database_path: "./data/trace.db".to_string(),
            log_directive: "legal_coord_core=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration: built-in defaults, then `config.toml` in the current
    /// directory if present, then `APP_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.toml` exists but fails to parse, or if an
    /// environment variable cannot be coerced to its field's type.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default("a2a_timeout", defaults.a2a_timeout)?
            .set_default("a2a_max_retries", defaults.a2a_max_retries)?
            .set_default("max_retrieval_results", defaults.max_retrieval_results as i64)?
            .set_default("similarity_threshold", defaults.similarity_threshold)?
            .set_default("http_bind_address", defaults.http_bind_address)?
            .set_default("database_path", defaults.database_path)?
            .set_default("log_directive", defaults.log_directive)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// A configuration suited to tests: in-memory-sized defaults, no bound port
    /// assumptions, and a database path the caller is expected to override.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            http_bind_address: "127.0.0.1:0".to_string(),
            database_path: ":memory:".to_string(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.a2a_timeout == 0 {
            return Err(ConfigError::Validation {
                field: "a2a_timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Validation {
                field: "similarity_threshold".to_string(),
                reason: "must be within [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_use_builtin_defaults_with_no_overrides() {
        let config = AppConfig::default();
        assert_eq!(config.a2a_timeout, 30);
        assert_eq!(config.max_retrieval_results, 10);
    }

    #[test]
    fn test_should_reject_zero_a2a_timeout() {
        let config = AppConfig {
            a2a_timeout: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_should_reject_similarity_threshold_out_of_range() {
        let config = AppConfig {
            similarity_threshold: 1.5,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
