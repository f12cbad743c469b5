//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! a double underscore, so `ENGINE__LATENCY_SCALE=0` sets
//! [`EngineConfig::latency_scale`].

use defi_flow_workflow::EngineConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection URL. Workflows are kept in memory when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Owner used for requests that carry no `x-wallet-address` header.
    #[serde(default = "default_owner")]
    pub default_owner: String,

    /// Workflow engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_owner() -> String {
    "default-wallet".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_url: None,
            default_owner: default_owner(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> ServerConfig {
        let source = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_environment(config::Environment::default().source(Some(source)))
            .expect("config loads")
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = load(&[]);
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.default_owner, "default-wallet");
        assert!(config.database_url.is_none());
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn nested_engine_settings_are_read() {
        let config = load(&[
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("DATABASE_URL", "postgres://localhost/defi_flow"),
            ("ENGINE__LATENCY_SCALE", "0"),
            ("ENGINE__SEED_AMOUNT", "250"),
            ("ENGINE__EXECUTION_TIMEOUT_SECS", "30"),
        ]);

        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/defi_flow")
        );
        assert_eq!(config.engine.latency_scale, 0.0);
        assert_eq!(config.engine.seed_amount, 250.0);
        assert_eq!(config.engine.execution_timeout_secs, 30);
    }
}
