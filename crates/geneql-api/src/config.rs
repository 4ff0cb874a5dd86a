//! Facade configuration.
//!
//! ```json
//! {
//!   "schema_path": "genesis.json",
//!   "default_timeout_ms": 500,
//!   "log": { "level": "geneql=debug", "output": "stdout" }
//! }
//! ```

use crate::error::ConfigError;
use crate::logging::LogConfig;
use geneql_core::Schema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Where the schema comes from, how long queries may run, how to log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneQLConfig {
    /// Inline schema
    pub schema: Option<Schema>,
    /// JSON schema file; relative paths resolve against the config file
    pub schema_path: Option<PathBuf>,
    /// Deadline applied to contexts built by [`GeneQL::context`](crate::GeneQL::context)
    pub default_timeout_ms: Option<u64>,
    /// Logging, installed by [`GeneQLConfig::init_logging`]
    pub log: Option<LogConfig>,
}

impl GeneQLConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this schema instead of the Genesis ontology
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Load the schema from a JSON file
    pub fn with_schema_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = Some(timeout.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = Some(log);
        self
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    /// Parse a JSON config document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_json(&std::fs::read_to_string(path)?)?;
        if let (Some(schema_path), Some(dir)) = (&config.schema_path, path.parent()) {
            if schema_path.is_relative() {
                config.schema_path = Some(dir.join(schema_path));
            }
        }
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// The configured schema, validated. Genesis when none is configured.
    pub fn load_schema(&self) -> Result<Schema, ConfigError> {
        let schema = match (&self.schema, &self.schema_path) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingSchemaSources),
            (Some(schema), None) => {
                schema.validate()?;
                schema.clone()
            }
            (None, Some(path)) => Schema::from_file(path)?,
            (None, None) => Schema::genesis(),
        };
        Ok(schema)
    }

    /// Install the configured logger, if any
    pub fn init_logging(&self) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, ConfigError> {
        match &self.log {
            Some(log) => Ok(log.clone().init()?),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn test_defaults_to_genesis() {
        let config = GeneQLConfig::new();
        assert_eq!(config.load_schema().unwrap(), Schema::genesis());
        assert_eq!(config.default_timeout(), None);
    }

    #[test]
    fn test_builder() {
        let config = GeneQLConfig::new()
            .with_default_timeout(Duration::from_millis(250))
            .with_log(LogConfig::warn().with_format(LogFormat::Compact));
        assert_eq!(config.default_timeout_ms, Some(250));
        assert_eq!(config.log.unwrap().level, "warn");
    }

    #[test]
    fn test_conflicting_schema_sources() {
        let config = GeneQLConfig::new()
            .with_schema(Schema::genesis())
            .with_schema_path("genesis.json");
        assert!(matches!(
            config.load_schema(),
            Err(ConfigError::ConflictingSchemaSources)
        ));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            GeneQLConfig::from_json(r#"{"host": "localhost"}"#),
            Err(ConfigError::Json(_))
        ));
    }
}
