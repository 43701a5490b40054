//! IngestConfig - Config Loader output
//!
//! Storage connection, schema naming, pipeline policy and observability settings.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete ingestion configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct IngestConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Storage connection descriptor
    #[serde(default)]
    #[validate(nested)]
    pub database: ConnectionConfig,

    /// Table/column naming
    #[serde(default)]
    #[validate(nested)]
    pub schema: SchemaConfig,

    /// Pipeline policy
    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub observability: ObservabilitySettings,
}

/// Storage connection descriptor (opaque to the pipeline core)
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct ConnectionConfig {
    /// Full connection URL; takes precedence over the discrete fields
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_db_host")]
    #[validate(length(min = 1))]
    pub host: String,

    #[serde(default = "default_db_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    #[serde(default = "default_db_name")]
    #[validate(length(min = 1))]
    pub dbname: String,

    #[serde(default = "default_db_user")]
    #[validate(length(min = 1))]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Maximum pooled connections (one per concurrently persisted batch)
    #[serde(default = "default_pool_size")]
    #[validate(range(min = 1, max = 256))]
    pub pool_size: usize,

    #[serde(default = "default_connect_timeout")]
    #[validate(range(min = 1))]
    pub connect_timeout_secs: u64,
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "telemetry".to_string()
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_pool_size() -> usize {
    4
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_db_host(),
            port: default_db_port(),
            dbname: default_db_name(),
            user: default_db_user(),
            password: String::new(),
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// Keep credentials out of logs
impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("pool_size", &self.pool_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Table and column names used by the storage layer
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SchemaConfig {
    #[serde(default = "default_telemetry_table")]
    #[validate(custom(function = "validate_identifier"))]
    pub telemetry_table: String,

    #[serde(default = "default_device_table")]
    #[validate(custom(function = "validate_identifier"))]
    pub device_table: String,

    #[serde(default = "default_device_id_column")]
    #[validate(custom(function = "validate_identifier"))]
    pub device_id_column: String,

    #[serde(default = "default_device_address_column")]
    #[validate(custom(function = "validate_identifier"))]
    pub device_address_column: String,

    /// Composite type of the `parameters` column
    #[serde(default = "default_parameters_type")]
    #[validate(custom(function = "validate_identifier"))]
    pub parameters_type: String,
}

fn default_telemetry_table() -> String {
    "telemetry".to_string()
}

fn default_device_table() -> String {
    "device".to_string()
}

fn default_device_id_column() -> String {
    "id".to_string()
}

fn default_device_address_column() -> String {
    "mac_address".to_string()
}

fn default_parameters_type() -> String {
    "sensor_parameters".to_string()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            telemetry_table: default_telemetry_table(),
            device_table: default_device_table(),
            device_id_column: default_device_id_column(),
            device_address_column: default_device_address_column(),
            parameters_type: default_parameters_type(),
        }
    }
}

/// SQL identifier, optionally schema-qualified: `[A-Za-z_][A-Za-z0-9_]*(.[A-Za-z_][A-Za-z0-9_]*)?`
pub fn is_sql_identifier(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if is_sql_identifier(value) {
        Ok(())
    } else {
        Err(ValidationError::new("sql_identifier"))
    }
}

/// What to do with a reading whose device is not registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedDevicePolicy {
    /// Skip the reading and count it
    #[default]
    Skip,
    /// Roll back the whole batch
    FailBatch,
}

/// Pipeline policy settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineSettings {
    #[serde(default)]
    pub unresolved_device: UnresolvedDevicePolicy,

    /// Batches processed concurrently
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 256))]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            unresolved_device: UnresolvedDevicePolicy::default(),
            concurrency: default_concurrency(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Logging and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus port (None = disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(is_sql_identifier("telemetry"));
        assert!(is_sql_identifier("iot.telemetry_v2"));
        assert!(is_sql_identifier("_device"));
        assert!(!is_sql_identifier(""));
        assert!(!is_sql_identifier("1table"));
        assert!(!is_sql_identifier("a.b.c"));
        assert!(!is_sql_identifier("telemetry; DROP TABLE device"));
        assert!(!is_sql_identifier("tele-metry"));
    }

    #[test]
    fn test_defaults_validate() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.unresolved_device, UnresolvedDevicePolicy::Skip);
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = ConnectionConfig {
            url: Some("postgres://u:secret@h/db".into()),
            password: "secret".into(),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
    }
}
