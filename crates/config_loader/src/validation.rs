//! Configuration validation
//!
//! Rules:
//! - field ranges and identifier syntax (derived `Validate` on the contract types)
//! - `database.url` uses a postgres scheme
//! - `observability.metrics_port` is not 0
//! - `observability.log_level` is a known level

use contracts::{ContractError, IngestConfig};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate an IngestConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &IngestConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_database_url(config)?;
    validate_observability(config)?;
    Ok(())
}

/// Field-level rules declared on the contract types
fn validate_fields(config: &IngestConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(error) = field_errors.first() {
                    return Some((path, describe(error)));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    match error.code.as_ref() {
        "sql_identifier" => "must be a SQL identifier ([A-Za-z_][A-Za-z0-9_]*, optionally schema-qualified)".to_string(),
        "range" => {
            let min = error.params.get("min").map(ToString::to_string);
            let max = error.params.get("max").map(ToString::to_string);
            match (min, max) {
                (Some(min), Some(max)) => format!("must be between {min} and {max}"),
                (Some(min), None) => format!("must be >= {min}"),
                (None, Some(max)) => format!("must be <= {max}"),
                (None, None) => "out of range".to_string(),
            }
        }
        "length" => "cannot be empty".to_string(),
        code => format!("invalid value ({code})"),
    }
}

fn validate_database_url(config: &IngestConfig) -> Result<(), ContractError> {
    if let Some(url) = &config.database.url {
        if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
            return Err(ContractError::config_validation(
                "database.url",
                "url must start with postgres:// or postgresql://",
            ));
        }
    }
    Ok(())
}

fn validate_observability(config: &IngestConfig) -> Result<(), ContractError> {
    let observability = &config.observability;

    if observability.metrics_port == Some(0) {
        return Err(ContractError::config_validation(
            "observability.metrics_port",
            "metrics_port must be > 0 (omit it to disable metrics)",
        ));
    }

    if !LOG_LEVELS.contains(&observability.log_level.to_lowercase().as_str()) {
        return Err(ContractError::config_validation(
            "observability.log_level",
            format!(
                "unknown log level '{}', expected one of {:?}",
                observability.log_level, LOG_LEVELS
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate(&IngestConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_pool_size() {
        let mut config = IngestConfig::default();
        config.database.pool_size = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("database.pool_size"), "got: {err}");
        assert!(err.contains("between 1 and 256"), "got: {err}");
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = IngestConfig::default();
        config.pipeline.concurrency = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("pipeline.concurrency"), "got: {err}");
    }

    #[test]
    fn test_bad_identifier() {
        let mut config = IngestConfig::default();
        config.schema.device_table = "device; drop table telemetry".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("schema.device_table"), "got: {err}");
        assert!(err.contains("SQL identifier"), "got: {err}");
    }

    #[test]
    fn test_empty_host() {
        let mut config = IngestConfig::default();
        config.database.host = String::new();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("database.host"), "got: {err}");
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_bad_url_scheme() {
        let mut config = IngestConfig::default();
        config.database.url = Some("mysql://localhost/db".into());
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("postgres://"), "got: {err}");
    }

    #[test]
    fn test_metrics_port_zero() {
        let mut config = IngestConfig::default();
        config.observability.metrics_port = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_log_level() {
        let mut config = IngestConfig::default();
        config.observability.log_level = "chatty".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("unknown log level"), "got: {err}");
    }
}
