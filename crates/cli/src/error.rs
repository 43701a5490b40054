//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Input path not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("No capture files found under the given paths")]
    NoInputs,

    #[error("{failed} of {total} batches failed")]
    BatchesFailed { failed: u64, total: usize },

    #[error("Interrupted before all batches completed")]
    Interrupted,
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        Self::InputNotFound { path: path.into() }
    }
}
