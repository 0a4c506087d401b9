//! Error types for AutoMetric

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("Invalid numeric value for {field}: '{value}'")]
    InvalidNumber { field: String, value: String },

    #[error("Invalid date for {field}: '{value}' (use YYYY-MM-DD)")]
    InvalidDate { field: String, value: String },
}

impl Error {
    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameters(_) | Self::InvalidNumber { .. } | Self::InvalidDate { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
