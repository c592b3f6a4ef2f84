use crate::domain::integration::IntegrationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),
    #[error("Gateway error: {message}")]
    Gateway {
        message: String,
        status_code: Option<u16>,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(Box::new(std::io::Error::other(message.into())))
    }

    pub fn gateway(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Gateway {
            message: message.into(),
            status_code,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::InternalError(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
