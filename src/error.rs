use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Store(#[from] StoreError),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Cors(#[from] rocket_cors::Error),
}

/// Failures raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Bson(#[from] bson::ser::Error),
    #[error("duplicate value for unique field '{0}'")]
    Duplicate(&'static str),
}

/// Outcome taxonomy of every workflow operation.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidRole(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn forbidden(message: impl ToString) -> Self {
        WorkflowError::Forbidden(message.to_string())
    }

    pub fn not_found(message: impl ToString) -> Self {
        WorkflowError::NotFound(message.to_string())
    }

    pub fn invalid_role(message: impl ToString) -> Self {
        WorkflowError::InvalidRole(message.to_string())
    }

    pub fn conflict(message: impl ToString) -> Self {
        WorkflowError::Conflict(message.to_string())
    }

    pub fn validation(message: impl ToString) -> Self {
        WorkflowError::Validation(message.to_string())
    }
}
