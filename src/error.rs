//! Error types for the publisher.

/// Result type for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;

/// Errors that can occur while assembling or publishing a repository.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid publish configuration.
    #[error("Invalid publish configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid package control data.
    #[error("Invalid package data: {0}")]
    InvalidPackageData(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid field value.
    #[error("Invalid field value for '{field}': {value}")]
    InvalidField { field: String, value: String },

    /// Directory creation failed.
    #[error("Failed to create directory: {0}")]
    DirectoryCreation(String),

    /// Signing the release manifest failed.
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl PublishError {
    /// Create a new invalid configuration error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a new invalid package data error.
    pub fn invalid_package<S: Into<String>>(msg: S) -> Self {
        Self::InvalidPackageData(msg.into())
    }

    /// Create a new missing field error.
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Self::MissingField(field.into())
    }

    /// Create a new invalid field error.
    pub fn invalid_field<S: Into<String>>(field: S, value: S) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
        }
    }
}
