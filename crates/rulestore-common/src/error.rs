//! Error types for RuleStore
//!
//! Provides a unified error type hierarchy for the adapter, the storage
//! backends and the configuration layer.

use thiserror::Error;

/// Result type alias using RuleStore's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for RuleStore
#[derive(Error, Debug)]
pub enum Error {
    // Storage Errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // Connection Errors
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    // Policy Errors
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// True when the request was abandoned because its deadline passed
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::Timeout { .. }))
    }

    /// True when an insert collided with an existing row
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Error::Policy(PolicyError::DuplicateRule(_))
                | Error::Storage(StorageError::DuplicateKey(_))
        )
    }
}

/// Storage-related errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error("Collection closed: {0}")]
    CollectionClosed(String),
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: &'static str, after_ms: u64 },
}

/// Policy state errors
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("cannot save a filtered policy")]
    FilteredSave,

    #[error("Unknown policy section for rule type: {0}")]
    UnknownSection(String),

    #[error("Duplicate rule: {0}")]
    DuplicateRule(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bson::ser::Error> for Error {
    fn from(e: bson::ser::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bson::de::Error> for Error {
    fn from(e: bson::de::Error) -> Self {
        Error::Storage(StorageError::CorruptData(e.to_string()))
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        match e {
            sled::Error::Io(io) => Error::Io(io),
            corrupt @ sled::Error::Corruption { .. } => {
                Error::Storage(StorageError::CorruptData(corrupt.to_string()))
            }
            other => Error::Storage(StorageError::WriteFailed(other.to_string())),
        }
    }
}
