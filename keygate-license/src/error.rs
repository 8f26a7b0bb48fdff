//! Error types for the licensing engine.
//!
//! Validation failures are never raised through this type: they are reported
//! as [`Outcome::Rejected`](crate::Outcome) and a cached message. This enum
//! only covers infrastructure faults around the engine.

use thiserror::Error;

/// Infrastructure errors raised by the licensing engine.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Configuration is missing a required value or is malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Option store or transient store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A persisted record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
