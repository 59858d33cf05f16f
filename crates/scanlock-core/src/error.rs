//! Error types for Scanlock.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Request validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    // License lifecycle errors
    #[error("User already has an active license")]
    AlreadyLicensed,

    #[error("Duplicate license key: {0}")]
    DuplicateKey(String),

    #[error("License not found: {0}")]
    NotFound(String),

    #[error("License invalid or expired")]
    LicenseInvalid,

    #[error("Device fingerprint mismatch")]
    DeviceMismatch,

    // Crypto errors
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    // Infrastructure errors
    #[error("Store error: {0}")]
    Store(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
