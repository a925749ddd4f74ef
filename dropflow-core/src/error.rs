use serde::{Deserialize, Serialize};

use crate::adapter::VendorError;

/// Machine-readable classification surfaced alongside every failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    VendorTransient,
    VendorPermanent,
    Conflict,
    Configuration,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::VendorTransient => "VENDOR_TRANSIENT",
            ErrorKind::VendorPermanent => "VENDOR_PERMANENT",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "VALIDATION" => Some(ErrorKind::Validation),
            "VENDOR_TRANSIENT" => Some(ErrorKind::VendorTransient),
            "VENDOR_PERMANENT" => Some(ErrorKind::VendorPermanent),
            "CONFLICT" => Some(ErrorKind::Conflict),
            "CONFIGURATION" => Some(ErrorKind::Configuration),
            "NOT_FOUND" => Some(ErrorKind::NotFound),
            "INTERNAL" => Some(ErrorKind::Internal),
            _ => None,
        }
    }
}

/// Error taxonomy shared across the engine.
///
/// Adapters never let raw transport errors past their boundary; everything a
/// caller sees is one of these kinds plus a human-readable reason.
#[derive(Debug, thiserror::Error)]
pub enum FulfillError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Vendor transient failure: {0}")]
    VendorTransient(String),

    #[error("Vendor rejected request: {0}")]
    VendorPermanent(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl FulfillError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillError::Validation(_) => ErrorKind::Validation,
            FulfillError::VendorTransient(_) => ErrorKind::VendorTransient,
            FulfillError::VendorPermanent(_) => ErrorKind::VendorPermanent,
            FulfillError::Conflict(_) => ErrorKind::Conflict,
            FulfillError::Configuration(_) => ErrorKind::Configuration,
            FulfillError::NotFound(_) => ErrorKind::NotFound,
            FulfillError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Wrap an error coming back from a persistence collaborator.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        FulfillError::Storage(err.to_string())
    }
}

impl From<VendorError> for FulfillError {
    fn from(err: VendorError) -> Self {
        match err {
            VendorError::Transient(msg) => FulfillError::VendorTransient(msg),
            VendorError::Permanent(msg) => FulfillError::VendorPermanent(msg),
        }
    }
}
