//! Error types for the ingestion pipeline.
//!
//! Only the two fatal kinds live in `IngestError`; everything recoverable is
//! carried as missing data on the records themselves. Per-lookup failures are
//! `LookupFailure`, which never aborts a batch.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("loan history sheet does not match the expected layout: {reason}")]
    Parse { reason: String },

    #[error("mapping sheet is missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },
}

#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize)]
pub enum LookupFailure {
    #[error("no ISBN for this record")]
    MissingIsbn,

    #[error("invalid ISBN format: {0}")]
    InvalidFormat(String),

    #[error("no search result for ISBN '{0}'")]
    NotFound(String),

    #[error("lookup request failed (status {status}) for ISBN '{isbn}'")]
    Status { isbn: String, status: u16 },

    #[error("lookup request failed for ISBN '{isbn}': {message}")]
    Transport { isbn: String, message: String },

    #[error("unreadable lookup response for ISBN '{isbn}': {message}")]
    Malformed { isbn: String, message: String },
}
